// Copyright (c) 2026 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Background sweep that transitions stale OPEN jobs to EXPIRED and refunds
//! any escrow still held against them. Structured after the teacher's
//! `job_processor::start_monitoring` background task: a `tokio::select!`
//! over an interval tick and a shutdown channel, logging and continuing on
//! any per-job error rather than aborting the loop (spec.md §5).

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::interval;
use tracing::{error, info, warn};

use crate::escrow::EscrowCoordinator;
use crate::jobs::{JobService, JobStatus};

pub struct ExpirySweeper {
    jobs: Arc<JobService>,
    escrow: Arc<EscrowCoordinator>,
    period: Duration,
}

impl ExpirySweeper {
    pub fn new(jobs: Arc<JobService>, escrow: Arc<EscrowCoordinator>, period: Duration) -> Self {
        Self { jobs, escrow, period }
    }

    /// Spawn the sweep loop, returning a handle whose sender triggers a
    /// clean shutdown when dropped or sent to.
    pub fn spawn(self) -> mpsc::Sender<()> {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
        tokio::spawn(async move {
            let mut tick = interval(self.period);
            loop {
                tokio::select! {
                    _ = tick.tick() => {
                        self.sweep_once().await;
                    }
                    _ = shutdown_rx.recv() => {
                        info!("expiry sweep shutting down");
                        break;
                    }
                }
            }
        });
        shutdown_tx
    }

    async fn sweep_once(&self) {
        for job in self.jobs.list(Some(JobStatus::Open)).await {
            match self.jobs.expire(&job.id).await {
                Ok(Some(_)) => {
                    info!(job_id = %job.id, "job swept to expired");
                    if let Err(e) = self.escrow.refund_if_held(&job.id).await {
                        error!(job_id = %job.id, error = %e, "refund on expiry failed, will retry next sweep");
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(job_id = %job.id, error = %e, "expiry sweep skipped job");
                }
            }
        }
    }
}

// Copyright (c) 2026 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! The Job Service: the sole mutator of job state. Every public method
//! here corresponds to one row of spec.md §4.2's transition table.

use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::info;

use super::model::{Job, JobId, JobStatus};
use super::store::JobStore;
use super::validation;
use crate::errors::BrokerError;
use crate::events::{EventBus, EventType};

pub struct CreateJobInput {
    pub title: String,
    pub description: String,
    pub bounty_usdc: f64,
    pub requester_wallet: String,
    pub tags: Vec<String>,
}

/// Window a job has, once OPEN, before it may be swept to EXPIRED.
const DEFAULT_CLAIM_WINDOW_HOURS: i64 = 24;

pub struct JobService {
    store: Arc<dyn JobStore>,
    events: Arc<dyn EventBus>,
}

impl JobService {
    pub fn new(store: Arc<dyn JobStore>, events: Arc<dyn EventBus>) -> Self {
        Self { store, events }
    }

    pub async fn get(&self, id: &JobId) -> Option<Job> {
        self.store.get(id).await
    }

    pub async fn list(&self, status: Option<JobStatus>) -> Vec<Job> {
        self.store.list(status).await
    }

    /// `create(input)` — PENDING_DEPOSIT.
    pub async fn create(&self, input: CreateJobInput) -> Result<Job, BrokerError> {
        validation::title(&input.title)?;
        validation::description(&input.description)?;
        validation::wallet_address(&input.requester_wallet)?;
        validation::tags(&input.tags)?;
        let bounty_atomic = validation::bounty_atomic(input.bounty_usdc)?;

        let now = Utc::now();
        let job = Job {
            id: JobId::generate(),
            title: input.title,
            description: input.description,
            bounty_usdc: input.bounty_usdc,
            bounty_atomic,
            requester_wallet: input.requester_wallet,
            worker_wallet: None,
            status: JobStatus::PendingDeposit,
            result: None,
            created_at: now,
            claimed_at: None,
            completed_at: None,
            paid_at: None,
            deposit_tx_sig: None,
            payment_tx_sig: None,
            expires_at: now + Duration::hours(DEFAULT_CLAIM_WINDOW_HOURS),
            tags: input.tags,
        };
        self.store.insert(job.clone()).await?;
        info!(job_id = %job.id, "job created, pending deposit");
        Ok(job)
    }

    /// `activate(id, depositTxSig)` — PENDING_DEPOSIT -> OPEN. The caller
    /// (the Escrow Coordinator) has already verified the deposit before
    /// calling this.
    pub async fn activate(
        &self,
        id: &JobId,
        deposit_tx_sig: String,
    ) -> Result<Job, BrokerError> {
        let job = self.require(id).await?;
        let updated = self
            .store
            .compare_and_set(
                id,
                JobStatus::PendingDeposit,
                Box::new(move |j| {
                    j.status = JobStatus::Open;
                    j.deposit_tx_sig = Some(deposit_tx_sig);
                }),
            )
            .await?
            .ok_or_else(|| BrokerError::state_error(job.status, JobStatus::Open))?;

        info!(job_id = %id, "job activated");
        self.events
            .publish(EventType::JobNew, serde_json::json!({ "jobId": id.0 }))
            .await;
        Ok(updated)
    }

    /// `claim(id, worker)` — OPEN -> CLAIMED.
    pub async fn claim(&self, id: &JobId, worker_wallet: String) -> Result<Job, BrokerError> {
        validation::wallet_address(&worker_wallet)?;
        let job = self.require(id).await?;
        if worker_wallet == job.requester_wallet {
            return Err(BrokerError::validation(
                "workerWallet must not equal requesterWallet",
            ));
        }

        let now = Utc::now();
        let worker_for_mutation = worker_wallet.clone();
        let updated = self
            .store
            .compare_and_set(
                id,
                JobStatus::Open,
                Box::new(move |j| {
                    j.status = JobStatus::Claimed;
                    j.worker_wallet = Some(worker_for_mutation);
                    j.claimed_at = Some(now);
                }),
            )
            .await?
            .ok_or_else(|| BrokerError::state_error(job.status, JobStatus::Claimed))?;

        info!(job_id = %id, worker = %worker_wallet, "job claimed");
        self.events
            .publish(
                EventType::JobClaimed,
                serde_json::json!({ "jobId": id.0, "workerWallet": worker_wallet }),
            )
            .await;
        Ok(updated)
    }

    /// `complete(id, result, worker)` — CLAIMED -> COMPLETED.
    pub async fn complete(
        &self,
        id: &JobId,
        result: String,
        worker_wallet: &str,
    ) -> Result<Job, BrokerError> {
        validation::result(&result)?;
        let job = self.require(id).await?;
        if job.status == JobStatus::Claimed {
            match &job.worker_wallet {
                Some(bound) if bound == worker_wallet => {}
                _ => {
                    return Err(BrokerError::authorization(
                        "caller is not the worker bound to this job",
                    ))
                }
            }
        }

        let updated = self
            .store
            .compare_and_set(
                id,
                JobStatus::Claimed,
                Box::new(move |j| {
                    j.status = JobStatus::Completed;
                    j.result = Some(result);
                    j.completed_at = Some(Utc::now());
                }),
            )
            .await?
            .ok_or_else(|| BrokerError::state_error(job.status, JobStatus::Completed))?;

        info!(job_id = %id, "job completed");
        self.events
            .publish(EventType::JobCompleted, serde_json::json!({ "jobId": id.0 }))
            .await;
        Ok(updated)
    }

    /// `markPaid(id, txSig)` — COMPLETED -> PAID. Idempotent: calling this
    /// on an already-PAID job with any signature is a successful no-op, per
    /// spec.md §4.3 failure semantics and §7 recovery policy.
    pub async fn mark_paid(&self, id: &JobId, tx_sig: String) -> Result<Job, BrokerError> {
        let job = self.require(id).await?;
        if job.status == JobStatus::Paid {
            return Ok(job);
        }

        let updated = self
            .store
            .compare_and_set(
                id,
                JobStatus::Completed,
                Box::new(move |j| {
                    j.status = JobStatus::Paid;
                    j.payment_tx_sig = Some(tx_sig);
                    j.paid_at = Some(Utc::now());
                }),
            )
            .await?;

        match updated {
            Some(updated) => {
                info!(job_id = %id, "job paid");
                self.events
                    .publish(EventType::JobPaid, serde_json::json!({ "jobId": id.0 }))
                    .await;
                Ok(updated)
            }
            None => {
                // Re-read: another settlement path may have just won the
                // race and paid the job between our checks above.
                let current = self.require(id).await?;
                if current.status == JobStatus::Paid {
                    Ok(current)
                } else {
                    Err(BrokerError::state_error(job.status, JobStatus::Paid))
                }
            }
        }
    }

    /// `cancel(id, requester)` — {PENDING_DEPOSIT, OPEN} -> CANCELLED.
    /// Returns the job's status *before* cancellation so the caller (the
    /// HTTP handler) knows whether an escrow refund is owed.
    pub async fn cancel(
        &self,
        id: &JobId,
        requester_wallet: &str,
    ) -> Result<(Job, JobStatus), BrokerError> {
        let job = self.require(id).await?;
        if job.requester_wallet != requester_wallet {
            return Err(BrokerError::authorization(
                "caller is not the requester of this job",
            ));
        }
        if job.status != JobStatus::PendingDeposit && job.status != JobStatus::Open {
            return Err(BrokerError::state_error(job.status, JobStatus::Cancelled));
        }

        let previous_status = job.status;
        let updated = self
            .store
            .compare_and_set(
                id,
                previous_status,
                Box::new(|j| j.status = JobStatus::Cancelled),
            )
            .await?
            .ok_or_else(|| BrokerError::state_error(previous_status, JobStatus::Cancelled))?;

        info!(job_id = %id, "job cancelled");
        Ok((updated, previous_status))
    }

    /// `expire(id)` — OPEN -> EXPIRED, invoked by the background sweep.
    /// Returns `Ok(None)` when the job was not eligible (already
    /// transitioned, or its deadline has not passed) rather than erroring —
    /// the sweep is expected to skip ineligible jobs silently.
    pub async fn expire(&self, id: &JobId) -> Result<Option<Job>, BrokerError> {
        let job = self.require(id).await?;
        if job.status != JobStatus::Open || Utc::now() <= job.expires_at {
            return Ok(None);
        }

        let updated = self
            .store
            .compare_and_set(
                id,
                JobStatus::Open,
                Box::new(|j| j.status = JobStatus::Expired),
            )
            .await?;
        if updated.is_some() {
            info!(job_id = %id, "job expired");
        }
        Ok(updated)
    }

    async fn require(&self, id: &JobId) -> Result<Job, BrokerError> {
        self.store
            .get(id)
            .await
            .ok_or_else(|| BrokerError::not_found(format!("job {} not found", id)))
    }
}

// Copyright (c) 2026 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Durable system of record for jobs, with the single atomic conditional
//! write primitive every state transition goes through.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::model::{Job, JobId, JobStatus};
use crate::errors::BrokerError;

/// A mutation closure applied to a job already known to be in the expected
/// state. Kept as a plain function pointer over `&mut Job` rather than a
/// boxed closure type so callers can pass ordinary functions.
pub type Mutation = Box<dyn FnOnce(&mut Job) + Send>;

#[async_trait]
pub trait JobStore: Send + Sync {
    async fn insert(&self, job: Job) -> Result<(), BrokerError>;
    async fn get(&self, id: &JobId) -> Option<Job>;
    async fn list(&self, status: Option<JobStatus>) -> Vec<Job>;
    async fn compare_and_set(
        &self,
        id: &JobId,
        expected: JobStatus,
        mutate: Mutation,
    ) -> Result<Option<Job>, BrokerError>;
}

#[derive(Default)]
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<JobId, Job>>,
}

impl MemoryJobStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn insert(&self, job: Job) -> Result<(), BrokerError> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job.id) {
            return Err(BrokerError::internal(format!(
                "job {} already exists",
                job.id
            )));
        }
        jobs.insert(job.id.clone(), job);
        Ok(())
    }

    async fn get(&self, id: &JobId) -> Option<Job> {
        self.jobs.read().await.get(id).cloned()
    }

    async fn list(&self, status: Option<JobStatus>) -> Vec<Job> {
        let jobs = self.jobs.read().await;
        let mut out: Vec<Job> = jobs
            .values()
            .filter(|j| status.map(|s| j.status == s).unwrap_or(true))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        out
    }

    async fn compare_and_set(
        &self,
        id: &JobId,
        expected: JobStatus,
        mutate: Mutation,
    ) -> Result<Option<Job>, BrokerError> {
        let mut jobs = self.jobs.write().await;
        let Some(job) = jobs.get_mut(id) else {
            return Ok(None);
        };
        if job.status != expected {
            return Ok(None);
        }
        mutate(job);
        Ok(Some(job.clone()))
    }
}

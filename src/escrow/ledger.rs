// Copyright (c) 2026 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Escrow records and the used-deposit replay-protection set.
//!
//! A single lock guards both the per-job record map and the used-deposit
//! set so `record_deposit` can perform its replay check, its one-record-
//! per-job check, and its insert as one atomic step (spec.md §4.3 steps
//! 1-4), matching the "insert-failure is the replay signal" guidance in
//! spec.md §9.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::chain::TxSignature;
use crate::errors::BrokerError;
use crate::jobs::JobId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscrowStatus {
    Held,
    Released,
    Refunded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscrowRecord {
    pub job_id: JobId,
    pub requester_wallet: String,
    pub worker_wallet: Option<String>,
    pub amount_atomic: u64,
    pub deposit_tx_sig: TxSignature,
    pub status: EscrowStatus,
    pub release_tx_sig: Option<TxSignature>,
    pub released_at: Option<DateTime<Utc>>,
}

struct LedgerState {
    records: HashMap<JobId, EscrowRecord>,
    used_deposits: HashSet<TxSignature>,
}

#[async_trait]
pub trait EscrowLedger: Send + Sync {
    async fn get(&self, job_id: &JobId) -> Option<EscrowRecord>;
    async fn is_deposit_used(&self, tx_sig: &TxSignature) -> bool;

    /// Atomically check replay + one-per-job, then insert. `Err` carries a
    /// `payment_invalid` reason when either check fails.
    async fn record_deposit(&self, record: EscrowRecord) -> Result<(), BrokerError>;

    async fn mark_released(
        &self,
        job_id: &JobId,
        release_tx_sig: TxSignature,
        worker_wallet: String,
    ) -> Result<EscrowRecord, BrokerError>;

    async fn mark_refunded(
        &self,
        job_id: &JobId,
        release_tx_sig: TxSignature,
    ) -> Result<EscrowRecord, BrokerError>;
}

pub struct MemoryEscrowLedger {
    state: RwLock<LedgerState>,
}

impl MemoryEscrowLedger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: RwLock::new(LedgerState {
                records: HashMap::new(),
                used_deposits: HashSet::new(),
            }),
        })
    }
}

#[async_trait]
impl EscrowLedger for MemoryEscrowLedger {
    async fn get(&self, job_id: &JobId) -> Option<EscrowRecord> {
        self.state.read().await.records.get(job_id).cloned()
    }

    async fn is_deposit_used(&self, tx_sig: &TxSignature) -> bool {
        self.state.read().await.used_deposits.contains(tx_sig)
    }

    async fn record_deposit(&self, record: EscrowRecord) -> Result<(), BrokerError> {
        let mut state = self.state.write().await;
        if state.used_deposits.contains(&record.deposit_tx_sig) {
            return Err(BrokerError::payment_invalid(
                "deposit transaction already used",
            ));
        }
        if state.records.contains_key(&record.job_id) {
            return Err(BrokerError::payment_invalid(
                "escrow already recorded for this job",
            ));
        }
        state.used_deposits.insert(record.deposit_tx_sig.clone());
        state.records.insert(record.job_id.clone(), record);
        Ok(())
    }

    async fn mark_released(
        &self,
        job_id: &JobId,
        release_tx_sig: TxSignature,
        worker_wallet: String,
    ) -> Result<EscrowRecord, BrokerError> {
        let mut state = self.state.write().await;
        let record = state
            .records
            .get_mut(job_id)
            .ok_or_else(|| BrokerError::not_found("no escrow record for job"))?;
        if record.status != EscrowStatus::Held {
            return Err(BrokerError::internal("escrow record is not held"));
        }
        record.status = EscrowStatus::Released;
        record.release_tx_sig = Some(release_tx_sig);
        record.released_at = Some(Utc::now());
        record.worker_wallet = Some(worker_wallet);
        Ok(record.clone())
    }

    async fn mark_refunded(
        &self,
        job_id: &JobId,
        release_tx_sig: TxSignature,
    ) -> Result<EscrowRecord, BrokerError> {
        let mut state = self.state.write().await;
        let record = state
            .records
            .get_mut(job_id)
            .ok_or_else(|| BrokerError::not_found("no escrow record for job"))?;
        if record.status != EscrowStatus::Held {
            return Err(BrokerError::internal("escrow record is not held"));
        }
        record.status = EscrowStatus::Refunded;
        record.release_tx_sig = Some(release_tx_sig);
        record.released_at = Some(Utc::now());
        Ok(record.clone())
    }
}

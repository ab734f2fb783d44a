// Copyright (c) 2026 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque job identifier: `job_` followed by 8 hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    pub fn generate() -> Self {
        let bytes: [u8; 4] = rand::random();
        Self(format!("job_{}", hex::encode(bytes)))
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for JobId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    PendingDeposit,
    Open,
    Claimed,
    Completed,
    Paid,
    Cancelled,
    Expired,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::PendingDeposit => "PENDING_DEPOSIT",
            JobStatus::Open => "OPEN",
            JobStatus::Claimed => "CLAIMED",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Paid => "PAID",
            JobStatus::Cancelled => "CANCELLED",
            JobStatus::Expired => "EXPIRED",
        };
        write!(f, "{}", s)
    }
}

/// The central job entity. See spec.md §3 for the authoritative field
/// semantics; this struct carries them verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: JobId,
    pub title: String,
    pub description: String,
    pub bounty_usdc: f64,
    pub bounty_atomic: u64,
    pub requester_wallet: String,
    pub worker_wallet: Option<String>,
    pub status: JobStatus,
    pub result: Option<String>,
    pub created_at: DateTime<Utc>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub deposit_tx_sig: Option<String>,
    pub payment_tx_sig: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub tags: Vec<String>,
}

impl Job {
    /// True when the result field is expected to be populated (I4).
    pub fn should_have_result(&self) -> bool {
        matches!(self.status, JobStatus::Completed | JobStatus::Paid)
    }
}

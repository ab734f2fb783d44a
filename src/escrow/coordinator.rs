// Copyright (c) 2026 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Escrow Coordinator: the only component that moves funds. Verifies
//! deposits against chain state, splits and releases payouts, and issues
//! refunds. Grounded on the teacher's `payment_claim.rs` `PaymentSplitter`
//! (fee-split arithmetic) and `job_processor.rs` (per-job serialization of
//! settlement actions).

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use super::ledger::{EscrowLedger, EscrowRecord, EscrowStatus};
use crate::chain::{ChainAdapter, TransferInstruction, TxSignature, UnsignedTransaction, WalletAddress};
use crate::errors::BrokerError;
use crate::jobs::{JobId, JobService};

#[derive(Debug, Clone)]
pub struct EscrowConfig {
    pub escrow_wallet: WalletAddress,
    pub platform_wallet: Option<WalletAddress>,
    pub asset_mint: String,
    /// Platform fee, in basis points of the bounty (spec.md §4.3's
    /// `PLATFORM_FEE_PERCENT` times 100).
    pub fee_basis_points: u64,
}

/// `platformFee = amountAtomic × feeBasisPoints / 10000` (integer division,
/// remainder to the worker) — spec.md §4.3 step 2. Shared with the paywall
/// middleware so both settlement paths compute the identical split.
pub fn split_fee(amount_atomic: u64, fee_basis_points: u64) -> (u64, u64) {
    let fee = amount_atomic * fee_basis_points / 10_000;
    (amount_atomic - fee, fee)
}

pub struct EscrowCoordinator {
    ledger: Arc<dyn EscrowLedger>,
    chain: Arc<dyn ChainAdapter>,
    jobs: Arc<JobService>,
    config: EscrowConfig,
    locks: Mutex<HashMap<JobId, Arc<Mutex<()>>>>,
}

impl EscrowCoordinator {
    pub fn new(
        ledger: Arc<dyn EscrowLedger>,
        chain: Arc<dyn ChainAdapter>,
        jobs: Arc<JobService>,
        config: EscrowConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            ledger,
            chain,
            jobs,
            config,
            locks: Mutex::new(HashMap::new()),
        })
    }

    async fn lock_for(&self, job_id: &JobId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(job_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Verify a claimed deposit against the chain, record it in the ledger,
    /// and activate the job. Mirrors spec.md §4.3 steps 1-4: replay check,
    /// balance-change match, atomic record, activation.
    pub async fn verify_deposit(
        &self,
        job_id: &JobId,
        requester_wallet: &str,
        expected_atomic: u64,
        deposit_tx_sig: TxSignature,
    ) -> Result<(), BrokerError> {
        if self.ledger.is_deposit_used(&deposit_tx_sig).await {
            return Err(BrokerError::payment_invalid(
                "deposit transaction already used",
            ));
        }

        let confirmed = self
            .chain
            .get_confirmed(&deposit_tx_sig)
            .await
            .map_err(|e| BrokerError::payment_backend(e.to_string()))?;

        let received = confirmed.balance_changes.iter().any(|entry| {
            entry.owner == self.config.escrow_wallet
                && entry.mint == self.config.asset_mint
                && entry.delta_atomic >= expected_atomic as i128
        });
        if !received {
            return Err(BrokerError::payment_invalid(
                "deposit transaction does not credit the escrow wallet with the expected amount",
            ));
        }

        self.ledger
            .record_deposit(EscrowRecord {
                job_id: job_id.clone(),
                requester_wallet: requester_wallet.to_string(),
                worker_wallet: None,
                amount_atomic: expected_atomic,
                deposit_tx_sig: deposit_tx_sig.clone(),
                status: EscrowStatus::Held,
                release_tx_sig: None,
                released_at: None,
            })
            .await?;

        self.jobs.activate(job_id, deposit_tx_sig).await?;
        info!(job_id = %job_id, "deposit verified, escrow held");
        Ok(())
    }

    /// Release held funds to the worker, minus the platform fee, then mark
    /// the job PAID. Idempotent: a second call after the job is already
    /// PAID returns `Ok` without moving funds again.
    pub async fn release_to_worker(
        &self,
        job_id: &JobId,
        worker_wallet: WalletAddress,
    ) -> Result<(), BrokerError> {
        let guard = self.lock_for(job_id).await;
        let _guard = guard.lock().await;

        let record = self
            .ledger
            .get(job_id)
            .await
            .ok_or_else(|| BrokerError::not_found("no escrow record for job"))?;
        if record.status != EscrowStatus::Held {
            return Ok(());
        }

        let (worker_amount, platform_fee) =
            split_fee(record.amount_atomic, self.config.fee_basis_points);

        let mut transfers = vec![TransferInstruction {
            from: self.config.escrow_wallet.clone(),
            to: worker_wallet.clone(),
            mint: self.config.asset_mint.clone(),
            amount_atomic: worker_amount,
        }];
        if platform_fee > 0 {
            if let Some(platform_wallet) = &self.config.platform_wallet {
                transfers.push(TransferInstruction {
                    from: self.config.escrow_wallet.clone(),
                    to: platform_wallet.clone(),
                    mint: self.config.asset_mint.clone(),
                    amount_atomic: platform_fee,
                });
            }
        }

        let release_tx_sig = self
            .chain
            .sign_and_submit(UnsignedTransaction {
                transfers,
                create_ata_for: vec![worker_wallet.clone()],
            })
            .await
            .map_err(|e| BrokerError::payment_backend(e.to_string()))?;

        self.ledger
            .mark_released(job_id, release_tx_sig.clone(), worker_wallet)
            .await?;
        self.jobs.mark_paid(job_id, release_tx_sig).await?;
        info!(job_id = %job_id, platform_fee, "escrow released to worker");
        Ok(())
    }

    /// Refund the full held amount back to the requester. Used when a
    /// deposited job is cancelled before being claimed.
    pub async fn refund_to_requester(&self, job_id: &JobId) -> Result<(), BrokerError> {
        let guard = self.lock_for(job_id).await;
        let _guard = guard.lock().await;

        let record = self
            .ledger
            .get(job_id)
            .await
            .ok_or_else(|| BrokerError::not_found("no escrow record for job"))?;
        if record.status != EscrowStatus::Held {
            return Ok(());
        }

        let refund_tx_sig = self
            .chain
            .sign_and_submit(UnsignedTransaction {
                transfers: vec![TransferInstruction {
                    from: self.config.escrow_wallet.clone(),
                    to: record.requester_wallet.clone(),
                    mint: self.config.asset_mint.clone(),
                    amount_atomic: record.amount_atomic,
                }],
                create_ata_for: vec![],
            })
            .await
            .map_err(|e| BrokerError::payment_backend(e.to_string()))?;

        self.ledger.mark_refunded(job_id, refund_tx_sig).await?;
        info!(job_id = %job_id, "escrow refunded to requester");
        Ok(())
    }

    /// Whether a held escrow record exists for this job — used by the
    /// result handler to prefer escrow release over the paywall fallback.
    pub async fn is_held(&self, job_id: &JobId) -> bool {
        matches!(self.ledger.get(job_id).await, Some(record) if record.status == EscrowStatus::Held)
    }

    /// Convenience for the cancel/expire paths: refund only if an escrow
    /// record exists and is still held, otherwise a no-op.
    pub async fn refund_if_held(&self, job_id: &JobId) -> Result<(), BrokerError> {
        match self.ledger.get(job_id).await {
            Some(record) if record.status == EscrowStatus::Held => {
                self.refund_to_requester(job_id).await
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::mock::MockChainAdapter;
    use crate::events::BroadcastEventBus;
    use crate::jobs::store::MemoryJobStore;
    use crate::jobs::{CreateJobInput, JobStatus};
    use crate::escrow::ledger::MemoryEscrowLedger;

    fn wallet() -> String {
        bs58::encode(rand::random::<[u8; 32]>()).into_string()
    }

    fn config(escrow_wallet: &str, platform_wallet: &str) -> EscrowConfig {
        EscrowConfig {
            escrow_wallet: escrow_wallet.to_string(),
            platform_wallet: Some(platform_wallet.to_string()),
            asset_mint: "USDC".to_string(),
            fee_basis_points: 500, // 5%
        }
    }

    async fn setup() -> (Arc<JobService>, Arc<MockChainAdapter>, Arc<EscrowCoordinator>, String, String) {
        let store = MemoryJobStore::new();
        let events = Arc::new(BroadcastEventBus::default());
        let jobs = Arc::new(JobService::new(store, events));
        let chain = MockChainAdapter::new();
        let ledger = MemoryEscrowLedger::new();
        let escrow_wallet = wallet();
        let platform_wallet = wallet();
        let coordinator = EscrowCoordinator::new(
            ledger,
            chain.clone(),
            jobs.clone(),
            config(&escrow_wallet, &platform_wallet),
        );
        (jobs, chain, coordinator, escrow_wallet, platform_wallet)
    }

    #[tokio::test]
    async fn deposit_then_release_splits_the_fee() {
        let (jobs, chain, coordinator, escrow_wallet, _platform) = setup().await;
        let requester = wallet();
        let worker = wallet();

        let job = jobs
            .create(CreateJobInput {
                title: "t".into(),
                description: "d".into(),
                bounty_usdc: 100.0,
                requester_wallet: requester.clone(),
                tags: vec![],
            })
            .await
            .unwrap();

        let deposit_sig = chain
            .simulate_deposit(&escrow_wallet, "USDC", 100_000_000)
            .await;
        coordinator
            .verify_deposit(&job.id, &requester, 100_000_000, deposit_sig)
            .await
            .unwrap();

        let job = jobs.claim(&job.id, worker.clone()).await.unwrap();
        assert_eq!(job.status, JobStatus::Claimed);
        jobs.complete(&job.id, "done".into(), &worker).await.unwrap();

        coordinator.release_to_worker(&job.id, worker).await.unwrap();
        let job = jobs.get(&job.id).await.unwrap();
        assert_eq!(job.status, JobStatus::Paid);
    }

    #[tokio::test]
    async fn replayed_deposit_signature_is_rejected() {
        let (jobs, chain, coordinator, escrow_wallet, _platform) = setup().await;
        let requester = wallet();

        let job_a = jobs
            .create(CreateJobInput {
                title: "a".into(),
                description: "d".into(),
                bounty_usdc: 10.0,
                requester_wallet: requester.clone(),
                tags: vec![],
            })
            .await
            .unwrap();
        let job_b = jobs
            .create(CreateJobInput {
                title: "b".into(),
                description: "d".into(),
                bounty_usdc: 10.0,
                requester_wallet: requester.clone(),
                tags: vec![],
            })
            .await
            .unwrap();

        let deposit_sig = chain
            .simulate_deposit(&escrow_wallet, "USDC", 10_000_000)
            .await;
        coordinator
            .verify_deposit(&job_a.id, &requester, 10_000_000, deposit_sig.clone())
            .await
            .unwrap();

        let err = coordinator
            .verify_deposit(&job_b.id, &requester, 10_000_000, deposit_sig)
            .await
            .unwrap_err();
        assert_eq!(err.kind, crate::errors::ErrorKind::PaymentInvalid);
    }

    #[tokio::test]
    async fn cancel_before_claim_refunds_in_full() {
        let (jobs, chain, coordinator, escrow_wallet, _platform) = setup().await;
        let requester = wallet();

        let job = jobs
            .create(CreateJobInput {
                title: "t".into(),
                description: "d".into(),
                bounty_usdc: 10.0,
                requester_wallet: requester.clone(),
                tags: vec![],
            })
            .await
            .unwrap();
        let deposit_sig = chain
            .simulate_deposit(&escrow_wallet, "USDC", 10_000_000)
            .await;
        coordinator
            .verify_deposit(&job.id, &requester, 10_000_000, deposit_sig)
            .await
            .unwrap();

        let (_, previous_status) = jobs.cancel(&job.id, &requester).await.unwrap();
        assert_eq!(previous_status, JobStatus::Open);
        coordinator.refund_if_held(&job.id).await.unwrap();

        // A second refund attempt on an already-refunded record is a no-op.
        coordinator.refund_if_held(&job.id).await.unwrap();
    }
}

// Copyright (c) 2026 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! The x402 paywall: the 402 challenge/response flow guarding
//! `GET /results/:jobId` (spec.md §4.4), grounded on the coinbase-x402
//! facilitator's `verify`/`settle` split — header transport and base64(JSON)
//! framing are this crate's own, since the facilitator example talks EVM
//! EIP-3009 authorizations rather than a signed Solana-style transaction.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::chain::ChainAdapter;
use crate::errors::BrokerError;
use crate::escrow::split_fee;
use crate::jobs::{Job, JobService};

#[derive(Debug, Clone)]
pub struct PaywallConfig {
    pub network: String,
    pub asset_mint: String,
    pub fee_basis_points: u64,
    pub platform_wallet: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentAccept {
    pub scheme: String,
    pub network: String,
    pub max_amount_required: u64,
    pub asset: String,
    pub pay_to: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeBreakdown {
    pub total: u64,
    pub worker: FeeShare,
    pub platform: Option<PlatformShare>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeShare {
    pub address: String,
    pub amount: u64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformShare {
    pub address: String,
    pub amount: u64,
    pub percent: f64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentChallenge {
    pub accepts: Vec<PaymentAccept>,
    pub breakdown: Option<FeeBreakdown>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaymentHeaderPayload {
    serialized_transaction: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResponsePayload {
    pub tx_sig: String,
    pub success: bool,
    pub breakdown: Option<FeeBreakdown>,
}

pub struct Paywall {
    chain: Arc<dyn ChainAdapter>,
    jobs: Arc<JobService>,
    config: PaywallConfig,
}

impl Paywall {
    pub fn new(chain: Arc<dyn ChainAdapter>, jobs: Arc<JobService>, config: PaywallConfig) -> Self {
        Self { chain, jobs, config }
    }

    /// Builds the `X-Payment-Required` challenge for a COMPLETED job without
    /// a presented `X-Payment` header.
    pub fn challenge_for(&self, job: &Job) -> PaymentChallenge {
        let (worker_amount, platform_fee) =
            split_fee(job.bounty_atomic, self.config.fee_basis_points);
        let worker_wallet = job.worker_wallet.clone().unwrap_or_default();

        let breakdown = if platform_fee > 0 {
            self.config.platform_wallet.as_ref().map(|platform_wallet| FeeBreakdown {
                total: job.bounty_atomic,
                worker: FeeShare {
                    address: worker_wallet.clone(),
                    amount: worker_amount,
                },
                platform: Some(PlatformShare {
                    address: platform_wallet.clone(),
                    amount: platform_fee,
                    percent: self.config.fee_basis_points as f64 / 100.0,
                }),
            })
        } else {
            None
        };

        PaymentChallenge {
            accepts: vec![PaymentAccept {
                scheme: "exact".to_string(),
                network: self.config.network.clone(),
                max_amount_required: job.bounty_atomic,
                asset: self.config.asset_mint.clone(),
                pay_to: worker_wallet,
            }],
            breakdown,
        }
    }

    pub fn encode_challenge(&self, job: &Job) -> String {
        let challenge = self.challenge_for(job);
        BASE64.encode(serde_json::to_vec(&challenge).expect("challenge is always serializable"))
    }

    /// Decode, submit, and verify the `X-Payment` header presented against
    /// a COMPLETED job, then mark it PAID. Returns the base64(JSON) body for
    /// `X-Payment-Response` on success.
    pub async fn settle(
        &self,
        job: &Job,
        payment_header_b64: &str,
    ) -> Result<String, BrokerError> {
        let raw = BASE64
            .decode(payment_header_b64)
            .map_err(|_| BrokerError::payment_invalid("X-Payment header is not valid base64"))?;
        let payload: PaymentHeaderPayload = serde_json::from_slice(&raw)
            .map_err(|_| BrokerError::payment_invalid("X-Payment header is not valid JSON"))?;
        let signed_tx = BASE64
            .decode(&payload.serialized_transaction)
            .map_err(|_| BrokerError::payment_invalid("serializedTransaction is not valid base64"))?;

        let tx_sig = self
            .chain
            .submit(&signed_tx)
            .await
            .map_err(|e| BrokerError::payment_backend(e.to_string()))?;
        self.chain
            .confirm(&tx_sig)
            .await
            .map_err(|e| BrokerError::payment_backend(e.to_string()))?;
        let confirmed = self
            .chain
            .get_confirmed(&tx_sig)
            .await
            .map_err(|e| BrokerError::payment_backend(e.to_string()))?;

        let (worker_amount, _platform_fee) =
            split_fee(job.bounty_atomic, self.config.fee_basis_points);
        let required = if self.config.fee_basis_points > 0 {
            worker_amount
        } else {
            job.bounty_atomic
        };
        let worker_wallet = job.worker_wallet.as_deref().unwrap_or_default();

        let satisfied = confirmed.balance_changes.iter().any(|entry| {
            entry.owner == worker_wallet
                && entry.mint == self.config.asset_mint
                && entry.delta_atomic >= required as i128
        });
        if !satisfied {
            warn!(job_id = %job.id, %tx_sig, "paywall submission did not meet the required amount");
            return Err(BrokerError::payment_invalid(
                "submitted transaction does not pay the worker the required amount",
            ));
        }

        // markPaid is idempotent: if escrow release already won, this is a
        // successful no-op (spec.md §4.4's "two settlement paths" note).
        self.jobs.mark_paid(&job.id, tx_sig.clone()).await?;
        info!(job_id = %job.id, %tx_sig, "paywall settlement accepted");

        let response = PaymentResponsePayload {
            tx_sig,
            success: true,
            breakdown: None,
        };
        Ok(BASE64.encode(serde_json::to_vec(&response).expect("response is always serializable")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::mock::MockChainAdapter;
    use crate::events::BroadcastEventBus;
    use crate::jobs::store::MemoryJobStore;
    use crate::jobs::CreateJobInput;

    fn wallet() -> String {
        bs58::encode(rand::random::<[u8; 32]>()).into_string()
    }

    async fn setup() -> (Arc<JobService>, Arc<MockChainAdapter>, Paywall, Job) {
        let store = MemoryJobStore::new();
        let events = Arc::new(BroadcastEventBus::default());
        let jobs = Arc::new(JobService::new(store, events));
        let chain = MockChainAdapter::new();

        let requester = wallet();
        let worker = wallet();
        let job = jobs
            .create(CreateJobInput {
                title: "t".into(),
                description: "d".into(),
                bounty_usdc: 0.1,
                requester_wallet: requester,
                tags: vec![],
            })
            .await
            .unwrap();
        let job = jobs.activate(&job.id, "dep-sig".into()).await.unwrap();
        let job = jobs.claim(&job.id, worker.clone()).await.unwrap();
        let job = jobs.complete(&job.id, "RESULT".into(), &worker).await.unwrap();

        let paywall = Paywall::new(
            chain.clone(),
            jobs.clone(),
            PaywallConfig {
                network: "solana-devnet".into(),
                asset_mint: "USDC".into(),
                fee_basis_points: 0,
                platform_wallet: None,
            },
        );
        (jobs, chain, paywall, job)
    }

    #[tokio::test]
    async fn challenge_carries_the_exact_bounty() {
        let (_, _, paywall, job) = setup().await;
        let challenge = paywall.challenge_for(&job);
        assert_eq!(challenge.accepts[0].max_amount_required, 100_000);
        assert_eq!(challenge.accepts[0].scheme, "exact");
    }

    #[tokio::test]
    async fn valid_payment_marks_job_paid() {
        let (jobs, _chain, paywall, job) = setup().await;
        let worker_wallet = job.worker_wallet.clone().unwrap();

        let transfer = crate::chain::TransferInstruction {
            from: "payer".into(),
            to: worker_wallet,
            mint: "USDC".into(),
            amount_atomic: 100_000,
        };
        let serialized_tx = BASE64.encode(serde_json::to_vec(&transfer).unwrap());
        let header = BASE64.encode(
            serde_json::to_vec(&serde_json::json!({ "serializedTransaction": serialized_tx }))
                .unwrap(),
        );

        let response_b64 = paywall.settle(&job, &header).await.unwrap();
        let response: PaymentResponsePayload =
            serde_json::from_slice(&BASE64.decode(response_b64).unwrap()).unwrap();
        assert!(response.success);

        let job = jobs.get(&job.id).await.unwrap();
        assert_eq!(job.status, crate::jobs::JobStatus::Paid);
        assert_eq!(job.payment_tx_sig.as_deref(), Some(response.tx_sig.as_str()));
    }

    #[tokio::test]
    async fn underpaying_transaction_is_rejected() {
        let (_jobs, _chain, paywall, job) = setup().await;
        let worker_wallet = job.worker_wallet.clone().unwrap();

        let transfer = crate::chain::TransferInstruction {
            from: "payer".into(),
            to: worker_wallet,
            mint: "USDC".into(),
            amount_atomic: 1, // far short of the 100_000 bounty
        };
        let serialized_tx = BASE64.encode(serde_json::to_vec(&transfer).unwrap());
        let header = BASE64.encode(
            serde_json::to_vec(&serde_json::json!({ "serializedTransaction": serialized_tx }))
                .unwrap(),
        );

        let err = paywall.settle(&job, &header).await.unwrap_err();
        assert_eq!(err.kind, crate::errors::ErrorKind::PaymentInvalid);
    }
}

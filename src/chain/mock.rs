// Copyright (c) 2026 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! In-memory chain adapter used by tests and by `DEMO_MODE`. Never wired in
//! when `DEMO_MODE` is unset (see `config::AppConfig`).

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{ChainAdapter, ConfirmedTransaction, TokenBalanceEntry, TxSignature, UnsignedTransaction, WalletAddress};

#[derive(Default)]
pub struct MockChainAdapter {
    confirmed: RwLock<HashMap<TxSignature, ConfirmedTransaction>>,
}

impl MockChainAdapter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn random_signature() -> TxSignature {
        let bytes: [u8; 32] = rand::random();
        bs58::encode(bytes).into_string()
    }

    /// Simulate an externally-submitted deposit transaction landing on
    /// chain, as a test or `DEMO_MODE` fixture would. Returns the
    /// signature so callers can feed it to `/jobs/:id/deposit`.
    pub async fn simulate_deposit(
        &self,
        to: &WalletAddress,
        mint: &str,
        amount_atomic: u64,
    ) -> TxSignature {
        let signature = Self::random_signature();
        let tx = ConfirmedTransaction {
            signature: signature.clone(),
            balance_changes: vec![TokenBalanceEntry {
                owner: to.clone(),
                mint: mint.to_string(),
                delta_atomic: amount_atomic as i128,
            }],
        };
        self.confirmed.write().await.insert(signature.clone(), tx);
        signature
    }
}

#[async_trait]
impl ChainAdapter for MockChainAdapter {
    async fn submit(&self, signed_tx: &[u8]) -> anyhow::Result<TxSignature> {
        // In this fake, "signed" transactions are a JSON-encoded transfer
        // description. Real signature verification belongs to the
        // out-of-scope chain client.
        let instr: super::TransferInstruction = serde_json::from_slice(signed_tx)
            .map_err(|e| anyhow::anyhow!("malformed simulated transaction: {e}"))?;
        let signature = Self::random_signature();
        let tx = ConfirmedTransaction {
            signature: signature.clone(),
            balance_changes: vec![TokenBalanceEntry {
                owner: instr.to,
                mint: instr.mint,
                delta_atomic: instr.amount_atomic as i128,
            }],
        };
        self.confirmed.write().await.insert(signature.clone(), tx);
        Ok(signature)
    }

    async fn confirm(&self, signature: &TxSignature) -> anyhow::Result<()> {
        if self.confirmed.read().await.contains_key(signature) {
            Ok(())
        } else {
            Err(anyhow::anyhow!("unknown transaction {signature}"))
        }
    }

    async fn get_confirmed(&self, signature: &TxSignature) -> anyhow::Result<ConfirmedTransaction> {
        self.confirmed
            .read()
            .await
            .get(signature)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("unknown transaction {signature}"))
    }

    async fn compute_ata(&self, owner: &WalletAddress, mint: &str) -> anyhow::Result<WalletAddress> {
        let mut hasher = Sha256::new();
        hasher.update(owner.as_bytes());
        hasher.update(mint.as_bytes());
        let digest = hasher.finalize();
        Ok(bs58::encode(&digest[..32]).into_string())
    }

    async fn sign_and_submit(&self, tx: UnsignedTransaction) -> anyhow::Result<TxSignature> {
        let signature = Self::random_signature();
        let mut balance_changes = Vec::new();
        for transfer in &tx.transfers {
            balance_changes.push(TokenBalanceEntry {
                owner: transfer.to.clone(),
                mint: transfer.mint.clone(),
                delta_atomic: transfer.amount_atomic as i128,
            });
            balance_changes.push(TokenBalanceEntry {
                owner: transfer.from.clone(),
                mint: transfer.mint.clone(),
                delta_atomic: -(transfer.amount_atomic as i128),
            });
        }
        let confirmed = ConfirmedTransaction {
            signature: signature.clone(),
            balance_changes,
        };
        self.confirmed.write().await.insert(signature.clone(), confirmed);
        Ok(signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn simulated_deposit_is_retrievable() {
        let chain = MockChainAdapter::new();
        let sig = chain.simulate_deposit(&"escrow-wallet".to_string(), "USDC", 100_000).await;
        let tx = chain.get_confirmed(&sig).await.unwrap();
        assert_eq!(tx.balance_changes[0].delta_atomic, 100_000);
    }

    #[tokio::test]
    async fn unknown_signature_is_an_error() {
        let chain = MockChainAdapter::new();
        assert!(chain.get_confirmed(&"nope".to_string()).await.is_err());
    }
}

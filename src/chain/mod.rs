// Copyright (c) 2026 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! The chain adapter seam. Everything on the other side of this trait — the
//! RPC client, transaction construction and signing, key custody — is an
//! external collaborator out of scope for this crate (spec.md §1, §9). This
//! module only defines the interface the Escrow Coordinator and the x402
//! middleware program against, plus an in-memory fake used by tests and by
//! `DEMO_MODE`.

pub mod mock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub type WalletAddress = String;
pub type TxSignature = String;

/// A single post-transaction balance observation for one token account, as
/// the chain adapter would report it from `getConfirmed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenBalanceEntry {
    pub owner: WalletAddress,
    pub mint: String,
    /// Net atomic-unit delta this transaction caused for `owner`'s token
    /// account for `mint`. Positive means the account received funds.
    pub delta_atomic: i128,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmedTransaction {
    pub signature: TxSignature,
    pub balance_changes: Vec<TokenBalanceEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferInstruction {
    pub from: WalletAddress,
    pub to: WalletAddress,
    pub mint: String,
    pub amount_atomic: u64,
}

/// A transaction the Escrow Coordinator builds before signing and
/// submitting it. Mirrors spec.md §4.3's "single chain transaction
/// composed of [...] transfer instructions".
#[derive(Debug, Clone, Default)]
pub struct UnsignedTransaction {
    pub transfers: Vec<TransferInstruction>,
    pub create_ata_for: Vec<WalletAddress>,
}

#[async_trait]
pub trait ChainAdapter: Send + Sync {
    /// Submit a raw signed transaction, returning its signature once
    /// accepted by the network (not yet necessarily confirmed).
    async fn submit(&self, signed_tx: &[u8]) -> anyhow::Result<TxSignature>;

    /// Await confirmation of a previously submitted signature.
    async fn confirm(&self, signature: &TxSignature) -> anyhow::Result<()>;

    /// Fetch a confirmed transaction's balance deltas.
    async fn get_confirmed(&self, signature: &TxSignature) -> anyhow::Result<ConfirmedTransaction>;

    /// Compute the associated token account address for an owner/mint pair.
    async fn compute_ata(&self, owner: &WalletAddress, mint: &str) -> anyhow::Result<WalletAddress>;

    /// Sign and submit an unsigned transaction built by the Escrow
    /// Coordinator, returning once the transaction is confirmed.
    async fn sign_and_submit(&self, tx: UnsignedTransaction) -> anyhow::Result<TxSignature>;
}

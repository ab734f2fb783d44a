// Copyright (c) 2026 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Schema and range validation for inbound request bodies.
//!
//! Kept separate from the HTTP layer so the same rules apply whether a
//! value arrives via JSON body or, in tests, a direct service call.

use crate::errors::BrokerError;

const MAX_BOUNTY_ATOMIC: u64 = 1_000_000_000; // 1000.0 USDC at 6 decimals
const TITLE_LEN: (usize, usize) = (1, 200);
const DESCRIPTION_LEN: (usize, usize) = (1, 5000);
const RESULT_LEN: (usize, usize) = (1, 100_000);
const TAG_LEN: (usize, usize) = (1, 32);
const MAX_TAGS: usize = 10;

/// Round `usdc` to atomic units (10^6 per display unit) and check it falls
/// in `0 < bountyAtomic <= 1_000_000_000`. Validating on the atomic value
/// (rather than the display value) makes the 1000.000001 boundary reject
/// itself without a separate float-epsilon comparison.
pub fn bounty_atomic(usdc: f64) -> Result<u64, BrokerError> {
    if !usdc.is_finite() || usdc <= 0.0 {
        return Err(BrokerError::validation("bountyUsdc must be positive"));
    }
    let atomic = (usdc * 1_000_000.0).round();
    if atomic < 1.0 || atomic > MAX_BOUNTY_ATOMIC as f64 {
        return Err(BrokerError::validation(
            "bountyUsdc must be in (0, 1000.0]",
        ));
    }
    Ok(atomic as u64)
}

fn char_len_in_range(s: &str, (min, max): (usize, usize), field: &str) -> Result<(), BrokerError> {
    let len = s.chars().count();
    if len < min || len > max {
        return Err(BrokerError::validation(format!(
            "{} must be between {} and {} characters",
            field, min, max
        )));
    }
    Ok(())
}

pub fn title(s: &str) -> Result<(), BrokerError> {
    char_len_in_range(s, TITLE_LEN, "title")
}

pub fn description(s: &str) -> Result<(), BrokerError> {
    char_len_in_range(s, DESCRIPTION_LEN, "description")
}

pub fn result(s: &str) -> Result<(), BrokerError> {
    char_len_in_range(s, RESULT_LEN, "result")
}

pub fn tags(tags: &[String]) -> Result<(), BrokerError> {
    if tags.len() > MAX_TAGS {
        return Err(BrokerError::validation(format!(
            "at most {} tags allowed",
            MAX_TAGS
        )));
    }
    for tag in tags {
        char_len_in_range(tag, TAG_LEN, "tag")?;
    }
    Ok(())
}

/// Solana-style base58 wallet address: decodes to exactly 32 bytes.
pub fn wallet_address(s: &str) -> Result<(), BrokerError> {
    if s.len() < 32 || s.len() > 44 {
        return Err(BrokerError::validation("invalid wallet address"));
    }
    let bytes = bs58::decode(s)
        .into_vec()
        .map_err(|_| BrokerError::validation("invalid wallet address"))?;
    if bytes.len() != 32 {
        return Err(BrokerError::validation("invalid wallet address"));
    }
    Ok(())
}

/// Base58 transaction signature syntax check (no on-chain lookup).
pub fn tx_signature(s: &str) -> Result<(), BrokerError> {
    if s.len() < 64 || s.len() > 88 {
        return Err(BrokerError::validation("invalid transaction signature"));
    }
    bs58::decode(s)
        .into_vec()
        .map_err(|_| BrokerError::validation("invalid transaction signature"))?;
    Ok(())
}

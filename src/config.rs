// Copyright (c) 2026 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Startup configuration, read once from the environment. Centralizes the
//! scattered `env::var` reads the teacher's `chain_config.rs` performs inline
//! into a single fallible entry point, per SPEC_FULL.md §4.7.

use anyhow::{bail, Context, Result};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub solana_rpc_url: String,
    pub solana_network: String,
    pub usdc_mint: String,
    pub platform_fee_basis_points: u64,
    pub platform_wallet: Option<String>,
    pub escrow_wallet: String,
    /// Opaque signing material for the (out-of-scope) chain adapter. Never
    /// logged and never placed on any type that derives `Debug` for a
    /// client-facing response.
    pub escrow_private_key: String,
    pub admin_api_key: Option<String>,
    pub admin_allowed_ips: Vec<String>,
    pub demo_mode: bool,
    pub port: u16,
    pub host: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let platform_fee_percent: f64 = optional_var("PLATFORM_FEE_PERCENT")
            .map(|v| v.parse())
            .transpose()
            .context("PLATFORM_FEE_PERCENT must be a number")?
            .unwrap_or(0.0);
        if !(0.0..=100.0).contains(&platform_fee_percent) {
            bail!("PLATFORM_FEE_PERCENT must be between 0 and 100");
        }

        let admin_allowed_ips = optional_var("ADMIN_ALLOWED_IPS")
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            solana_rpc_url: required_var("SOLANA_RPC_URL")?,
            solana_network: optional_var("SOLANA_NETWORK").unwrap_or_else(|| "devnet".to_string()),
            usdc_mint: required_var("USDC_MINT")?,
            platform_fee_basis_points: (platform_fee_percent * 100.0).round() as u64,
            platform_wallet: optional_var("PLATFORM_WALLET"),
            escrow_wallet: required_var("ESCROW_WALLET")?,
            escrow_private_key: required_var("ESCROW_PRIVATE_KEY")?,
            admin_api_key: optional_var("ADMIN_API_KEY"),
            admin_allowed_ips,
            demo_mode: optional_var("DEMO_MODE")
                .map(|v| v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            port: optional_var("PORT")
                .map(|v| v.parse())
                .transpose()
                .context("PORT must be a valid port number")?
                .unwrap_or(8080),
            host: optional_var("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
        })
    }
}

fn optional_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn required_var(name: &str) -> Result<String> {
    optional_var(name).with_context(|| format!("{name} environment variable is required"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clear_all() {
        for key in [
            "SOLANA_RPC_URL",
            "SOLANA_NETWORK",
            "USDC_MINT",
            "PLATFORM_FEE_PERCENT",
            "PLATFORM_WALLET",
            "ESCROW_WALLET",
            "ESCROW_PRIVATE_KEY",
            "ADMIN_API_KEY",
            "ADMIN_ALLOWED_IPS",
            "DEMO_MODE",
            "PORT",
            "HOST",
        ] {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn missing_required_var_is_an_error() {
        clear_all();
        assert!(AppConfig::from_env().is_err());
    }

    #[test]
    fn fee_percent_converts_to_basis_points() {
        clear_all();
        std::env::set_var("SOLANA_RPC_URL", "http://localhost:8899");
        std::env::set_var("USDC_MINT", "mint");
        std::env::set_var("ESCROW_WALLET", "escrow");
        std::env::set_var("ESCROW_PRIVATE_KEY", "key");
        std::env::set_var("PLATFORM_FEE_PERCENT", "5");
        let config = AppConfig::from_env().unwrap();
        assert_eq!(config.platform_fee_basis_points, 500);
        clear_all();
    }
}

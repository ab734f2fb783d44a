// Copyright (c) 2026 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::Result;
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use agentjob_broker::api;
use agentjob_broker::chain::mock::MockChainAdapter;
use agentjob_broker::chain::ChainAdapter;
use agentjob_broker::escrow::{EscrowConfig, EscrowCoordinator, MemoryEscrowLedger};
use agentjob_broker::events::BroadcastEventBus;
use agentjob_broker::expiry::ExpirySweeper;
use agentjob_broker::jobs::{JobService, MemoryJobStore};
use agentjob_broker::paywall::{Paywall, PaywallConfig};
use agentjob_broker::ratelimit::IpRateLimiter;
use agentjob_broker::AppConfig;

const EXPIRY_SWEEP_PERIOD: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<()> {
    // Loads a local `.env` if present; real deployment env vars always win
    // since `dotenv()` never overwrites an already-set variable.
    dotenv::dotenv().ok();

    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt::init();

    let config = AppConfig::from_env()?;
    info!(network = %config.solana_network, demo_mode = config.demo_mode, "starting agentjob-broker");

    let store = MemoryJobStore::new();
    let events = Arc::new(BroadcastEventBus::default());
    let jobs = Arc::new(JobService::new(store, events));

    // The real chain client is an external collaborator out of scope for
    // this crate (spec.md §1, §9); this process wires the in-memory fake
    // until a concrete `ChainAdapter` is swapped in.
    let chain: Arc<dyn ChainAdapter> = MockChainAdapter::new();

    let ledger = MemoryEscrowLedger::new();
    let escrow = EscrowCoordinator::new(
        ledger,
        chain.clone(),
        jobs.clone(),
        EscrowConfig {
            escrow_wallet: config.escrow_wallet.clone(),
            platform_wallet: config.platform_wallet.clone(),
            asset_mint: config.usdc_mint.clone(),
            fee_basis_points: config.platform_fee_basis_points,
        },
    );

    let paywall = Arc::new(Paywall::new(
        chain.clone(),
        jobs.clone(),
        PaywallConfig {
            network: config.solana_network.clone(),
            asset_mint: config.usdc_mint.clone(),
            fee_basis_points: config.platform_fee_basis_points,
            platform_wallet: config.platform_wallet.clone(),
        },
    ));

    let sweeper = ExpirySweeper::new(jobs.clone(), escrow.clone(), EXPIRY_SWEEP_PERIOD);
    let _sweep_shutdown = sweeper.spawn();

    let state = api::AppState {
        jobs,
        escrow,
        paywall,
        chain,
        escrow_wallet: config.escrow_wallet.clone(),
        asset_mint: config.usdc_mint.clone(),
        demo_mode: config.demo_mode,
        rate_limiter: IpRateLimiter::default(),
    };

    api::serve(state, &config.host, config.port).await
}

// Copyright (c) 2026 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! The HTTP surface: request parsing, validation glue, and the axum router
//! assembly. Grounded on the teacher's `api/mod.rs`/`api/server.rs` module
//! split (config struct + router + error type), generalized from an LLM
//! inference API to this job marketplace's endpoint table (spec.md §6).

pub mod errors;
pub mod handlers;
pub mod request_id;
pub mod security;
pub mod server;

use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use errors::{ApiError, ErrorResponse};
pub use request_id::RequestId;
pub use server::serve;

use crate::chain::ChainAdapter;
use crate::escrow::EscrowCoordinator;
use crate::jobs::JobService;
use crate::paywall::Paywall;
use crate::ratelimit::IpRateLimiter;

#[derive(Clone)]
pub struct AppState {
    pub jobs: Arc<JobService>,
    pub escrow: Arc<EscrowCoordinator>,
    pub paywall: Arc<Paywall>,
    pub chain: Arc<dyn ChainAdapter>,
    pub escrow_wallet: String,
    pub asset_mint: String,
    pub demo_mode: bool,
    pub rate_limiter: IpRateLimiter,
}

/// Builds the full router. `DEMO_MODE`'s extra route is registered here,
/// conditionally, so it is simply absent (404, never a runtime 403) when
/// the config disables it (spec.md §9).
pub fn router(state: AppState) -> Router {
    let demo_mode = state.demo_mode;

    let mut v1 = Router::new()
        .route("/jobs", post(handlers::create_job).get(handlers::list_jobs))
        .route("/jobs/open", get(handlers::list_open_jobs))
        .route("/jobs/:id", get(handlers::get_job))
        .route("/jobs/:id/deposit", post(handlers::deposit_job))
        .route("/jobs/:id/cancel", post(handlers::cancel_job))
        .route("/jobs/:id/claim", post(handlers::claim_job))
        .route("/jobs/:id/complete", post(handlers::complete_job))
        .route("/jobs/:id/verify", get(handlers::verify_job))
        .route("/jobs/:id/verify-hash", post(handlers::verify_hash))
        .route("/results/:id", get(handlers::get_result));

    if demo_mode {
        v1 = v1.route("/jobs/:id/activate-demo", post(handlers::activate_demo));
    }

    Router::new()
        .nest("/api/v1", v1)
        .layer(axum::middleware::from_fn(security::apply))
        .layer(axum::middleware::from_fn(request_id::assign))
        .layer(axum::middleware::from_fn_with_state(
            state.rate_limiter.clone(),
            crate::ratelimit::enforce,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

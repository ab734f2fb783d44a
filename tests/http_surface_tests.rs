// Copyright (c) 2026 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! HTTP-surface tests exercising the router end-to-end with
//! `tower::ServiceExt::oneshot`, grounded on the teacher's
//! `tests/api/test_route_registration.rs` pattern. No socket is bound; these
//! cover header parsing (`X-Payment`, `X-Payment-Required`) and status-code
//! mapping that the service-level unit tests in `src/` don't reach.

use agentjob_broker::api::{self, AppState};
use agentjob_broker::chain::mock::MockChainAdapter;
use agentjob_broker::chain::{ChainAdapter, TransferInstruction};
use agentjob_broker::escrow::{EscrowConfig, EscrowCoordinator, MemoryEscrowLedger};
use agentjob_broker::events::BroadcastEventBus;
use agentjob_broker::jobs::{JobService, MemoryJobStore};
use agentjob_broker::paywall::{Paywall, PaywallConfig};
use agentjob_broker::ratelimit::IpRateLimiter;

use axum::body::{to_bytes, Body};
use axum::extract::ConnectInfo;
use axum::http::{Method, Request, StatusCode};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::util::ServiceExt;

/// `ratelimit::enforce` extracts `ConnectInfo<SocketAddr>`, which in
/// production is only populated by `into_make_service_with_connect_info`
/// (`src/api/server.rs`). Driving the router directly via `oneshot` bypasses
/// that, so every test request here injects the same fake peer address the
/// way a hand-built request would have to.
fn fake_peer() -> ConnectInfo<SocketAddr> {
    ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 0)))
}

fn wallet() -> String {
    bs58::encode(rand::random::<[u8; 32]>()).into_string()
}

fn test_state(demo_mode: bool) -> AppState {
    let store = MemoryJobStore::new();
    let events = Arc::new(BroadcastEventBus::default());
    let jobs = Arc::new(JobService::new(store, events));
    let chain: Arc<dyn ChainAdapter> = MockChainAdapter::new();
    let ledger = MemoryEscrowLedger::new();
    let escrow_wallet = wallet();
    let platform_wallet = wallet();

    let escrow = EscrowCoordinator::new(
        ledger,
        chain.clone(),
        jobs.clone(),
        EscrowConfig {
            escrow_wallet: escrow_wallet.clone(),
            platform_wallet: Some(platform_wallet),
            asset_mint: "USDC".to_string(),
            fee_basis_points: 0,
        },
    );
    let paywall = Arc::new(Paywall::new(
        chain.clone(),
        jobs.clone(),
        PaywallConfig {
            network: "solana-devnet".to_string(),
            asset_mint: "USDC".to_string(),
            fee_basis_points: 0,
            platform_wallet: None,
        },
    ));

    AppState {
        jobs,
        escrow,
        paywall,
        chain,
        escrow_wallet,
        asset_mint: "USDC".to_string(),
        demo_mode,
        rate_limiter: IpRateLimiter::new(1000),
    }
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .extension(fake_peer())
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .extension(fake_peer())
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn create_job_returns_pending_deposit_with_escrow_instructions() {
    let state = test_state(false);
    let app = api::router(state);

    let requester = wallet();
    let response = app
        .oneshot(post(
            "/api/v1/jobs",
            json!({
                "title": "Summarize a PDF",
                "description": "Summarize the attached document in 3 bullets.",
                "bountyUsdc": 0.5,
                "requesterWallet": requester,
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["job"]["status"], "PENDING_DEPOSIT");
    assert_eq!(body["escrow"]["amountAtomic"], 500_000);
}

#[tokio::test]
async fn unknown_job_id_is_404() {
    let state = test_state(false);
    let app = api::router(state);

    let response = app.oneshot(get("/api/v1/jobs/job_deadbeef")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn demo_mode_route_is_absent_when_disabled() {
    let state = test_state(false);
    let app = api::router(state);

    let response = app
        .oneshot(post("/api/v1/jobs/job_deadbeef/activate-demo", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn claim_on_not_yet_open_job_is_state_error() {
    let state = test_state(false);
    let app = api::router(state.clone());

    let requester = wallet();
    let create_response = app
        .clone()
        .oneshot(post(
            "/api/v1/jobs",
            json!({
                "title": "t",
                "description": "d",
                "bountyUsdc": 1.0,
                "requesterWallet": requester,
            }),
        ))
        .await
        .unwrap();
    let created = body_json(create_response).await;
    let job_id = created["job"]["id"].as_str().unwrap().to_string();

    let response = app
        .oneshot(post(
            &format!("/api/v1/jobs/{job_id}/claim"),
            json!({ "workerWallet": wallet() }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error_type"], "state_error");
}

/// End-to-end happy path via the paywall, driving the router the way
/// spec.md §8 scenario 1 describes: create -> activate (DEMO_MODE) ->
/// claim -> complete -> 402 challenge -> signed transfer -> 200 + PAID.
#[tokio::test]
async fn paywall_challenge_then_settlement_marks_job_paid() {
    let state = test_state(true);
    let app = api::router(state);

    let requester = wallet();
    let worker = wallet();

    let created = body_json(
        app.clone()
            .oneshot(post(
                "/api/v1/jobs",
                json!({
                    "title": "t",
                    "description": "d",
                    "bountyUsdc": 0.1,
                    "requesterWallet": requester,
                }),
            ))
            .await
            .unwrap(),
    )
    .await;
    let job_id = created["job"]["id"].as_str().unwrap().to_string();

    let activated = app
        .clone()
        .oneshot(post(&format!("/api/v1/jobs/{job_id}/activate-demo"), json!({})))
        .await
        .unwrap();
    assert_eq!(activated.status(), StatusCode::OK);

    let claimed = body_json(
        app.clone()
            .oneshot(post(
                &format!("/api/v1/jobs/{job_id}/claim"),
                json!({ "workerWallet": worker }),
            ))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(claimed["status"], "CLAIMED");

    let completed = body_json(
        app.clone()
            .oneshot(post(
                &format!("/api/v1/jobs/{job_id}/complete"),
                json!({ "result": "RESULT", "workerWallet": worker }),
            ))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(completed["status"], "COMPLETED");

    // No X-Payment header yet: expect 402 with a challenge header.
    let challenge_response = app
        .clone()
        .oneshot(get(&format!("/api/v1/results/{job_id}")))
        .await
        .unwrap();
    assert_eq!(challenge_response.status(), StatusCode::PAYMENT_REQUIRED);
    let challenge_header = challenge_response
        .headers()
        .get("X-Payment-Required")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    let challenge: Value =
        serde_json::from_slice(&BASE64.decode(challenge_header).unwrap()).unwrap();
    let max_amount: u64 = challenge["accepts"][0]["maxAmountRequired"]
        .as_u64()
        .unwrap();
    assert_eq!(max_amount, 100_000);

    // Build and present a signed transfer satisfying the challenge.
    let transfer = TransferInstruction {
        from: "payer".to_string(),
        to: worker.clone(),
        mint: "USDC".to_string(),
        amount_atomic: max_amount,
    };
    let serialized_tx = BASE64.encode(serde_json::to_vec(&transfer).unwrap());
    let payment_header = BASE64.encode(
        serde_json::to_vec(&json!({ "serializedTransaction": serialized_tx })).unwrap(),
    );

    let request = Request::builder()
        .method(Method::GET)
        .uri(format!("/api/v1/results/{job_id}"))
        .header("X-Payment", payment_header)
        .extension(fake_peer())
        .body(Body::empty())
        .unwrap();
    let paid_response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(paid_response.status(), StatusCode::OK);
    assert!(paid_response.headers().contains_key("X-Payment-Response"));
    let body = body_json(paid_response).await;
    assert_eq!(body["result"], "RESULT");

    // A subsequent call returns the cached result with no further chain work.
    let cached = app.oneshot(get(&format!("/api/v1/results/{job_id}"))).await.unwrap();
    assert_eq!(cached.status(), StatusCode::OK);
}

#[tokio::test]
async fn security_headers_are_present_on_every_response() {
    let state = test_state(false);
    let app = api::router(state);

    let response = app.oneshot(get("/api/v1/jobs")).await.unwrap();
    assert_eq!(response.headers().get("X-Frame-Options").unwrap(), "DENY");
    assert_eq!(
        response.headers().get("X-Content-Type-Options").unwrap(),
        "nosniff"
    );
}

// Copyright (c) 2026 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Request handlers: thin adapters translating JSON bodies into service
//! calls and service errors into HTTP responses, per spec.md §4.5.

use axum::extract::{Extension, Json, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::errors::ApiError;
use super::{AppState, RequestId};
use crate::errors::BrokerError;
use crate::jobs::{CreateJobInput, Job, JobId, JobStatus};

fn api_err(state: &AppState, request_id: &RequestId, err: BrokerError) -> ApiError {
    let _ = state;
    ApiError::from_broker(err, Some(request_id.0.clone()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobRequest {
    pub title: String,
    pub description: String,
    pub bounty_usdc: f64,
    pub requester_wallet: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EscrowInstructions {
    pub deposit_to: String,
    pub amount_atomic: u64,
    pub instructions: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobResponse {
    pub job: Job,
    pub escrow: EscrowInstructions,
}

pub async fn create_job(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Json(body): Json<CreateJobRequest>,
) -> Result<Response, ApiError> {
    let job = state
        .jobs
        .create(CreateJobInput {
            title: body.title,
            description: body.description,
            bounty_usdc: body.bounty_usdc,
            requester_wallet: body.requester_wallet,
            tags: body.tags,
        })
        .await
        .map_err(|e| api_err(&state, &request_id, e))?;

    let response = CreateJobResponse {
        escrow: EscrowInstructions {
            deposit_to: state.escrow_wallet.clone(),
            amount_atomic: job.bounty_atomic,
            instructions: format!(
                "transfer {} atomic units of {} to {}, then POST the transaction signature to /api/v1/jobs/{}/deposit",
                job.bounty_atomic, state.asset_mint, state.escrow_wallet, job.id
            ),
        },
        job,
    };
    Ok((StatusCode::CREATED, Json(response)).into_response())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositRequest {
    pub deposit_tx_sig: String,
}

pub async fn deposit_job(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(id): Path<String>,
    Json(body): Json<DepositRequest>,
) -> Result<Json<Job>, ApiError> {
    let job_id = JobId(id);
    let job = state
        .jobs
        .get(&job_id)
        .await
        .ok_or_else(|| api_err(&state, &request_id, BrokerError::not_found("job not found")))?;

    state
        .escrow
        .verify_deposit(
            &job_id,
            &job.requester_wallet,
            job.bounty_atomic,
            body.deposit_tx_sig,
        )
        .await
        .map_err(|e| api_err(&state, &request_id, e))?;

    let updated = state
        .jobs
        .get(&job_id)
        .await
        .ok_or_else(|| api_err(&state, &request_id, BrokerError::not_found("job not found")))?;
    Ok(Json(updated))
}

/// `DEMO_MODE`-only: activates the job without verifying an on-chain
/// deposit (spec.md §9's "activation without on-chain check"). Only
/// registered in the router when `DEMO_MODE=true`.
pub async fn activate_demo(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(id): Path<String>,
) -> Result<Json<Job>, ApiError> {
    let job_id = JobId(id);
    let job = state
        .jobs
        .activate(&job_id, "demo-mode-no-chain-tx".to_string())
        .await
        .map_err(|e| api_err(&state, &request_id, e))?;
    Ok(Json(job))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelRequest {
    pub requester_wallet: String,
}

pub async fn cancel_job(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(id): Path<String>,
    Json(body): Json<CancelRequest>,
) -> Result<Json<Job>, ApiError> {
    let job_id = JobId(id);
    let (job, previous_status) = state
        .jobs
        .cancel(&job_id, &body.requester_wallet)
        .await
        .map_err(|e| api_err(&state, &request_id, e))?;

    if previous_status == JobStatus::Open {
        if let Err(e) = state.escrow.refund_if_held(&job_id).await {
            tracing::error!(job_id = %job_id, error = %e, "refund on cancel failed");
        }
    }
    Ok(Json(job))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimRequest {
    pub worker_wallet: String,
}

pub async fn claim_job(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(id): Path<String>,
    Json(body): Json<ClaimRequest>,
) -> Result<Json<Job>, ApiError> {
    let job = state
        .jobs
        .claim(&JobId(id), body.worker_wallet)
        .await
        .map_err(|e| api_err(&state, &request_id, e))?;
    Ok(Json(job))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteRequest {
    pub result: String,
    pub worker_wallet: String,
}

pub async fn complete_job(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(id): Path<String>,
    Json(body): Json<CompleteRequest>,
) -> Result<Json<Job>, ApiError> {
    let job = state
        .jobs
        .complete(&JobId(id), body.result, &body.worker_wallet)
        .await
        .map_err(|e| api_err(&state, &request_id, e))?;
    Ok(Json(job))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<JobStatus>,
}

pub async fn list_jobs(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Json<Vec<Job>> {
    Json(state.jobs.list(query.status).await)
}

pub async fn list_open_jobs(State(state): State<AppState>) -> Json<Vec<Job>> {
    Json(state.jobs.list(Some(JobStatus::Open)).await)
}

pub async fn get_job(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(id): Path<String>,
) -> Result<Json<Job>, ApiError> {
    state
        .jobs
        .get(&JobId(id))
        .await
        .map(Json)
        .ok_or_else(|| api_err(&state, &request_id, BrokerError::not_found("job not found")))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPaymentInfo {
    pub bounty_usdc: f64,
    pub payment_endpoint: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub result_hash: String,
    pub result_length: usize,
    pub preview: String,
    pub payment: VerifyPaymentInfo,
}

const PREVIEW_CHARS: usize = 200;

pub async fn verify_job(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(id): Path<String>,
) -> Result<Json<VerifyResponse>, ApiError> {
    let job_id = JobId(id);
    let job = state
        .jobs
        .get(&job_id)
        .await
        .ok_or_else(|| api_err(&state, &request_id, BrokerError::not_found("job not found")))?;
    let result = job.result.as_deref().ok_or_else(|| {
        api_err(
            &state,
            &request_id,
            BrokerError::state_error(job.status, "a result-bearing state"),
        )
    })?;

    Ok(Json(VerifyResponse {
        result_hash: hex::encode(Sha256::digest(result.as_bytes())),
        result_length: result.chars().count(),
        preview: result.chars().take(PREVIEW_CHARS).collect(),
        payment: VerifyPaymentInfo {
            bounty_usdc: job.bounty_usdc,
            payment_endpoint: format!("/api/v1/results/{}", job_id),
        },
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyHashRequest {
    pub expected_hash: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyHashResponse {
    pub hash_matches: bool,
}

pub async fn verify_hash(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(id): Path<String>,
    Json(body): Json<VerifyHashRequest>,
) -> Result<Json<VerifyHashResponse>, ApiError> {
    let job = state
        .jobs
        .get(&JobId(id))
        .await
        .ok_or_else(|| api_err(&state, &request_id, BrokerError::not_found("job not found")))?;
    let result = job.result.as_deref().unwrap_or_default();
    let actual_hash = hex::encode(Sha256::digest(result.as_bytes()));
    Ok(Json(VerifyHashResponse {
        hash_matches: actual_hash.eq_ignore_ascii_case(&body.expected_hash),
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultPayment {
    pub tx_sig: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultResponse {
    pub result: String,
    pub payment: ResultPayment,
}

/// `GET /results/:jobId` — the x402 paywall's gate, with an escrow-release
/// fallback ahead of it (spec.md §4.4's "paywall is a fallback" note and
/// testable scenario 2).
pub async fn get_result(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let job_id = JobId(id);
    let job = state
        .jobs
        .get(&job_id)
        .await
        .ok_or_else(|| api_err(&state, &request_id, BrokerError::not_found("job not found")))?;

    match job.status {
        JobStatus::PendingDeposit | JobStatus::Open | JobStatus::Claimed => {
            return Err(api_err(
                &state,
                &request_id,
                BrokerError::state_error(job.status, "a result-bearing state"),
            ))
        }
        JobStatus::Cancelled | JobStatus::Expired => {
            return Err(api_err(
                &state,
                &request_id,
                BrokerError::not_found(format!("job {} will never produce a result ({})", job_id, job.status)),
            ))
        }
        JobStatus::Paid => {
            return Ok(Json(ResultResponse {
                result: job.result.clone().unwrap_or_default(),
                payment: ResultPayment {
                    tx_sig: job.payment_tx_sig.clone(),
                },
            })
            .into_response());
        }
        JobStatus::Completed => {}
    }

    // COMPLETED: escrow release takes priority over the paywall when funds
    // are already held.
    if let Some(worker_wallet) = job.worker_wallet.clone() {
        if state.escrow.is_held(&job_id).await {
            state
                .escrow
                .release_to_worker(&job_id, worker_wallet)
                .await
                .map_err(|e| api_err(&state, &request_id, e))?;
            let paid = state.jobs.get(&job_id).await.ok_or_else(|| {
                api_err(&state, &request_id, BrokerError::not_found("job not found"))
            })?;
            return Ok(Json(ResultResponse {
                result: paid.result.clone().unwrap_or_default(),
                payment: ResultPayment {
                    tx_sig: paid.payment_tx_sig.clone(),
                },
            })
            .into_response());
        }
    }

    let payment_header = headers
        .get("X-Payment")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    match payment_header {
        None => {
            let challenge_b64 = state.paywall.encode_challenge(&job);
            let mut response = ApiError {
                kind: crate::errors::ErrorKind::PaymentRequired,
                message: "payment required to retrieve this job's result".to_string(),
                request_id: Some(request_id.0.clone()),
            }
            .into_response();
            response
                .headers_mut()
                .insert("X-Payment-Required", challenge_b64.parse().unwrap());
            Ok(response)
        }
        Some(header) => match state.paywall.settle(&job, &header).await {
            Ok(response_b64) => {
                let paid = state.jobs.get(&job_id).await.ok_or_else(|| {
                    api_err(&state, &request_id, BrokerError::not_found("job not found"))
                })?;
                let mut response = Json(ResultResponse {
                    result: paid.result.clone().unwrap_or_default(),
                    payment: ResultPayment {
                        tx_sig: paid.payment_tx_sig.clone(),
                    },
                })
                .into_response();
                response
                    .headers_mut()
                    .insert("X-Payment-Response", response_b64.parse().unwrap());
                Ok(response)
            }
            Err(_) => {
                // On verification failure, re-issue the same challenge
                // rather than a plain 400, preserving the retry semantic
                // (spec.md §4.4 step 4).
                let challenge_b64 = state.paywall.encode_challenge(&job);
                let mut response = ApiError {
                    kind: crate::errors::ErrorKind::PaymentInvalid,
                    message: "submitted payment did not satisfy the challenge".to_string(),
                    request_id: Some(request_id.0.clone()),
                }
                .into_response();
                response
                    .headers_mut()
                    .insert("X-Payment-Required", challenge_b64.parse().unwrap());
                Ok(response)
            }
        },
    }
}

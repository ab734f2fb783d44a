// Copyright (c) 2026 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Maps `BrokerError` onto an HTTP response. This is the only place a
//! kind becomes a status code, and the only place a message is checked
//! against the sanitization rule from spec.md §7 — mirroring the teacher's
//! `ApiError`/`ErrorResponse` split in `api/errors.rs`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use crate::errors::{BrokerError, ErrorKind};

/// Fully-closed message strings every kind other than `Internal`/
/// `PaymentBackend` can produce with no interpolation at all. Every literal
/// passed to `BrokerError::{validation,not_found,state_error,authorization,
/// payment_invalid}` that doesn't embed caller-varying data belongs here
/// verbatim; anything not on this list (or matched by
/// [`matches_templated_pattern`]) is suppressed rather than echoed.
const ALLOW_LISTED_MESSAGES: &[&str] = &[
    "bountyUsdc must be positive",
    "bountyUsdc must be in (0, 1000.0]",
    "invalid wallet address",
    "invalid transaction signature",
    "workerWallet must not equal requesterWallet",
    "caller is not the worker bound to this job",
    "caller is not the requester of this job",
    "no escrow record for job",
    "deposit transaction already used",
    "escrow already recorded for this job",
    "deposit transaction does not credit the escrow wallet with the expected amount",
    "submitted transaction does not pay the worker the required amount",
    "X-Payment header is not valid base64",
    "X-Payment header is not valid JSON",
    "serializedTransaction is not valid base64",
    "payment required to retrieve this job's result",
    "submitted payment did not satisfy the challenge",
];

/// Covers the handful of templates that interpolate data this crate
/// generated itself (job ids, `JobStatus` names, integer bounds) rather than
/// raw caller input, so structural matching is enough to treat them as safe.
fn matches_templated_pattern(message: &str) -> bool {
    (message.starts_with("cannot transition from ") && message.contains(" to "))
        || (message.starts_with("job ") && message.ends_with(" not found"))
        || (message.starts_with("job ") && message.contains("will never produce a result ("))
        || (message.contains("must be between ") && message.ends_with(" characters"))
        || (message.starts_with("at most ") && message.ends_with(" tags allowed"))
}

fn is_allow_listed(message: &str) -> bool {
    ALLOW_LISTED_MESSAGES.contains(&message) || matches_templated_pattern(message)
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error_type: String,
    pub message: String,
    pub request_id: Option<String>,
}

pub struct ApiError {
    pub kind: ErrorKind,
    pub message: String,
    pub request_id: Option<String>,
}

impl ApiError {
    pub fn from_broker(err: BrokerError, request_id: Option<String>) -> Self {
        Self {
            kind: err.kind,
            message: err.message,
            request_id,
        }
    }

    /// `internal` and `payment_backend` errors can carry details from an
    /// out-of-scope collaborator (anyhow chains, chain adapter RPC errors)
    /// that were never vetted for client exposure, so those two kinds are
    /// always replaced. Every other kind is checked against the allow-list
    /// above before being echoed back; anything not on it is suppressed the
    /// same way, since an unlisted message means some call site introduced a
    /// template this boundary was never told is safe to quote.
    fn client_message(&self) -> String {
        match self.kind {
            ErrorKind::Internal | ErrorKind::PaymentBackend => {
                error!(
                    request_id = ?self.request_id,
                    kind = ?self.kind,
                    detail = %self.message,
                    "suppressed internal error detail from client response"
                );
                match self.kind {
                    ErrorKind::Internal => "an internal error occurred".to_string(),
                    _ => "the payment backend could not process this request".to_string(),
                }
            }
            _ if is_allow_listed(&self.message) => self.message.clone(),
            _ => {
                error!(
                    request_id = ?self.request_id,
                    kind = ?self.kind,
                    detail = %self.message,
                    "error message is not on the client-facing allow-list, suppressing"
                );
                "the request could not be completed".to_string()
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.kind.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorResponse {
            error_type: serde_json::to_value(self.kind)
                .ok()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_else(|| "internal".to_string()),
            message: self.client_message(),
            request_id: self.request_id.clone(),
        };
        (status, Json(body)).into_response()
    }
}

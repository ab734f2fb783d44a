// Copyright (c) 2026 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Per-request id, threaded through tracing spans and into `ErrorResponse`,
//! mirroring the teacher's `ErrorResponse { request_id: Option<String>, .. }`
//! shape (SPEC_FULL.md §3).

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct RequestId(pub String);

pub async fn assign(mut request: Request, next: Next) -> Response {
    let id = RequestId(Uuid::new_v4().to_string());
    request.extensions_mut().insert(id.clone());
    let mut response = next.run(request).await;
    if let Ok(value) = id.0.parse() {
        response.headers_mut().insert("X-Request-Id", value);
    }
    response
}

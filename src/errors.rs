// Copyright (c) 2026 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Kind-tagged error type shared by every component.
//!
//! Every service in this crate returns a `BrokerError` carrying one of the
//! closed `ErrorKind`s below. The HTTP surface (`api::errors`) is the only
//! place that turns a kind into a status code and a sanitized message.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    StateError,
    Authorization,
    PaymentRequired,
    PaymentInvalid,
    PaymentBackend,
    RateLimited,
    Internal,
}

impl ErrorKind {
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorKind::Validation => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::StateError => 400,
            ErrorKind::Authorization => 403,
            ErrorKind::PaymentRequired => 402,
            ErrorKind::PaymentInvalid => 402,
            ErrorKind::PaymentBackend => 502,
            ErrorKind::RateLimited => 429,
            ErrorKind::Internal => 500,
        }
    }
}

/// A component-level error: a kind plus a message.
///
/// The message is allowed to be arbitrarily detailed here — sanitization
/// against the allow-list happens once, at the HTTP boundary, never inside
/// a service.
#[derive(Debug, Clone)]
pub struct BrokerError {
    pub kind: ErrorKind,
    pub message: String,
}

impl BrokerError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn state_error(from: impl fmt::Display, to: impl fmt::Display) -> Self {
        Self::new(
            ErrorKind::StateError,
            format!("cannot transition from {} to {}", from, to),
        )
    }

    pub fn authorization(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Authorization, message)
    }

    pub fn payment_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::PaymentInvalid, message)
    }

    pub fn payment_backend(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::PaymentBackend, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }
}

impl fmt::Display for BrokerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl std::error::Error for BrokerError {}

impl From<anyhow::Error> for BrokerError {
    fn from(err: anyhow::Error) -> Self {
        BrokerError::internal(err.to_string())
    }
}

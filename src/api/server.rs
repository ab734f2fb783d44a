// Copyright (c) 2026 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Binds the router to a socket and serves it with graceful shutdown on
//! SIGINT/SIGTERM, per spec.md §6's exit-code contract. Grounded on the
//! teacher's `main.rs` shutdown handling (`signal::ctrl_c().await?`),
//! extended with SIGTERM since this crate targets a container deployment.

use anyhow::{Context, Result};
use std::net::SocketAddr;
use tokio::signal;
use tracing::info;

use super::AppState;

pub async fn serve(state: AppState, host: &str, port: u16) -> Result<()> {
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .context("invalid HOST/PORT configuration")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "listening");

    let router = super::router(state).into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("shutdown signal received, closing listeners");
}

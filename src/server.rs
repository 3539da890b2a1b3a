// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! HTTP surface for Prometheus and the kubelet.
//!
//! - `/metrics` - Prometheus text exposition of [`crate::metrics::METRICS_REGISTRY`]
//! - `/liveness` - returns 200 while the process is running

use crate::constants::{LIVENESS_PATH, METRICS_SERVER_PATH};
use crate::metrics::gather_metrics;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use std::future::Future;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

const METRICS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

async fn liveness() -> StatusCode {
    debug!("Liveness probe: OK");
    StatusCode::OK
}

async fn metrics_handler() -> Response {
    match gather_metrics() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, METRICS_CONTENT_TYPE)],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to encode metrics").into_response()
        }
    }
}

/// Router serving the metrics and liveness endpoints.
pub fn router() -> Router {
    Router::new()
        .route(METRICS_SERVER_PATH, get(metrics_handler))
        .route(LIVENESS_PATH, get(liveness))
}

/// Serve the router on `listener` until `shutdown` resolves.
///
/// # Errors
///
/// Returns an error if accepting connections fails.
pub async fn serve(
    listener: TcpListener,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(address = %addr, "Serving Prometheus metrics at {addr}{METRICS_SERVER_PATH}...");
    }

    axum::serve(listener, router())
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Metrics server stopped");
    Ok(())
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod server_tests;

// src/server.rs

//! HTTP exposition endpoint.
//!
//! Serves `GET /metrics` from the shared prometheus registry. Scrapes never
//! run queries; they read whatever snapshots the caches currently hold.

use std::net::SocketAddr;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use prometheus::Registry;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::collector::render_text;
use crate::errors::{ExporterError, Result};

const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

#[derive(Clone)]
struct MetricsState {
    registry: Registry,
}

async fn metrics_handler(State(state): State<MetricsState>) -> Response {
    match render_text(&state.registry) {
        Ok(body) => (StatusCode::OK, [("content-type", CONTENT_TYPE)], body).into_response(),
        Err(err) => {
            warn!(%err, "failed to render metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
        }
    }
}

/// Router exposing `/metrics`.
pub fn metrics_router(registry: Registry) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(MetricsState { registry })
}

/// Serve `/metrics` on all interfaces until `cancel` fires.
pub async fn serve(port: u16, registry: Registry, cancel: CancellationToken) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "serving /metrics");

    axum::serve(listener, metrics_router(registry))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .map_err(ExporterError::IoError)?;

    info!("metrics server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::IntGauge;

    #[tokio::test]
    async fn metrics_handler_renders_registry() {
        let registry = Registry::new();
        let gauge = IntGauge::new("bqexporter_test_gauge", "test").unwrap();
        gauge.set(7);
        registry.register(Box::new(gauge)).unwrap();

        let response = metrics_handler(State(MetricsState { registry })).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("bqexporter_test_gauge 7"));
    }

    #[tokio::test]
    async fn serve_returns_after_cancellation() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        serve(0, Registry::new(), cancel).await.unwrap();
    }
}

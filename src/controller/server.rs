//! # HTTP Server
//!
//! Serves Prometheus metrics and the liveness and readiness endpoints.
//!
//! - `GET /metrics` - Prometheus text format
//! - `GET /healthz` - always `ok` while the process runs
//! - `GET /readyz` - `ok` once the listener is bound, 503 before

use crate::observability::metrics;
use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Shared server state
#[derive(Debug, Default)]
pub struct ServerState {
    pub is_ready: Arc<AtomicBool>,
}

async fn metrics_handler() -> impl IntoResponse {
    match metrics::gather_metrics() {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => {
            error!("Failed to gather metrics: {e:#}");
            (StatusCode::INTERNAL_SERVER_ERROR, String::new())
        }
    }
}

async fn readiness_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    if state.is_ready.load(Ordering::Relaxed) {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not ready")
    }
}

pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(|| async { "ok" }))
        .route("/readyz", get(readiness_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind the metrics and health server and serve until the process exits
///
/// Marks the server ready as soon as the listener is bound.
pub async fn start_server(port: u16, state: Arc<ServerState>) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind HTTP server to {addr}"))?;

    info!(addr = %addr, "HTTP server listening");
    state.is_ready.store(true, Ordering::Relaxed);

    axum::serve(listener, router(state))
        .await
        .context("HTTP server error")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    async fn status_of(app: Router, path: &str) -> StatusCode {
        app.oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn test_health_endpoints() {
        let state = Arc::new(ServerState::default());
        let app = router(Arc::clone(&state));

        assert_eq!(status_of(app.clone(), "/healthz").await, StatusCode::OK);
        assert_eq!(
            status_of(app.clone(), "/readyz").await,
            StatusCode::SERVICE_UNAVAILABLE
        );

        state.is_ready.store(true, Ordering::Relaxed);
        assert_eq!(status_of(app.clone(), "/readyz").await, StatusCode::OK);
        assert_eq!(status_of(app.clone(), "/metrics").await, StatusCode::OK);
        assert_eq!(status_of(app, "/missing").await, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_start_server_marks_ready() {
        let state = Arc::new(ServerState::default());
        let server_state = Arc::clone(&state);
        // Port 0 binds an ephemeral port
        tokio::spawn(async move { start_server(0, server_state).await });

        for _ in 0..100 {
            if state.is_ready.load(Ordering::Relaxed) {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        panic!("server never became ready");
    }
}

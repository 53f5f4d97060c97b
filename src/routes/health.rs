//! Health check endpoints
//!
//! Kubernetes-style probes:
//! - /health, /healthz - liveness (is the service running?)
//! - /ready, /readyz - readiness (is the store reachable?)
//!
//! In memory mode (dev without MongoDB) readiness always passes; the
//! in-memory store cannot be unreachable.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;

use crate::server::AppState;

/// Health response payload
#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall health status (true if the service is running)
    pub healthy: bool,
    /// Service version
    pub version: &'static str,
    /// Current timestamp
    pub timestamp: String,
    /// Operating mode
    pub mode: String,
    /// Node identifier
    pub node_id: String,
    /// Store backend status
    pub store: StoreHealth,
}

/// Store backend details
#[derive(Serialize)]
pub struct StoreHealth {
    /// Backend in use ("mongodb" or "memory")
    pub backend: &'static str,
    /// Whether the backend is reachable
    pub connected: bool,
}

fn build_health_response(state: &AppState, connected: bool) -> HealthResponse {
    HealthResponse {
        healthy: true,
        version: env!("CARGO_PKG_VERSION"),
        timestamp: chrono::Utc::now().to_rfc3339(),
        mode: if state.args.dev_mode {
            "development".to_string()
        } else {
            "production".to_string()
        },
        node_id: state.args.node_id.to_string(),
        store: StoreHealth {
            backend: state.store_backend(),
            connected,
        },
    }
}

fn json(status: StatusCode, body: &impl Serialize) -> Response<Full<Bytes>> {
    let body = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body)))
        .unwrap()
}

/// Liveness probe: 200 whenever the process is serving
pub async fn health_check(state: Arc<AppState>) -> Response<Full<Bytes>> {
    let connected = state.store_reachable().await;
    json(StatusCode::OK, &build_health_response(&state, connected))
}

/// Readiness probe: 200 only when the store is reachable
pub async fn ready_check(state: Arc<AppState>) -> Response<Full<Bytes>> {
    let connected = state.store_reachable().await;
    let status = if connected {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    json(status, &build_health_response(&state, connected))
}

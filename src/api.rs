//! Minimal HTTP surface (§6, DESIGN.md): `/healthz` for liveness/readiness
//! and `/metrics` for Prometheus scraping, nothing else. Pared down from
//! the teacher's much larger `main.rs` axum `Router` (signal/vault/backtest
//! routes), none of which are in scope here (§1).

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::exit::StateStore;

#[derive(Clone)]
pub struct ApiState {
    pub metrics_handle: PrometheusHandle,
    pub store: Arc<StateStore>,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
    uptime_secs: i64,
    active_positions: usize,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz(State(state): State<ApiState>) -> (StatusCode, Json<HealthBody>) {
    let uptime_secs = (chrono::Utc::now() - state.started_at).num_seconds();
    let active_positions = state.store.active_positions().len();
    (StatusCode::OK, Json(HealthBody { status: "ok", uptime_secs, active_positions }))
}

async fn metrics(State(state): State<ApiState>) -> String {
    state.metrics_handle.render()
}

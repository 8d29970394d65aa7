use std::sync::Arc;

use axum::{extract::State, Json};

use crate::metrics::MetricsSnapshot;
use crate::server::AppState;

// ─── GET /api/metrics ────────────────────────────────────────────

pub async fn get_metrics(State(state): State<Arc<AppState>>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}

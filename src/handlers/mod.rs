pub mod metrics;
pub mod sensors;

use std::future::Future;
use std::time::Instant;

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::error::TimelineError;
use crate::metrics::Sample;
use crate::server::AppState;

// ─── Shared response envelope ────────────────────────────────────

/// Every sensor response carries timing metadata so callers can see how
/// much of the latency was spent in the store.
#[derive(Debug, Clone, Serialize)]
pub struct TimedResponse<T: Serialize> {
    pub data: T,
    pub timing: RequestTiming,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct RequestTiming {
    /// Total handler wall time (μs)
    pub total_us: u64,
    /// Time spent inside sensor calls, i.e. store round-trips (μs)
    pub store_us: u64,
    /// Parsing / validation / serialization overhead (μs)
    pub overhead_us: u64,
}

/// Await a sensor operation, record its latency, and wrap the result.
pub(crate) async fn timed<T, F>(
    state: &AppState,
    operation: &'static str,
    is_write: bool,
    t0: Instant,
    op: F,
) -> Result<Json<TimedResponse<T>>, AppError>
where
    T: Serialize,
    F: Future<Output = crate::Result<T>>,
{
    let t_store = Instant::now();
    let result = op.await;
    let store_us = t_store.elapsed().as_micros() as u64;
    let total_us = t0.elapsed().as_micros() as u64;

    state.metrics.record(Sample {
        operation,
        store_us,
        total_us,
        is_write,
        success: result.is_ok(),
    });

    Ok(Json(TimedResponse {
        data: result?,
        timing: RequestTiming {
            total_us,
            store_us,
            overhead_us: total_us.saturating_sub(store_us),
        },
    }))
}

// ─── Unified error type ──────────────────────────────────────────

#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    Store(String),
    BadRequest(String),
    Conflict(String),
    Internal(String),
}

impl From<TimelineError> for AppError {
    fn from(err: TimelineError) -> Self {
        let msg = err.to_string();
        match err {
            TimelineError::Config(_)
            | TimelineError::InvalidSensorName { .. }
            | TimelineError::InvalidRange { .. }
            | TimelineError::InvalidValue(_) => Self::BadRequest(msg),
            TimelineError::SensorNotFound(_) => Self::NotFound(msg),
            TimelineError::SensorExists(_) => Self::Conflict(msg),
            TimelineError::Store(_) => Self::Store(msg),
            TimelineError::Corrupt { .. } | TimelineError::Io(_) => Self::Internal(msg),
        }
    }
}

/// Malformed or incomplete request bodies are client errors like any
/// other invalid option.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::Store(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Conflict(msg) => (StatusCode::CONFLICT, msg),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = serde_json::json!({
            "error":  message,
            "status": status.as_u16(),
        });

        (status, Json(body)).into_response()
    }
}

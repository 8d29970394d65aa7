use std::sync::Arc;

use axum::{
    middleware as axum_mw,
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::CorsLayer;

use crate::clock::{Clock, SystemClock};
use crate::handlers;
use crate::metrics::MetricsCollector;
use crate::middleware::timing;
use crate::registry::SensorRegistry;
use crate::store::Store;

/// Shared application state available to every handler via `State<Arc<AppState>>`.
pub struct AppState {
    /// Backing store for every sensor registered through the API
    pub store: Arc<dyn Store>,

    pub registry: Arc<SensorRegistry>,

    /// Store-latency histograms; handlers push samples
    pub metrics: Arc<MetricsCollector>,

    /// Key prefix for sensors created through the API
    pub namespace: String,

    /// Time source handed to new sensors
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, namespace: impl Into<String>) -> Self {
        Self {
            store,
            registry: Arc::new(SensorRegistry::new()),
            metrics: Arc::new(MetricsCollector::new()),
            namespace: namespace.into(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

/// Builds the full Axum `Router` with all routes and middleware.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // ── Sensor lifecycle ────────────────────────────────────
        .route(
            "/api/sensors",
            post(handlers::sensors::register_sensor).get(handlers::sensors::list_sensors),
        )
        .route("/api/sensors/:name", delete(handlers::sensors::delete_sensor))
        // ── Events and queries ──────────────────────────────────
        .route(
            "/api/sensors/:name/events",
            post(handlers::sensors::record_event),
        )
        .route(
            "/api/sensors/:name/timeline",
            get(handlers::sensors::get_timeline).delete(handlers::sensors::drop_range),
        )
        .route(
            "/api/sensors/:name/reduce",
            post(handlers::sensors::reduce_sensor),
        )
        // ── Metrics ─────────────────────────────────────────────
        .route("/api/metrics", get(handlers::metrics::get_metrics))
        // ── Provide shared state to all routes above ────────────
        .with_state(state)
        // ── Global middleware (applied bottom-up) ───────────────
        .layer(axum_mw::from_fn(timing::timing_middleware))
        .layer(CorsLayer::permissive())
}

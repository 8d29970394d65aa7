use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::DateTime;
use serde::{Deserialize, Serialize};

use crate::aggregate::AggregatorKind;
use crate::clock::is_representable;
use crate::config::SensorConfig;
use crate::sensor::{Sensor, SensorData};
use crate::server::AppState;

use super::{timed, AppError, TimedResponse};

// ─── Request / response types ────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RegisterSensorRequest {
    pub name: String,
    pub aggregator: AggregatorKind,
    #[serde(flatten)]
    pub config: SensorConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SensorInfo {
    pub name: String,
    pub aggregator: AggregatorKind,
    #[serde(flatten)]
    pub config: SensorConfig,
}

impl From<&Sensor> for SensorInfo {
    fn from(sensor: &Sensor) -> Self {
        Self {
            name: sensor.name().to_owned(),
            aggregator: sensor.aggregator().kind(),
            config: *sensor.config(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RecordRequest {
    pub value: f64,
}

/// `from` and `till` as Unix seconds or RFC 3339 timestamps.
#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    pub from: String,
    pub till: String,
}

#[derive(Debug, Serialize)]
pub struct Timeline {
    pub sensor: String,
    /// Seconds between consecutive points
    pub step: u64,
    pub points: Vec<SensorData>,
}

#[derive(Debug, Serialize)]
pub struct Removed {
    pub removed: u64,
}

#[derive(Debug, Serialize)]
pub struct Reduced {
    pub reduced: usize,
}

#[derive(Debug, Serialize)]
pub struct Recorded {
    pub sensor: String,
    pub value: f64,
}

// ─── Helpers ─────────────────────────────────────────────────────

fn parse_time(field: &str, raw: &str) -> Result<i64, AppError> {
    let raw = raw.trim();
    if let Ok(secs) = raw.parse::<i64>() {
        if !is_representable(secs) {
            return Err(AppError::BadRequest(format!(
                "{field} is outside the representable date range: {secs}"
            )));
        }
        return Ok(secs);
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.timestamp())
        .map_err(|_| {
            AppError::BadRequest(format!(
                "{field} must be Unix seconds or an RFC 3339 timestamp, got {raw:?}"
            ))
        })
}

fn parse_range(query: &RangeQuery) -> Result<(i64, i64), AppError> {
    Ok((parse_time("from", &query.from)?, parse_time("till", &query.till)?))
}

// ─── POST /api/sensors ───────────────────────────────────────────

pub async fn register_sensor(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RegisterSensorRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SensorInfo>), AppError> {
    let Json(req) = payload?;
    let sensor = Sensor::new(req.name, req.config, state.store.clone(), req.aggregator.build())?
        .with_namespace(&state.namespace)?
        .with_clock(state.clock.clone());
    let sensor = state.registry.register(sensor)?;

    Ok((StatusCode::CREATED, Json(SensorInfo::from(sensor.as_ref()))))
}

// ─── GET /api/sensors ────────────────────────────────────────────

pub async fn list_sensors(State(state): State<Arc<AppState>>) -> Json<Vec<SensorInfo>> {
    let sensors = state
        .registry
        .names()
        .iter()
        .filter_map(|name| state.registry.get(name).ok())
        .map(|sensor| SensorInfo::from(sensor.as_ref()))
        .collect();
    Json(sensors)
}

// ─── DELETE /api/sensors/:name ───────────────────────────────────

pub async fn delete_sensor(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<TimedResponse<Removed>>, AppError> {
    let t0 = Instant::now();
    let registry = state.registry.clone();
    timed(&state, "cleanup", true, t0, async move {
        let removed = registry.remove(&name).await?;
        Ok(Removed { removed })
    })
    .await
}

// ─── POST /api/sensors/:name/events ──────────────────────────────

pub async fn record_event(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    payload: Result<Json<RecordRequest>, JsonRejection>,
) -> Result<Json<TimedResponse<Recorded>>, AppError> {
    let Json(req) = payload?;
    let t0 = Instant::now();
    let sensor = state.registry.get(&name)?;
    timed(&state, "record", true, t0, async move {
        sensor.record(req.value).await?;
        Ok(Recorded {
            sensor: name,
            value: req.value,
        })
    })
    .await
}

// ─── GET /api/sensors/:name/timeline ─────────────────────────────

pub async fn get_timeline(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Query(query): Query<RangeQuery>,
) -> Result<Json<TimedResponse<Timeline>>, AppError> {
    let t0 = Instant::now();
    let (from, till) = parse_range(&query)?;
    let sensor = state.registry.get(&name)?;
    timed(&state, "timeline_within", false, t0, async move {
        let points = sensor.timeline_within(from, till).await?;
        Ok(Timeline {
            sensor: name,
            step: sensor.optimized_interval(from, till),
            points,
        })
    })
    .await
}

// ─── DELETE /api/sensors/:name/timeline ──────────────────────────

pub async fn drop_range(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Query(query): Query<RangeQuery>,
) -> Result<Json<TimedResponse<Removed>>, AppError> {
    let t0 = Instant::now();
    let (from, till) = parse_range(&query)?;
    let sensor = state.registry.get(&name)?;
    timed(&state, "drop_within", true, t0, async move {
        let removed = sensor.drop_within(from, till).await?;
        Ok(Removed { removed })
    })
    .await
}

// ─── POST /api/sensors/:name/reduce ──────────────────────────────

pub async fn reduce_sensor(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<TimedResponse<Reduced>>, AppError> {
    let t0 = Instant::now();
    let sensor = state.registry.get(&name)?;
    timed(&state, "reduce_all_raw", true, t0, async move {
        let reduced = sensor.reduce_all_raw().await?;
        Ok(Reduced { reduced })
    })
    .await
}

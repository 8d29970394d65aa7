//! End-to-end timeline scenarios against the in-memory store.
//!
//! - Raw fallback vs. summarized path for the same interval
//! - Query-width coarsening for long ranges
//! - Concurrent writers into one bucket
//! - Full bucket lifecycle through the registry sweep

use std::sync::Arc;

use redis_timeline::{
    AggregatorKind, ManualClock, MemoryStore, Sensor, SensorConfig, SensorData, SensorRegistry,
    Store, MAX_TIMESPAN_POINTS,
};

const T0: i64 = 1_700_000_040;

fn setup(config: SensorConfig, kind: AggregatorKind) -> (Arc<ManualClock>, Arc<MemoryStore>, Arc<Sensor>) {
    let clock = Arc::new(ManualClock::new(T0));
    let store = Arc::new(MemoryStore::with_clock(clock.clone()));
    let sensor = Sensor::new("api.latency", config, store.clone(), kind.build())
        .unwrap()
        .with_clock(clock.clone());
    (clock, store, Arc::new(sensor))
}

// ============================================================================
// Reduction scenarios
// ============================================================================

#[tokio::test]
async fn test_sum_scenario_from_raw_to_summary() {
    let config = SensorConfig::new(60, 3600)
        .with_raw_data_ttl(120)
        .with_reduce_delay(30);
    let (clock, store, sensor) = setup(config, AggregatorKind::Sum);

    for v in [2.0, 3.0, 5.0] {
        sensor.record(v).await.unwrap();
    }
    let before = sensor.timeline_within(T0 - 60, T0 + 1).await.unwrap();
    assert_eq!(before, vec![SensorData::new(T0, Some(10.0))]);

    clock.advance(90);
    assert_eq!(sensor.reduce_all_raw().await.unwrap(), 1);

    let ks = sensor.keyspace();
    assert!(!store.exists(&ks.raw_key(T0)).await.unwrap());
    assert_eq!(store.ttl(&ks.data_key(T0)), Some(3600));

    // Past the raw TTL the value is still served from the summary.
    clock.advance(600);
    let after = sensor.timeline_within(T0 - 60, T0 + 1).await.unwrap();
    assert_eq!(after, before);

    // And gone once the summary itself expires.
    clock.advance(3600);
    let expired = sensor.timeline_within(T0 - 60, T0 + 1).await.unwrap();
    assert_eq!(expired, vec![SensorData::new(T0, None)]);
}

#[tokio::test]
async fn test_reduction_preserves_timeline_values() {
    let (clock, _store, sensor) = setup(SensorConfig::new(10, 3600), AggregatorKind::Mean);

    for step in 0..6 {
        sensor.record(step as f64).await.unwrap();
        sensor.record(step as f64 + 1.0).await.unwrap();
        clock.advance(10);
    }
    let range = (T0 - 10, T0 + 60);
    let raw_view = sensor.timeline_within(range.0, range.1).await.unwrap();

    clock.advance(3600 - 200);
    sensor.reduce_all_raw().await.unwrap();
    let reduced_view = sensor.timeline_within(range.0, range.1).await.unwrap();

    assert_eq!(raw_view.len(), 6);
    assert_eq!(raw_view, reduced_view);
    assert_eq!(raw_view[0].value, Some(0.5));
    assert_eq!(raw_view[5].value, Some(5.5));
}

// ============================================================================
// Query planning
// ============================================================================

#[tokio::test]
async fn test_long_range_is_coarsened() {
    let (_, _, sensor) = setup(SensorConfig::new(10, 3600), AggregatorKind::Sum);

    assert_eq!(sensor.optimized_interval(T0, T0 + 20_000), 40);
    let points = sensor.timeline_within(T0, T0 + 20_000).await.unwrap();
    // T0 + 40 … T0 + 19_960
    assert_eq!(points.len(), 499);
    assert!(points.iter().all(|p| p.value.is_none()));
    assert_eq!(points[0].timestamp, T0 + 40);
    assert!(points.windows(2).all(|w| w[1].timestamp - w[0].timestamp == 40));
}

#[tokio::test]
async fn test_point_count_never_exceeds_cap() {
    let (_, _, sensor) = setup(SensorConfig::new(1, 3600), AggregatorKind::Sum);

    for span in [1, 999, 1000, 1001, 65_537, 10_000_000] {
        let points = sensor.timeline_within(T0 - span, T0).await.unwrap();
        assert!(
            points.len() as u64 <= MAX_TIMESPAN_POINTS,
            "span {span} returned {} points",
            points.len()
        );
    }
}

// ============================================================================
// Concurrency
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_writers_lose_nothing() {
    let (_, _, sensor) = setup(SensorConfig::new(60, 3600), AggregatorKind::Count);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let sensor = sensor.clone();
        handles.push(tokio::spawn(async move {
            for _ in 0..50 {
                sensor.record(1.0).await.unwrap();
            }
        }));
    }
    for h in handles {
        h.await.unwrap();
    }

    assert_eq!(sensor.get_raw_value(T0).await.unwrap(), Some(400.0));
}

#[tokio::test]
async fn test_overlapping_sweeps_reduce_once() {
    let (clock, store, sensor) = setup(SensorConfig::new(60, 3600), AggregatorKind::Max);
    sensor.record(3.0).await.unwrap();
    sensor.record(8.0).await.unwrap();
    clock.advance(300);

    let (a, b) = tokio::join!(sensor.reduce_all_raw(), sensor.reduce_all_raw());
    assert_eq!(a.unwrap() + b.unwrap(), 1);
    assert_eq!(
        store.get(&sensor.keyspace().data_key(T0)).await.unwrap().as_deref(),
        Some("8")
    );
}

// ============================================================================
// Registry lifecycle
// ============================================================================

#[tokio::test]
async fn test_registry_sweep_and_removal() {
    let clock = Arc::new(ManualClock::new(T0));
    let store = Arc::new(MemoryStore::with_clock(clock.clone()));
    let registry = SensorRegistry::new();

    for (name, kind) in [("cpu", AggregatorKind::Max), ("hits", AggregatorKind::Count)] {
        let sensor = Sensor::new(name, SensorConfig::new(60, 3600), store.clone(), kind.build())
            .unwrap()
            .with_clock(clock.clone());
        let sensor = registry.register(sensor).unwrap();
        sensor.record(42.0).await.unwrap();
    }

    clock.advance(600);
    let report = registry.reduce_all().await;
    assert_eq!(report.sensors, 2);
    assert_eq!(report.reduced, 2);
    assert!(report.failures.is_empty());

    assert_eq!(registry.remove("cpu").await.unwrap(), 1);
    assert_eq!(registry.names(), vec!["hits".to_string()]);
    assert_eq!(store.len(), 1);
}

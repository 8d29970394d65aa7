use std::collections::BTreeMap;
use std::time::Instant;

use hdrhistogram::Histogram;
use parking_lot::Mutex;
use serde::Serialize;

use super::percentiles::PercentileSet;
use super::Sample;

// ─── Configuration ───────────────────────────────────────────────

/// HdrHistogram range: 1 μs → 60 s, 3 significant figures
const HIST_LOW: u64 = 1;
const HIST_HIGH: u64 = 60_000_000;
const HIST_SIGFIG: u8 = 3;

// ─── Public types ────────────────────────────────────────────────

/// Thread-safe latency recorder shared by all handlers.
pub struct MetricsCollector {
    inner: Mutex<Inner>,
}

/// Per-operation counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OperationCounts {
    pub calls: u64,
    pub errors: u64,
}

/// Read-only view served on `GET /api/metrics`.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub store_read: PercentileSet,
    pub store_write: PercentileSet,
    pub e2e: PercentileSet,

    pub total_requests: u64,
    pub total_errors: u64,
    pub requests_per_sec: f64,
    pub uptime_secs: f64,

    pub operations: BTreeMap<&'static str, OperationCounts>,
}

// ─── Internal state ──────────────────────────────────────────────

struct Inner {
    store_read_hist: Histogram<u64>,
    store_write_hist: Histogram<u64>,
    e2e_hist: Histogram<u64>,

    total_requests: u64,
    total_errors: u64,
    operations: BTreeMap<&'static str, OperationCounts>,

    started: Instant,
}

fn histogram() -> Histogram<u64> {
    Histogram::new_with_bounds(HIST_LOW, HIST_HIGH, HIST_SIGFIG)
        .expect("histogram creation")
}

// ─── MetricsCollector impl ───────────────────────────────────────

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::new()),
        }
    }

    pub fn record(&self, sample: Sample) {
        self.inner.lock().record(sample);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.inner.lock().snapshot()
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Inner impl ──────────────────────────────────────────────────

impl Inner {
    fn new() -> Self {
        Self {
            store_read_hist: histogram(),
            store_write_hist: histogram(),
            e2e_hist: histogram(),
            total_requests: 0,
            total_errors: 0,
            operations: BTreeMap::new(),
            started: Instant::now(),
        }
    }

    fn record(&mut self, sample: Sample) {
        self.total_requests += 1;
        let counts = self.operations.entry(sample.operation).or_default();
        counts.calls += 1;
        if !sample.success {
            self.total_errors += 1;
            counts.errors += 1;
        }

        // Clamp into the histogram range (≥ 1 μs)
        let store_us = sample.store_us.clamp(HIST_LOW, HIST_HIGH);
        let total_us = sample.total_us.clamp(HIST_LOW, HIST_HIGH);

        let store_hist = if sample.is_write {
            &mut self.store_write_hist
        } else {
            &mut self.store_read_hist
        };
        let _ = store_hist.record(store_us);
        let _ = self.e2e_hist.record(total_us);
    }

    fn snapshot(&self) -> MetricsSnapshot {
        let uptime_secs = self.started.elapsed().as_secs_f64();
        let requests_per_sec = if uptime_secs > 0.0 {
            self.total_requests as f64 / uptime_secs
        } else {
            0.0
        };

        MetricsSnapshot {
            store_read: PercentileSet::from_histogram(&self.store_read_hist),
            store_write: PercentileSet::from_histogram(&self.store_write_hist),
            e2e: PercentileSet::from_histogram(&self.e2e_hist),
            total_requests: self.total_requests,
            total_errors: self.total_errors,
            requests_per_sec,
            uptime_secs,
            operations: self.operations.clone(),
        }
    }
}

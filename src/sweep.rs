use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::IntervalStream;
use tokio_stream::StreamExt;
use tracing::{debug, info};

use crate::registry::SensorRegistry;

/// Stop signal shared between a sweep task and its handle.
#[derive(Debug)]
pub struct Shutdown {
    running: AtomicBool,
    notify: Notify,
}

impl Shutdown {
    pub fn new() -> Self {
        Self {
            running: AtomicBool::new(true),
            notify: Notify::new(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Clear the flag and wake a task waiting for its next tick. The permit
    /// is kept if the task is mid-sweep, so it stops right after.
    pub fn trigger(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.notify.notify_one();
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to a running sweep task.
pub struct SweepHandle {
    shutdown: Arc<Shutdown>,
    handle: JoinHandle<()>,
}

impl SweepHandle {
    pub fn is_running(&self) -> bool {
        self.shutdown.is_running()
    }

    /// Signal the task and wait for the in-flight sweep, if any, to finish.
    pub async fn stop(self) {
        self.shutdown.trigger();
        // Ignore JoinError — the task may have already finished
        let _ = self.handle.await;
    }
}

/// Spawn a task that sweeps the registry every `period`, starting now.
pub fn spawn(registry: Arc<SensorRegistry>, period: Duration) -> SweepHandle {
    let shutdown = Arc::new(Shutdown::new());
    let handle = tokio::spawn(run(registry, period, shutdown.clone()));
    SweepHandle { shutdown, handle }
}

/// Reduce finished intervals of every registered sensor on each tick
/// until `shutdown` is triggered.
pub async fn run(registry: Arc<SensorRegistry>, period: Duration, shutdown: Arc<Shutdown>) {
    let mut ticks = IntervalStream::new(tokio::time::interval(period));
    info!(period_ms = period.as_millis() as u64, "reduction sweep started");

    while shutdown.is_running() {
        tokio::select! {
            _ = shutdown.notify.notified() => break,
            tick = ticks.next() => {
                if tick.is_none() {
                    break;
                }
            }
        }

        let report = registry.reduce_all().await;
        if report.reduced > 0 || !report.failures.is_empty() {
            info!(
                sensors = report.sensors,
                reduced = report.reduced,
                failed = report.failures.len(),
                "sweep finished"
            );
        } else {
            debug!(sensors = report.sensors, "sweep found nothing to reduce");
        }
    }

    info!("reduction sweep stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::Sum;
    use crate::clock::ManualClock;
    use crate::config::SensorConfig;
    use crate::sensor::Sensor;
    use crate::store::{MemoryStore, Store};

    #[tokio::test]
    async fn spawned_sweep_reduces_until_stopped() {
        let t0 = 1_700_000_040;
        let clock = Arc::new(ManualClock::new(t0));
        let store = Arc::new(MemoryStore::with_clock(clock.clone()));
        let registry = Arc::new(SensorRegistry::new());
        let sensor = registry
            .register(
                Sensor::new("jobs", SensorConfig::new(60, 3600), store.clone(), Arc::new(Sum))
                    .unwrap()
                    .with_clock(clock.clone()),
            )
            .unwrap();

        sensor.record(5.0).await.unwrap();
        clock.advance(600);

        let sweep = spawn(registry, Duration::from_millis(5));
        assert!(sweep.is_running());

        let data_key = sensor.keyspace().data_key(t0);
        for _ in 0..200 {
            if store.exists(&data_key).await.unwrap() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        sweep.stop().await;

        assert_eq!(store.get(&data_key).await.unwrap().as_deref(), Some("5"));
    }

    #[tokio::test]
    async fn stop_does_not_wait_for_the_next_tick() {
        let registry = Arc::new(SensorRegistry::new());
        let sweep = spawn(registry, Duration::from_secs(30));
        // Let the immediate first tick run.
        tokio::time::sleep(Duration::from_millis(20)).await;

        let started = std::time::Instant::now();
        tokio::time::timeout(Duration::from_secs(2), sweep.stop())
            .await
            .expect("sweep should stop without waiting a full period");
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn shutdown_before_first_tick_skips_the_sweep() {
        let clock = Arc::new(ManualClock::new(1_700_000_040));
        let store = Arc::new(MemoryStore::with_clock(clock.clone()));
        let registry = Arc::new(SensorRegistry::new());
        let sensor = registry
            .register(
                Sensor::new("jobs", SensorConfig::new(60, 3600), store.clone(), Arc::new(Sum))
                    .unwrap()
                    .with_clock(clock.clone()),
            )
            .unwrap();
        sensor.record(1.0).await.unwrap();
        clock.advance(600);

        let shutdown = Arc::new(Shutdown::new());
        shutdown.trigger();
        run(registry, Duration::from_secs(30), shutdown).await;

        assert!(store.exists(&sensor.keyspace().raw_key(1_700_000_040)).await.unwrap());
    }
}

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{Result, TimelineError};
use crate::sensor::Sensor;

/// Named sensors owned by one process, and the fan-out point for the
/// periodic reduction sweep.
#[derive(Debug, Default)]
pub struct SensorRegistry {
    sensors: RwLock<BTreeMap<String, Arc<Sensor>>>,
}

/// Outcome of one sweep over every registered sensor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub sensors: usize,
    pub reduced: usize,
    /// Sensors whose sweep failed, with the error message
    pub failures: Vec<(String, String)>,
}

impl SensorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, sensor: Sensor) -> Result<Arc<Sensor>> {
        let mut sensors = self.sensors.write();
        if sensors.contains_key(sensor.name()) {
            return Err(TimelineError::SensorExists(sensor.name().to_owned()));
        }
        let sensor = Arc::new(sensor);
        sensors.insert(sensor.name().to_owned(), sensor.clone());
        info!(sensor = %sensor.name(), aggregator = %sensor.aggregator().kind(), "sensor registered");
        Ok(sensor)
    }

    pub fn get(&self, name: &str) -> Result<Arc<Sensor>> {
        self.sensors
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| TimelineError::SensorNotFound(name.to_owned()))
    }

    pub fn names(&self) -> Vec<String> {
        self.sensors.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.sensors.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sensors.read().is_empty()
    }

    /// Delete the sensor's data, then forget it. The registration is kept
    /// if the cleanup fails so that it can be retried.
    pub async fn remove(&self, name: &str) -> Result<u64> {
        let sensor = self.get(name)?;
        let removed = sensor.cleanup().await?;
        self.sensors.write().remove(name);
        Ok(removed)
    }

    /// Run `reduce_all_raw` on every sensor. A failing sensor is logged and
    /// reported; the others are still swept.
    pub async fn reduce_all(&self) -> SweepReport {
        let sensors: Vec<Arc<Sensor>> = self.sensors.read().values().cloned().collect();

        let mut report = SweepReport {
            sensors: sensors.len(),
            ..SweepReport::default()
        };
        for sensor in sensors {
            match sensor.reduce_all_raw().await {
                Ok(n) => report.reduced += n,
                Err(e) => {
                    warn!(sensor = %sensor.name(), error = %e, "sweep failed");
                    report.failures.push((sensor.name().to_owned(), e.to_string()));
                }
            }
        }
        report
    }
}

//! A named timeline: one value per fixed-width interval, stored under keys
//! owned exclusively by this sensor.
//!
//! Events land in a raw bucket for the current interval (`record`). Once an
//! interval is old enough, `reduce` folds its raw bucket into a single
//! summarized value. Range queries (`timeline_within`) read summarized
//! values first and fall back to summarizing raw buckets on the fly.

mod query;
mod reduce;

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use crate::aggregate::{Aggregator, RawBucket, RawLayout};
use crate::clock::{Clock, IntervalClock, SystemClock};
use crate::config::SensorConfig;
use crate::error::{Result, TimelineError};
use crate::keys::{Keyspace, DEFAULT_NAMESPACE};
use crate::store::{Batch, Store};

pub use self::query::{optimized_interval, SensorData, MAX_TIMESPAN_POINTS};

pub struct Sensor {
    name: String,
    config: SensorConfig,
    keys: Keyspace,
    clock: IntervalClock,
    store: Arc<dyn Store>,
    aggregator: Arc<dyn Aggregator>,
}

impl Sensor {
    /// Fails before touching the store if the name or any option is invalid.
    pub fn new(
        name: impl Into<String>,
        config: SensorConfig,
        store: Arc<dyn Store>,
        aggregator: Arc<dyn Aggregator>,
    ) -> Result<Self> {
        let name = name.into();
        config.validate()?;
        let keys = Keyspace::new(DEFAULT_NAMESPACE, &name)?;
        let clock = IntervalClock::new(config.interval, Arc::new(SystemClock))?;

        Ok(Self {
            name,
            config,
            keys,
            clock,
            store,
            aggregator,
        })
    }

    /// Place this sensor's keys under another namespace prefix.
    pub fn with_namespace(mut self, namespace: &str) -> Result<Self> {
        self.keys = Keyspace::new(namespace, &self.name)?;
        Ok(self)
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = self.clock.with_clock(clock);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &SensorConfig {
        &self.config
    }

    pub fn keyspace(&self) -> &Keyspace {
        &self.keys
    }

    pub fn aggregator(&self) -> &Arc<dyn Aggregator> {
        &self.aggregator
    }

    pub fn interval_id(&self, timestamp: i64) -> i64 {
        self.clock.interval_id(timestamp)
    }

    pub fn current_interval_id(&self) -> i64 {
        self.clock.current_interval_id()
    }

    // ─── Recording ───────────────────────────────────────────────

    /// Fold `value` into the current interval's raw bucket and push its
    /// expiry `raw_data_ttl` seconds into the future, in one atomic batch.
    pub async fn record(&self, value: f64) -> Result<()> {
        if !value.is_finite() {
            return Err(TimelineError::InvalidValue(value));
        }

        let interval_id = self.clock.current_interval_id();
        let key = self.keys.raw_key(interval_id);

        let mut batch = Batch::new();
        self.aggregator.combine(&mut batch, &key, value);
        batch.expire(&key, self.config.raw_data_ttl);
        self.store.atomic(batch).await?;

        debug!(sensor = %self.name, interval_id, value, "recorded event");
        Ok(())
    }

    // ─── Raw buckets ─────────────────────────────────────────────

    /// Decode the raw bucket for `interval_id`, if one exists.
    pub(crate) async fn read_raw(&self, interval_id: i64) -> Result<Option<RawBucket>> {
        let key = self.keys.raw_key(interval_id);
        match self.aggregator.layout() {
            RawLayout::Scalar => match self.store.get(&key).await? {
                Some(stored) => Ok(Some(RawBucket::Scalar(parse_value(&key, &stored)?))),
                None => Ok(None),
            },
            RawLayout::Samples => {
                let items = self.store.members(&key).await?;
                if items.is_empty() {
                    return Ok(None);
                }
                let samples = items
                    .iter()
                    .map(|item| parse_value(&key, item))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Some(RawBucket::Samples(samples)))
            }
        }
    }

    fn summarize(&self, key: &str, raw: &RawBucket) -> Result<f64> {
        self.aggregator
            .summarize(raw)
            .ok_or_else(|| TimelineError::Corrupt {
                key: key.to_owned(),
                reason: format!(
                    "raw bucket does not match the {} aggregator",
                    self.aggregator.kind()
                ),
            })
    }

    /// Summary of a raw bucket computed in memory; the bucket is left as is.
    pub async fn get_raw_value(&self, interval_id: i64) -> Result<Option<f64>> {
        match self.read_raw(interval_id).await? {
            Some(raw) => {
                let key = self.keys.raw_key(interval_id);
                self.summarize(&key, &raw).map(Some)
            }
            None => Ok(None),
        }
    }

    // ─── Lifecycle ───────────────────────────────────────────────

    /// Delete every raw and summarized key of this sensor in one batch.
    /// Returns how many keys were targeted.
    pub async fn cleanup(&self) -> Result<u64> {
        let mut keys = self.store.keys(&self.keys.raw_pattern()).await?;
        keys.extend(self.store.keys(&self.keys.data_pattern()).await?);
        if keys.is_empty() {
            return Ok(0);
        }

        let count = keys.len() as u64;
        let mut batch = Batch::new();
        batch.delete(keys);
        self.store.atomic(batch).await?;

        info!(sensor = %self.name, keys = count, "sensor data removed");
        Ok(count)
    }
}

impl fmt::Debug for Sensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sensor")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("aggregator", &self.aggregator)
            .finish_non_exhaustive()
    }
}

pub(crate) fn parse_value(key: &str, stored: &str) -> Result<f64> {
    stored.parse().map_err(|_| TimelineError::Corrupt {
        key: key.to_owned(),
        reason: format!("{stored:?} is not a number"),
    })
}

use serde::{Deserialize, Serialize};

use super::{parse_value, Sensor};
use crate::clock::is_representable;
use crate::error::{Result, TimelineError};

/// Upper bound on the number of points a range query returns.
pub const MAX_TIMESPAN_POINTS: u64 = 1000;

/// Above this many base intervals `drop_within` deletes the sensor's
/// existing keys in range instead of naming every interval.
const MAX_DROP_INTERVALS: u64 = 100_000;

/// One point of a timeline. `value` is `None` when the interval has neither
/// a raw nor a summarized bucket.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorData {
    pub timestamp: i64,
    pub value: Option<f64>,
}

impl SensorData {
    pub fn new(timestamp: i64, value: Option<f64>) -> Self {
        Self { timestamp, value }
    }
}

/// Smallest power-of-two multiple of `base` that splits `[from, till)` into
/// at most `MAX_TIMESPAN_POINTS - 1` steps.
pub fn optimized_interval(base: u64, from: i64, till: i64) -> u64 {
    let span = (i128::from(till) - i128::from(from)).max(0) as u128;
    let max_steps = u128::from(MAX_TIMESPAN_POINTS - 1);
    let mut width = u128::from(base.max(1));
    // span / width > max_steps, without the rounding of integer division
    while span > max_steps * width {
        width *= 2;
    }
    width as u64
}

fn check_range(from: i64, till: i64) -> Result<()> {
    if from >= till || !is_representable(from) || !is_representable(till) {
        return Err(TimelineError::InvalidRange { from, till });
    }
    Ok(())
}

/// Interval ids `start + width, start + 2·width, …` strictly below `till`.
fn steps(start: i64, width: u64, till: i64) -> Vec<i64> {
    let width = i64::try_from(width).unwrap_or(i64::MAX);
    let mut ids = Vec::new();
    let mut next = start.checked_add(width);
    while let Some(id) = next.filter(|&id| id < till) {
        ids.push(id);
        next = id.checked_add(width);
    }
    ids
}

/// How many ids `steps(start, width, till)` yields.
fn interval_count(start: i64, width: u64, till: i64) -> u64 {
    let span = (i128::from(till) - i128::from(start) - 1).max(0) as u128;
    u64::try_from(span / u128::from(width.max(1))).unwrap_or(u64::MAX)
}

impl Sensor {
    pub fn optimized_interval(&self, from: i64, till: i64) -> u64 {
        optimized_interval(self.config.interval, from, till)
    }

    /// Values for `(from, till)` in chronological order, at the coarsest
    /// resolution needed to stay within `MAX_TIMESPAN_POINTS`.
    ///
    /// The bucket containing `from` itself is not part of the result.
    /// Summarized values are fetched with one multi-get; intervals without
    /// one are summarized from their raw bucket in memory.
    pub async fn timeline_within(&self, from: i64, till: i64) -> Result<Vec<SensorData>> {
        check_range(from, till)?;

        let width = self.optimized_interval(from, till);
        let ids = steps(self.clock.interval_id(from), width, till);
        let keys: Vec<String> = ids.iter().map(|&id| self.keys.data_key(id)).collect();
        let stored = self.store.mget(&keys).await?;

        let mut timeline = Vec::with_capacity(ids.len());
        for ((&id, key), value) in ids.iter().zip(&keys).zip(stored) {
            let value = match value {
                Some(summary) => Some(parse_value(key, &summary)?),
                None => self.get_raw_value(id).await?,
            };
            timeline.push(SensorData::new(id, value));
        }
        Ok(timeline)
    }

    /// Delete raw and summarized keys of every base interval in
    /// `(from, till)`. Returns how many keys existed.
    pub async fn drop_within(&self, from: i64, till: i64) -> Result<u64> {
        check_range(from, till)?;

        let start = self.clock.interval_id(from);
        let keys: Vec<String> = if interval_count(start, self.config.interval, till)
            <= MAX_DROP_INTERVALS
        {
            steps(start, self.config.interval, till)
                .into_iter()
                .flat_map(|id| [self.keys.raw_key(id), self.keys.data_key(id)])
                .collect()
        } else {
            self.existing_keys_within(start, till).await?
        };
        if keys.is_empty() {
            return Ok(0);
        }
        self.store.delete(&keys).await
    }

    /// Raw and summarized keys whose id lies in `(start, till)`.
    async fn existing_keys_within(&self, start: i64, till: i64) -> Result<Vec<String>> {
        let in_range = |id: i64| id > start && id < till;

        let mut keys: Vec<String> = self
            .store
            .keys(&self.keys.raw_pattern())
            .await?
            .into_iter()
            .filter(|key| self.keys.parse_raw(key).is_some_and(in_range))
            .collect();
        keys.extend(
            self.store
                .keys(&self.keys.data_pattern())
                .await?
                .into_iter()
                .filter(|key| self.keys.parse_data(key).is_some_and(in_range)),
        );
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use proptest::prelude::*;

    use super::*;
    use crate::aggregate::Sum;
    use crate::config::SensorConfig;
    use crate::sensor::tests::{fixture, T0};
    use crate::store::Store;

    fn scenario_config() -> SensorConfig {
        SensorConfig::new(60, 3600)
            .with_raw_data_ttl(120)
            .with_reduce_delay(30)
    }

    #[test]
    fn optimized_interval_doubles_until_points_fit() {
        // 2000 → 1000 → 500 points
        assert_eq!(optimized_interval(10, 0, 20_000), 40);
        assert_eq!(optimized_interval(10, 0, 9_990), 10);
        assert_eq!(optimized_interval(10, 0, 9_991), 20);
        assert_eq!(optimized_interval(60, 0, 60), 60);
    }

    #[test]
    fn steps_exclude_the_starting_bucket() {
        assert_eq!(steps(0, 10, 35), vec![10, 20, 30]);
        assert_eq!(steps(0, 10, 10), Vec::<i64>::new());
        assert_eq!(steps(i64::MAX - 5, 10, i64::MAX), Vec::<i64>::new());
    }

    #[tokio::test]
    async fn single_event_round_trips_through_raw_fallback() {
        let fx = fixture(scenario_config(), Arc::new(Sum));
        fx.sensor.record(7.25).await.unwrap();

        let timeline = fx.sensor.timeline_within(T0 - 1, T0 + 1).await.unwrap();
        assert_eq!(timeline, vec![SensorData::new(T0, Some(7.25))]);
    }

    #[tokio::test]
    async fn sum_scenario_reads_raw_then_summary() {
        let fx = fixture(scenario_config(), Arc::new(Sum));
        for v in [2.0, 3.0, 5.0] {
            fx.sensor.record(v).await.unwrap();
        }

        let expected = vec![SensorData::new(T0, Some(10.0))];
        assert_eq!(
            fx.sensor.timeline_within(T0 - 60, T0 + 30).await.unwrap(),
            expected
        );

        assert!(fx.sensor.reduce(T0).await.unwrap());
        assert_eq!(fx.store.ttl(&fx.sensor.keyspace().data_key(T0)), Some(3600));

        // Poison the raw path: a read that fell back would now see 99.
        let raw_key = fx.sensor.keyspace().raw_key(T0);
        fx.store.set(&raw_key, "99").await.unwrap();
        assert_eq!(
            fx.sensor.timeline_within(T0 - 60, T0 + 30).await.unwrap(),
            expected
        );
    }

    #[tokio::test]
    async fn missing_intervals_are_reported_as_absent() {
        let fx = fixture(scenario_config(), Arc::new(Sum));
        fx.sensor.record(1.0).await.unwrap();

        let timeline = fx.sensor.timeline_within(T0 - 120, T0 + 90).await.unwrap();
        assert_eq!(
            timeline,
            vec![
                SensorData::new(T0 - 60, None),
                SensorData::new(T0, Some(1.0)),
                SensorData::new(T0 + 60, None),
            ]
        );
    }

    #[tokio::test]
    async fn invalid_range_fails_before_store_access() {
        let fx = fixture(scenario_config(), Arc::new(Sum));
        for (from, till) in [(T0, T0), (T0 + 1, T0)] {
            let err = fx.sensor.timeline_within(from, till).await.unwrap_err();
            assert!(matches!(err, TimelineError::InvalidRange { .. }));
            let err = fx.sensor.drop_within(from, till).await.unwrap_err();
            assert!(matches!(err, TimelineError::InvalidRange { .. }));
        }
    }

    #[tokio::test]
    async fn unrepresentable_bounds_are_invalid_ranges() {
        let fx = fixture(scenario_config(), Arc::new(Sum));
        fx.sensor.record(1.0).await.unwrap();

        let err = fx.sensor.timeline_within(i64::MIN, 0).await.unwrap_err();
        assert!(matches!(err, TimelineError::InvalidRange { .. }));
        let err = fx.sensor.drop_within(0, i64::MAX).await.unwrap_err();
        assert!(matches!(err, TimelineError::InvalidRange { .. }));
        assert_eq!(fx.store.len(), 1);
    }

    #[tokio::test]
    async fn wide_drop_deletes_only_existing_keys_in_range() {
        let config = SensorConfig::new(1, 3600).with_raw_data_ttl(1_000_000);
        let fx = fixture(config, Arc::new(Sum));
        let from = T0 - 200_000;

        fx.clock.set(from);
        fx.sensor.record(1.0).await.unwrap();
        fx.clock.set(T0);
        fx.sensor.record(2.0).await.unwrap();
        fx.sensor.reduce(T0).await.unwrap();
        fx.clock.set(T0 + 5);
        fx.sensor.record(3.0).await.unwrap();

        assert!(interval_count(from, 1, T0 + 100) > MAX_DROP_INTERVALS);
        assert_eq!(fx.sensor.drop_within(from, T0 + 100).await.unwrap(), 2);

        // The bucket containing `from` is outside the dropped range.
        let ks = fx.sensor.keyspace();
        assert!(fx.store.exists(&ks.raw_key(from)).await.unwrap());
        assert_eq!(fx.store.len(), 1);
    }

    #[test]
    fn interval_count_matches_steps() {
        for (start, width, till) in [(0, 10, 35), (0, 10, 10), (0, 10, 11), (-60, 60, 61)] {
            assert_eq!(
                interval_count(start, width, till),
                steps(start, width, till).len() as u64
            );
        }
    }

    #[tokio::test]
    async fn corrupt_summary_is_an_error() {
        let fx = fixture(scenario_config(), Arc::new(Sum));
        fx.store
            .set(&fx.sensor.keyspace().data_key(T0), "NaN-ish")
            .await
            .unwrap();
        let err = fx.sensor.timeline_within(T0 - 1, T0 + 1).await.unwrap_err();
        assert!(matches!(err, TimelineError::Corrupt { .. }));
    }

    #[tokio::test]
    async fn year_long_query_is_capped() {
        let fx = fixture(scenario_config(), Arc::new(Sum));
        let year = 365 * 24 * 3600;
        let timeline = fx.sensor.timeline_within(T0 - year, T0).await.unwrap();
        assert!(!timeline.is_empty());
        assert!(timeline.len() as u64 <= MAX_TIMESPAN_POINTS);
        assert!(timeline.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    }

    #[tokio::test]
    async fn drop_within_removes_range_once() {
        let fx = fixture(
            SensorConfig::new(60, 3600).with_raw_data_ttl(3600),
            Arc::new(Sum),
        );
        for _ in 0..4 {
            fx.sensor.record(1.0).await.unwrap();
            fx.clock.advance(60);
        }
        // Raw buckets at T0 .. T0+180; summarize the first one.
        fx.sensor.reduce(T0).await.unwrap();

        // (T0 - 1, T0 + 120) covers T0 and T0 + 60 only.
        assert_eq!(fx.sensor.drop_within(T0 - 1, T0 + 120).await.unwrap(), 2);
        assert_eq!(fx.sensor.drop_within(T0 - 1, T0 + 120).await.unwrap(), 0);

        let ks = fx.sensor.keyspace();
        assert!(fx.store.exists(&ks.raw_key(T0 + 120)).await.unwrap());
        assert!(fx.store.exists(&ks.raw_key(T0 + 180)).await.unwrap());
        assert_eq!(fx.store.len(), 2);
    }

    proptest! {
        #[test]
        fn optimized_interval_bounds_points(
            base in 1u64..10_000,
            from in -1_000_000_000i64..1_000_000_000,
            span in 1i64..2_000_000_000,
        ) {
            let till = from + span;
            let width = optimized_interval(base, from, till);

            prop_assert_eq!(width % base, 0);
            prop_assert!((width / base).is_power_of_two());
            prop_assert!(span as u128 <= u128::from(MAX_TIMESPAN_POINTS - 1) * u128::from(width));
            if width > base {
                // The next smaller width would not have fit.
                prop_assert!(span as u128 > u128::from(MAX_TIMESPAN_POINTS - 1) * u128::from(width / 2));
            }

            let start = from.div_euclid(base as i64) * base as i64;
            prop_assert!(steps(start, width, till).len() as u64 <= MAX_TIMESPAN_POINTS);
        }
    }
}

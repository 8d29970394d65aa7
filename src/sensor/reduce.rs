use tracing::{debug, info, warn};

use super::Sensor;
use crate::error::{Result, TimelineError};
use crate::store::Batch;

impl Sensor {
    /// Replace the raw bucket of `interval_id` with its summary.
    ///
    /// Returns `false` without writing anything when there is no raw bucket,
    /// either because the interval was already reduced or never had events.
    /// Deleting the raw bucket and writing the summary (with its `ttl`)
    /// happen in one atomic batch.
    pub async fn reduce(&self, interval_id: i64) -> Result<bool> {
        let raw_key = self.keys.raw_key(interval_id);
        if !self.store.exists(&raw_key).await? {
            return Ok(false);
        }
        // Expired or reduced by another process since the check.
        let Some(raw) = self.read_raw(interval_id).await? else {
            return Ok(false);
        };
        let summary = self.summarize(&raw_key, &raw)?;

        let data_key = self.keys.data_key(interval_id);
        let mut batch = Batch::new();
        batch
            .delete(vec![raw_key])
            .set(&data_key, summary.to_string())
            .expire(&data_key, self.config.ttl);
        self.store.atomic(batch).await?;

        debug!(sensor = %self.name, interval_id, summary, "reduced interval");
        Ok(true)
    }

    /// Reduce every raw bucket whose interval ended at least `reduce_delay`
    /// seconds ago. Safe to run concurrently from several processes.
    /// Returns the number of intervals reduced by this call.
    ///
    /// A bucket that cannot be decoded is logged and left in place; store
    /// failures stop the run.
    pub async fn reduce_all_raw(&self) -> Result<usize> {
        let min_time = self.clock.now()
            - self.config.reduce_delay as i64
            - self.config.interval as i64;

        let keys = self.store.keys(&self.keys.raw_pattern()).await?;
        let mut ready: Vec<i64> = keys
            .iter()
            .filter_map(|key| {
                let parsed = self.keys.parse_raw(key);
                if parsed.is_none() {
                    warn!(sensor = %self.name, key = %key, "skipping raw key without an interval id");
                }
                parsed
            })
            .filter(|&interval_id| interval_id <= min_time)
            .collect();
        ready.sort_unstable();

        let mut reduced = 0;
        for interval_id in ready {
            match self.reduce(interval_id).await {
                Ok(true) => reduced += 1,
                Ok(false) => {}
                Err(e @ TimelineError::Corrupt { .. }) => {
                    warn!(sensor = %self.name, interval_id, error = %e, "skipping undecodable raw bucket");
                }
                Err(e) => return Err(e),
            }
        }

        if reduced > 0 {
            info!(sensor = %self.name, reduced, "reduced finished intervals");
        }
        Ok(reduced)
    }
}

//! Time-bucketed metric timelines on top of a TTL-capable key-value store.
//!
//! A [`Sensor`] records events into per-interval raw buckets, reduces
//! finished intervals into one summarized value each, and answers range
//! queries with a bounded number of points. Raw buckets slide their TTL on
//! every event; summarized values get a fixed TTL when they are written.
//!
//! ```no_run
//! use std::sync::Arc;
//! use redis_timeline::{AggregatorKind, RedisStore, Sensor, SensorConfig};
//!
//! # async fn demo() -> redis_timeline::Result<()> {
//! let store = Arc::new(RedisStore::connect("redis://127.0.0.1:6379/").await?);
//! let sensor = Sensor::new(
//!     "http.requests",
//!     SensorConfig::new(60, 86_400),
//!     store,
//!     AggregatorKind::Count.build(),
//! )?;
//!
//! sensor.record(1.0).await?;
//! let now = chrono::Utc::now().timestamp();
//! let last_hour = sensor.timeline_within(now - 3600, now).await?;
//! # Ok(())
//! # }
//! ```

pub mod aggregate;
pub mod clock;
pub mod config;
pub mod error;
pub mod handlers;
pub mod keys;
pub mod metrics;
pub mod middleware;
pub mod registry;
pub mod sensor;
pub mod server;
pub mod store;
pub mod sweep;

pub use aggregate::{Aggregator, AggregatorKind, RawBucket, RawLayout};
pub use clock::{Clock, IntervalClock, ManualClock, SystemClock};
pub use config::{SensorConfig, ServerConfig};
pub use error::{Result, TimelineError};
pub use registry::{SensorRegistry, SweepReport};
pub use sensor::{optimized_interval, Sensor, SensorData, MAX_TIMESPAN_POINTS};
pub use server::{create_router, AppState};
pub use store::{Batch, Command, MemoryStore, RedisStore, Store};

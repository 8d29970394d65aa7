use std::net::SocketAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TimelineError};

// ─── Sensor options ──────────────────────────────────────────────

/// Per-sensor bucketing and retention settings, all in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorConfig {
    /// Width of one bucket
    pub interval: u64,

    /// Lifetime of a summarized value, fixed at reduction time
    pub ttl: u64,

    /// Sliding lifetime of a raw bucket, refreshed on every event
    #[serde(default = "default_raw_data_ttl")]
    pub raw_data_ttl: u64,

    /// Grace period after an interval ends before it may be reduced
    #[serde(default = "default_reduce_delay")]
    pub reduce_delay: u64,
}

fn default_raw_data_ttl() -> u64 {
    3600
}
fn default_reduce_delay() -> u64 {
    60
}

impl SensorConfig {
    pub fn new(interval: u64, ttl: u64) -> Self {
        Self {
            interval,
            ttl,
            raw_data_ttl: default_raw_data_ttl(),
            reduce_delay: default_reduce_delay(),
        }
    }

    pub fn with_raw_data_ttl(mut self, secs: u64) -> Self {
        self.raw_data_ttl = secs;
        self
    }

    pub fn with_reduce_delay(mut self, secs: u64) -> Self {
        self.reduce_delay = secs;
        self
    }

    /// Every option must be a positive number of seconds.
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("interval", self.interval),
            ("ttl", self.ttl),
            ("raw_data_ttl", self.raw_data_ttl),
            ("reduce_delay", self.reduce_delay),
        ];
        for (name, value) in fields {
            if value == 0 {
                return Err(TimelineError::Config(format!(
                    "{name} must be a positive integer"
                )));
            }
            if value > i64::MAX as u64 {
                return Err(TimelineError::Config(format!("{name} is too large")));
            }
        }
        Ok(())
    }

    /// Parse and validate a JSON object such as
    /// `{"interval": 60, "ttl": 3600}`.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| TimelineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

// ─── Server options ──────────────────────────────────────────────

/// Process-level settings for the HTTP service, read from the environment.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub redis_url: String,
    pub bind: SocketAddr,
    /// Prefix of every key written by this process
    pub namespace: String,
    /// How often the registry sweep reduces finished intervals
    pub sweep_period: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://127.0.0.1:6379/".into(),
            bind: SocketAddr::from(([0, 0, 0, 0], 3000)),
            namespace: crate::keys::DEFAULT_NAMESPACE.into(),
            sweep_period: Duration::from_secs(30),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source; unset names keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("TIMELINE_REDIS_URL") {
            config.redis_url = url;
        }
        if let Some(bind) = lookup("TIMELINE_BIND") {
            config.bind = bind.parse().map_err(|e| {
                TimelineError::Config(format!("TIMELINE_BIND={bind:?}: {e}"))
            })?;
        }
        if let Some(ns) = lookup("TIMELINE_NAMESPACE") {
            crate::keys::validate_namespace(&ns)?;
            config.namespace = ns;
        }
        if let Some(secs) = lookup("TIMELINE_SWEEP_SECS") {
            let secs: u64 = secs.parse().map_err(|e| {
                TimelineError::Config(format!("TIMELINE_SWEEP_SECS={secs:?}: {e}"))
            })?;
            if secs == 0 {
                return Err(TimelineError::Config(
                    "TIMELINE_SWEEP_SECS must be positive".into(),
                ));
            }
            config.sweep_period = Duration::from_secs(secs);
        }

        Ok(config)
    }
}

//! Key layout shared with every existing deployment:
//!
//!   `<namespace>:raw:<sensor>:<interval_id>`
//!   `<namespace>:data:<sensor>:<interval_id>`

use crate::error::{Result, TimelineError};

pub const DEFAULT_NAMESPACE: &str = "timeline";

const RAW: &str = "raw";
const DATA: &str = "data";

/// Characters that would let a key pattern leak into another sensor.
const FORBIDDEN: &[char] = &[':', '*', '?', '[', ']', '\\'];

/// Builds and parses the keys owned by one sensor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyspace {
    raw_prefix: String,
    data_prefix: String,
}

impl Keyspace {
    pub fn new(namespace: &str, sensor: &str) -> Result<Self> {
        validate_namespace(namespace)?;
        validate_name(sensor)?;
        Ok(Self {
            raw_prefix: format!("{namespace}:{RAW}:{sensor}:"),
            data_prefix: format!("{namespace}:{DATA}:{sensor}:"),
        })
    }

    pub fn raw_key(&self, interval_id: i64) -> String {
        format!("{}{interval_id}", self.raw_prefix)
    }

    pub fn data_key(&self, interval_id: i64) -> String {
        format!("{}{interval_id}", self.data_prefix)
    }

    pub fn raw_pattern(&self) -> String {
        format!("{}*", self.raw_prefix)
    }

    pub fn data_pattern(&self) -> String {
        format!("{}*", self.data_prefix)
    }

    /// Interval id of a raw key, or `None` if the key is not one of ours.
    pub fn parse_raw(&self, key: &str) -> Option<i64> {
        key.strip_prefix(&self.raw_prefix)?.parse().ok()
    }

    /// Interval id of a summarized key, or `None` if the key is not one of ours.
    pub fn parse_data(&self, key: &str) -> Option<i64> {
        key.strip_prefix(&self.data_prefix)?.parse().ok()
    }
}

fn plain_word_violation(word: &str) -> Option<&'static str> {
    if word.is_empty() {
        Some("must not be empty")
    } else if word.contains(char::is_whitespace) {
        Some("must not contain whitespace")
    } else if word.contains(FORBIDDEN) {
        Some("must not contain ':' or glob characters")
    } else {
        None
    }
}

/// The namespace prefixes every pattern, so it follows the same rules as a
/// sensor name.
pub fn validate_namespace(namespace: &str) -> Result<()> {
    match plain_word_violation(namespace) {
        Some(reason) => Err(TimelineError::Config(format!(
            "namespace {namespace:?} {reason}"
        ))),
        None => Ok(()),
    }
}

/// Sensor names are embedded in glob patterns, so they must be plain words.
pub fn validate_name(name: &str) -> Result<()> {
    let Some(reason) = plain_word_violation(name) else {
        return Ok(());
    };
    Err(TimelineError::InvalidSensorName {
        name: name.to_owned(),
        reason: reason.into(),
    })
}

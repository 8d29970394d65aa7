//! Aggregation strategies: how events land in a raw bucket and how a raw
//! bucket is summarized into the single value kept per interval.
//!
//! Several producers may write into the same bucket without coordination,
//! so `combine` must be order-insensitive. Every built-in strategy either
//! adds into a float counter or appends to a sample list.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::store::Batch;

/// Physical shape of a raw bucket in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawLayout {
    /// A float counter maintained with `INCRBYFLOAT`
    Scalar,
    /// A list of samples appended with `RPUSH`
    Samples,
}

/// Decoded contents of a raw bucket.
#[derive(Debug, Clone, PartialEq)]
pub enum RawBucket {
    Scalar(f64),
    Samples(Vec<f64>),
}

/// Strategy injected into a sensor.
pub trait Aggregator: Send + Sync + fmt::Debug {
    fn kind(&self) -> AggregatorKind;

    fn layout(&self) -> RawLayout;

    /// Queue the commands that fold `value` into the bucket at `raw_key`.
    fn combine(&self, batch: &mut Batch, raw_key: &str, value: f64);

    /// Final value of a bucket, or `None` if the bucket does not have the
    /// shape this strategy writes.
    fn summarize(&self, raw: &RawBucket) -> Option<f64>;
}

// ─── Built-in strategies ─────────────────────────────────────────

/// Total of all event values.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sum;

/// Number of events, ignoring their values.
#[derive(Debug, Clone, Copy, Default)]
pub struct Count;

#[derive(Debug, Clone, Copy, Default)]
pub struct Min;

#[derive(Debug, Clone, Copy, Default)]
pub struct Max;

/// Arithmetic mean of the event values.
#[derive(Debug, Clone, Copy, Default)]
pub struct Mean;

impl Aggregator for Sum {
    fn kind(&self) -> AggregatorKind {
        AggregatorKind::Sum
    }

    fn layout(&self) -> RawLayout {
        RawLayout::Scalar
    }

    fn combine(&self, batch: &mut Batch, raw_key: &str, value: f64) {
        batch.incr_by_float(raw_key, value);
    }

    fn summarize(&self, raw: &RawBucket) -> Option<f64> {
        match raw {
            RawBucket::Scalar(total) => Some(*total),
            RawBucket::Samples(_) => None,
        }
    }
}

impl Aggregator for Count {
    fn kind(&self) -> AggregatorKind {
        AggregatorKind::Count
    }

    fn layout(&self) -> RawLayout {
        RawLayout::Scalar
    }

    fn combine(&self, batch: &mut Batch, raw_key: &str, _value: f64) {
        batch.incr_by_float(raw_key, 1.0);
    }

    fn summarize(&self, raw: &RawBucket) -> Option<f64> {
        match raw {
            RawBucket::Scalar(n) => Some(*n),
            RawBucket::Samples(_) => None,
        }
    }
}

fn samples(raw: &RawBucket) -> Option<&[f64]> {
    match raw {
        RawBucket::Samples(v) if !v.is_empty() => Some(v.as_slice()),
        _ => None,
    }
}

fn push_sample(batch: &mut Batch, raw_key: &str, value: f64) {
    batch.push(raw_key, value.to_string());
}

impl Aggregator for Min {
    fn kind(&self) -> AggregatorKind {
        AggregatorKind::Min
    }

    fn layout(&self) -> RawLayout {
        RawLayout::Samples
    }

    fn combine(&self, batch: &mut Batch, raw_key: &str, value: f64) {
        push_sample(batch, raw_key, value);
    }

    fn summarize(&self, raw: &RawBucket) -> Option<f64> {
        samples(raw).map(|v| v.iter().copied().fold(f64::INFINITY, f64::min))
    }
}

impl Aggregator for Max {
    fn kind(&self) -> AggregatorKind {
        AggregatorKind::Max
    }

    fn layout(&self) -> RawLayout {
        RawLayout::Samples
    }

    fn combine(&self, batch: &mut Batch, raw_key: &str, value: f64) {
        push_sample(batch, raw_key, value);
    }

    fn summarize(&self, raw: &RawBucket) -> Option<f64> {
        samples(raw).map(|v| v.iter().copied().fold(f64::NEG_INFINITY, f64::max))
    }
}

impl Aggregator for Mean {
    fn kind(&self) -> AggregatorKind {
        AggregatorKind::Mean
    }

    fn layout(&self) -> RawLayout {
        RawLayout::Samples
    }

    fn combine(&self, batch: &mut Batch, raw_key: &str, value: f64) {
        push_sample(batch, raw_key, value);
    }

    fn summarize(&self, raw: &RawBucket) -> Option<f64> {
        samples(raw).map(|v| v.iter().sum::<f64>() / v.len() as f64)
    }
}

// ─── Selection by name ───────────────────────────────────────────

/// Names a built-in strategy, e.g. in a registration request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregatorKind {
    Sum,
    Count,
    Min,
    Max,
    Mean,
}

impl AggregatorKind {
    pub fn build(self) -> Arc<dyn Aggregator> {
        match self {
            Self::Sum => Arc::new(Sum),
            Self::Count => Arc::new(Count),
            Self::Min => Arc::new(Min),
            Self::Max => Arc::new(Max),
            Self::Mean => Arc::new(Mean),
        }
    }
}

impl fmt::Display for AggregatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Sum => "sum",
            Self::Count => "count",
            Self::Min => "min",
            Self::Max => "max",
            Self::Mean => "mean",
        };
        f.write_str(name)
    }
}

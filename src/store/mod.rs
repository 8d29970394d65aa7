//! TTL-capable key-value store used by every sensor.
//!
//! `RedisStore` talks to a real server; `MemoryStore` keeps everything in
//! process and is what the tests run against.

pub mod memory;
pub mod redis_client;

use async_trait::async_trait;

use crate::error::Result;

pub use self::memory::MemoryStore;
pub use self::redis_client::RedisStore;

/// One mutation inside an atomic batch.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Set { key: String, value: String },
    Delete { keys: Vec<String> },
    Expire { key: String, seconds: u64 },
    /// Add to a float counter, creating it at zero
    IncrByFloat { key: String, delta: f64 },
    /// Append to a list, creating it empty
    Push { key: String, value: String },
}

/// An ordered command sequence executed all-or-nothing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    commands: Vec<Command>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.commands.push(Command::Set {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    pub fn delete(&mut self, keys: Vec<String>) -> &mut Self {
        if !keys.is_empty() {
            self.commands.push(Command::Delete { keys });
        }
        self
    }

    pub fn expire(&mut self, key: impl Into<String>, seconds: u64) -> &mut Self {
        self.commands.push(Command::Expire {
            key: key.into(),
            seconds,
        });
        self
    }

    pub fn incr_by_float(&mut self, key: impl Into<String>, delta: f64) -> &mut Self {
        self.commands.push(Command::IncrByFloat {
            key: key.into(),
            delta,
        });
        self
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.commands.push(Command::Push {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn into_commands(self) -> Vec<Command> {
        self.commands
    }
}

/// Capabilities a sensor needs from its backing store.
///
/// Implementations must keep `mget` order-preserving and run `atomic`
/// batches all-or-nothing. Failures surface as `TimelineError::Store`.
#[async_trait]
pub trait Store: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove `keys`, returning how many existed.
    async fn delete(&self, keys: &[String]) -> Result<u64>;

    async fn exists(&self, key: &str) -> Result<bool>;

    /// Set a TTL on an existing key; `false` if the key is absent.
    async fn expire(&self, key: &str, seconds: u64) -> Result<bool>;

    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<String>>>;

    /// Glob-style key listing (`*` and `?`).
    async fn keys(&self, pattern: &str) -> Result<Vec<String>>;

    /// All elements of a list key, empty when absent.
    async fn members(&self, key: &str) -> Result<Vec<String>>;

    async fn atomic(&self, batch: Batch) -> Result<()>;
}

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{Batch, Command, Store};
use crate::clock::{Clock, SystemClock};
use crate::error::{Result, TimelineError};

/// In-process store with Redis-like semantics, including TTL expiry
/// driven by an injectable clock. Batches apply to a copy of the map and
/// are swapped in only when every command succeeded.
pub struct MemoryStore {
    inner: Mutex<HashMap<String, Entry>>,
    clock: Arc<dyn Clock>,
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    /// Unix second at which the key disappears
    expires_at: Option<i64>,
}

#[derive(Debug, Clone)]
enum Value {
    Str(String),
    List(Vec<String>),
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Remaining lifetime of `key` in seconds; `None` when absent or
    /// persistent.
    pub fn ttl(&self, key: &str) -> Option<u64> {
        let now = self.clock.now();
        let mut map = self.inner.lock();
        purge(&mut map, now);
        let expires_at = map.get(key)?.expires_at?;
        Some((expires_at - now).max(0) as u64)
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        let now = self.clock.now();
        let mut map = self.inner.lock();
        purge(&mut map, now);
        map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run `f` against the live map after dropping expired keys.
    fn with_live<T>(&self, f: impl FnOnce(&mut HashMap<String, Entry>, i64) -> T) -> T {
        let now = self.clock.now();
        let mut map = self.inner.lock();
        purge(&mut map, now);
        f(&mut map, now)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn purge(map: &mut HashMap<String, Entry>, now: i64) {
    map.retain(|_, e| e.expires_at.map_or(true, |at| at > now));
}

fn wrong_type(key: &str) -> TimelineError {
    TimelineError::Store(format!(
        "WRONGTYPE operation against key {key} holding the wrong kind of value"
    ))
}

fn apply(map: &mut HashMap<String, Entry>, now: i64, command: Command) -> Result<()> {
    match command {
        Command::Set { key, value } => {
            map.insert(
                key,
                Entry {
                    value: Value::Str(value),
                    expires_at: None,
                },
            );
        }
        Command::Delete { keys } => {
            for key in keys {
                map.remove(&key);
            }
        }
        Command::Expire { key, seconds } => {
            if let Some(entry) = map.get_mut(&key) {
                entry.expires_at = Some(now.saturating_add(seconds as i64));
            }
        }
        Command::IncrByFloat { key, delta } => {
            let entry = map.entry(key.clone()).or_insert_with(|| Entry {
                value: Value::Str("0".into()),
                expires_at: None,
            });
            let Value::Str(current) = &entry.value else {
                return Err(wrong_type(&key));
            };
            let current: f64 = current.parse().map_err(|_| {
                TimelineError::Store(format!("value at {key} is not a valid float"))
            })?;
            entry.value = Value::Str((current + delta).to_string());
        }
        Command::Push { key, value } => {
            let entry = map.entry(key.clone()).or_insert_with(|| Entry {
                value: Value::List(Vec::new()),
                expires_at: None,
            });
            let Value::List(items) = &mut entry.value else {
                return Err(wrong_type(&key));
            };
            items.push(value);
        }
    }
    Ok(())
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.with_live(|map, _| match map.get(key) {
            None => Ok(None),
            Some(Entry {
                value: Value::Str(s),
                ..
            }) => Ok(Some(s.clone())),
            Some(_) => Err(wrong_type(key)),
        })
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.with_live(|map, now| {
            apply(
                map,
                now,
                Command::Set {
                    key: key.to_owned(),
                    value: value.to_owned(),
                },
            )
        })
    }

    async fn delete(&self, keys: &[String]) -> Result<u64> {
        Ok(self.with_live(|map, _| {
            keys.iter().filter(|k| map.remove(k.as_str()).is_some()).count() as u64
        }))
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.with_live(|map, _| map.contains_key(key)))
    }

    async fn expire(&self, key: &str, seconds: u64) -> Result<bool> {
        Ok(self.with_live(|map, now| match map.get_mut(key) {
            Some(entry) => {
                entry.expires_at = Some(now.saturating_add(seconds as i64));
                true
            }
            None => false,
        }))
    }

    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<String>>> {
        // MGET reports non-string keys as nil rather than failing.
        Ok(self.with_live(|map, _| {
            keys.iter()
                .map(|k| match map.get(k) {
                    Some(Entry {
                        value: Value::Str(s),
                        ..
                    }) => Some(s.clone()),
                    _ => None,
                })
                .collect()
        }))
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        Ok(self.with_live(|map, _| {
            let mut keys: Vec<String> = map
                .keys()
                .filter(|k| glob_match(pattern, k))
                .cloned()
                .collect();
            keys.sort();
            keys
        }))
    }

    async fn members(&self, key: &str) -> Result<Vec<String>> {
        self.with_live(|map, _| match map.get(key) {
            None => Ok(Vec::new()),
            Some(Entry {
                value: Value::List(items),
                ..
            }) => Ok(items.clone()),
            Some(_) => Err(wrong_type(key)),
        })
    }

    async fn atomic(&self, batch: Batch) -> Result<()> {
        self.with_live(|map, now| {
            let mut staged = map.clone();
            for command in batch.into_commands() {
                apply(&mut staged, now, command)?;
            }
            *map = staged;
            Ok(())
        })
    }
}

/// Glob match supporting `*` (any run) and `?` (any one character).
pub(crate) fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ti));
            pi += 1;
        } else if let Some((sp, st)) = star {
            // Let the last star swallow one more character.
            pi = sp + 1;
            ti = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }
    p[pi..].iter().all(|&c| c == '*')
}

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::info;

use super::{Batch, Command, Store};
use crate::error::Result;

/// Redis-backed store.
///
/// `ConnectionManager` is cheaply cloneable: every clone shares the same
/// multiplexed TCP connection and reconnects on failure.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        info!(url, "connected to redis");
        Ok(Self { conn })
    }

    pub fn from_manager(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl Store for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        Ok(conn.get(key).await?)
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.set(key, value).await?;
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> Result<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn.clone();
        Ok(conn.del(keys).await?)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        Ok(conn.exists(key).await?)
    }

    async fn expire(&self, key: &str, seconds: u64) -> Result<bool> {
        let mut conn = self.conn.clone();
        let set: bool = redis::cmd("EXPIRE")
            .arg(key)
            .arg(seconds)
            .query_async(&mut conn)
            .await?;
        Ok(set)
    }

    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<String>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        // Explicit MGET: a single-key GET would not come back as an array.
        let mut conn = self.conn.clone();
        let values: Vec<Option<String>> =
            redis::cmd("MGET").arg(keys).query_async(&mut conn).await?;
        Ok(values)
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        Ok(conn.keys(pattern).await?)
    }

    async fn members(&self, key: &str) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        let items: Vec<String> = redis::cmd("LRANGE")
            .arg(key)
            .arg(0)
            .arg(-1)
            .query_async(&mut conn)
            .await?;
        Ok(items)
    }

    async fn atomic(&self, batch: Batch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        // MULTI … EXEC
        let mut pipe = redis::pipe();
        pipe.atomic();
        for command in batch.into_commands() {
            match command {
                Command::Set { key, value } => {
                    pipe.cmd("SET").arg(key).arg(value).ignore();
                }
                Command::Delete { keys } => {
                    pipe.cmd("DEL").arg(keys).ignore();
                }
                Command::Expire { key, seconds } => {
                    pipe.cmd("EXPIRE").arg(key).arg(seconds).ignore();
                }
                Command::IncrByFloat { key, delta } => {
                    pipe.cmd("INCRBYFLOAT").arg(key).arg(delta).ignore();
                }
                Command::Push { key, value } => {
                    pipe.cmd("RPUSH").arg(key).arg(value).ignore();
                }
            }
        }

        let mut conn = self.conn.clone();
        let _: () = pipe.query_async(&mut conn).await?;
        Ok(())
    }
}

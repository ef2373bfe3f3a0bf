//! Key-value cache seam and its Redis implementation.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::info;

use crate::error::{DataError, DataResult};

/// A TTL-capable key-value cache.
///
/// A missing key is `Ok(None)`, never an error; everything else maps to
/// [`DataError::CacheUnavailable`].
#[async_trait]
pub trait Cache: Send + Sync {
    /// Look up a value. Returns `None` when the key is absent or expired.
    async fn get(&self, key: &str) -> DataResult<Option<String>>;

    /// Store a value that disappears after `ttl`.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> DataResult<()>;

    /// Remove a key. Removing an absent key is not an error.
    async fn del(&self, key: &str) -> DataResult<()>;
}

/// Redis-backed [`Cache`].
///
/// Wraps a `ConnectionManager`, which transparently reconnects on
/// connection failures.
#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
}

impl RedisCache {
    /// Connect to Redis and verify the connection with a PING.
    pub async fn connect(url: &str) -> DataResult<Self> {
        info!(url = %url, "Connecting to cache...");

        let client =
            redis::Client::open(url).map_err(|e| DataError::CacheUnavailable(e.to_string()))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| DataError::CacheUnavailable(e.to_string()))?;

        let mut ping_conn = conn.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut ping_conn)
            .await
            .map_err(|e| DataError::CacheUnavailable(e.to_string()))?;

        info!("Successfully connected to cache");
        Ok(Self { conn })
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &str) -> DataResult<Option<String>> {
        let mut conn = self.conn.clone();
        conn.get(key)
            .await
            .map_err(|e| DataError::CacheUnavailable(e.to_string()))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> DataResult<()> {
        let mut conn = self.conn.clone();
        conn.set_ex(key, value, ttl.as_secs())
            .await
            .map_err(|e| DataError::CacheUnavailable(e.to_string()))
    }

    async fn del(&self, key: &str) -> DataResult<()> {
        let mut conn = self.conn.clone();
        conn.del(key)
            .await
            .map_err(|e| DataError::CacheUnavailable(e.to_string()))
    }
}

//! Cache layer: injected store trait and backends

use crate::config::RedisConfig;
use crate::error::Result;
use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands};
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;

pub mod keys;
pub mod memory;

pub use keys::CacheKey;
pub use memory::MemoryCacheStore;

/// Injected cache backend: string keys, JSON string values.
///
/// Single-key operations are assumed atomic by the backend. `forget_prefix`
/// requires key enumeration; a backend without it returns an error, which
/// callers log at warning level and swallow. Stale entries then age out by
/// TTL instead.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;
    async fn forget(&self, key: &str) -> Result<()>;
    /// Remove every key starting with `prefix`, returning the count removed
    async fn forget_prefix(&self, prefix: &str) -> Result<u64>;
}

/// Redis-backed store used in production
#[derive(Clone)]
pub struct RedisCacheStore {
    conn: ConnectionManager,
}

impl RedisCacheStore {
    pub async fn new(config: &RedisConfig) -> Result<Self> {
        let client = redis::Client::open(config.url.as_str())?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        Ok(conn.get(key).await?)
    }

    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.set_ex(key, value, ttl.as_secs()).await?;
        Ok(())
    }

    async fn forget(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(key).await?;
        Ok(())
    }

    async fn forget_prefix(&self, prefix: &str) -> Result<u64> {
        let mut conn = self.conn.clone();
        let keys: Vec<String> = redis::cmd("KEYS")
            .arg(format!("{prefix}*"))
            .query_async(&mut conn)
            .await?;

        let removed = keys.len() as u64;
        if !keys.is_empty() {
            conn.del::<_, ()>(keys).await?;
        }
        Ok(removed)
    }
}

/// Cache read that never fails the caller: backend or decode errors are
/// logged and treated as a miss.
pub(crate) async fn read_json<S: CacheStore, T: DeserializeOwned>(
    store: &S,
    key: &CacheKey,
) -> Option<T> {
    let key = key.render();
    match store.get(&key).await {
        Ok(Some(raw)) => match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "discarding undecodable cache entry");
                None
            }
        },
        Ok(None) => None,
        Err(e) => {
            tracing::warn!(key = %key, error = %e, "cache read failed, falling back to source");
            None
        }
    }
}

/// Cache write that never fails the caller
pub(crate) async fn write_json<S: CacheStore, T: Serialize>(
    store: &S,
    key: &CacheKey,
    value: &T,
    ttl: Duration,
) {
    let key = key.render();
    match serde_json::to_string(value) {
        Ok(raw) => {
            if let Err(e) = store.put(&key, &raw, ttl).await {
                tracing::warn!(key = %key, error = %e, "cache write failed");
            }
        }
        Err(e) => tracing::warn!(key = %key, error = %e, "cache serialize failed"),
    }
}

/// Single-key invalidation that never fails the caller
pub(crate) async fn forget_key<S: CacheStore>(store: &S, key: &CacheKey) {
    let key = key.render();
    if let Err(e) = store.forget(&key).await {
        tracing::warn!(key = %key, error = %e, "cache invalidation failed");
    }
}

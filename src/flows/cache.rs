//! Volatile copy of active blocks.
//!
//! Values are serialized `BlockRecord`s that expire at their unblock time.
//! Nothing here is authoritative; checks always ask the store and only use
//! these entries to find stale ones to evict.

use async_trait::async_trait;
use redis::{AsyncCommands, aio::ConnectionManager};
use tracing::{Instrument, info_span};

use super::error::CacheError;

#[async_trait]
pub trait BlockCache: Send + Sync {
    async fn put(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<(), CacheError>;

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn delete(&self, keys: &[String]) -> Result<(), CacheError>;

    /// `"ok"`, `"error"` or `"disabled"` for `/health`.
    async fn status(&self) -> &'static str;
}

/// Used when no Redis URL is configured; every lookup is a miss.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledBlockCache;

#[async_trait]
impl BlockCache for DisabledBlockCache {
    async fn put(&self, _key: &str, _value: &str, _ttl_seconds: u64) -> Result<(), CacheError> {
        Ok(())
    }

    async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
        Ok(None)
    }

    async fn delete(&self, _keys: &[String]) -> Result<(), CacheError> {
        Ok(())
    }

    async fn status(&self) -> &'static str {
        "disabled"
    }
}

#[derive(Clone)]
pub struct RedisBlockCache {
    // ConnectionManager reconnects on its own and is cheap to clone per command.
    connection: ConnectionManager,
}

impl std::fmt::Debug for RedisBlockCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisBlockCache").finish_non_exhaustive()
    }
}

impl RedisBlockCache {
    /// Connect to Redis.
    ///
    /// # Errors
    /// Returns an error if the URL is invalid or the first connection fails.
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(url)?;
        let connection = ConnectionManager::new(client).await?;
        Ok(Self { connection })
    }
}

#[async_trait]
impl BlockCache for RedisBlockCache {
    async fn put(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<(), CacheError> {
        let span = info_span!(
            "cache.command",
            cache.system = "redis",
            cache.operation = "SET"
        );
        let mut connection = self.connection.clone();
        let () = connection
            .set_ex(key, value, ttl_seconds)
            .instrument(span)
            .await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let span = info_span!(
            "cache.command",
            cache.system = "redis",
            cache.operation = "GET"
        );
        let mut connection = self.connection.clone();
        let value: Option<String> = connection.get(key).instrument(span).await?;
        Ok(value)
    }

    async fn delete(&self, keys: &[String]) -> Result<(), CacheError> {
        if keys.is_empty() {
            return Ok(());
        }
        let span = info_span!(
            "cache.command",
            cache.system = "redis",
            cache.operation = "DEL"
        );
        let mut connection = self.connection.clone();
        let _removed: i64 = connection.del(keys.to_vec()).instrument(span).await?;
        Ok(())
    }

    async fn status(&self) -> &'static str {
        let mut connection = self.connection.clone();
        let pong: Result<String, _> = redis::cmd("PING").query_async(&mut connection).await;
        if pong.is_ok() {
            "ok"
        } else {
            "error"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_cache_always_misses() -> Result<(), CacheError> {
        let cache = DisabledBlockCache;
        cache.put("block:t1:a:signin", "{}", 10).await?;
        assert_eq!(cache.get("block:t1:a:signin").await?, None);
        cache.delete(&["block:t1:a:signin".to_string()]).await?;
        assert_eq!(cache.status().await, "disabled");
        Ok(())
    }

    #[tokio::test]
    async fn invalid_redis_url_is_rejected() {
        let result = RedisBlockCache::connect("not a url").await;
        assert!(matches!(result, Err(CacheError::Redis(_))));
    }
}

//! Fast key-value cache used in front of the relational store.
//!
//! The cache is an accelerator, never a source of truth. Every call may fail
//! (connection refused, timeout) and callers are expected to treat a
//! [`CacheError`] as "cache unavailable" rather than as an operation failure.
//!
//! Two backends are provided:
//!
//! - [`RedisFastCache`]: Redis via `fred`, every command bounded by a timeout
//! - [`MemoryCache`]: in-process map for tests and single-node setups, with a
//!   switch that makes every call fail

use async_trait::async_trait;
use fred::clients::Client as RedisClient;
use fred::interfaces::{ClientLike, KeysInterface, LuaInterface};
use fred::types::Expiration;
use fred::types::config::Config as FredConfig;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info};

use crate::config::RedisConfig;

/// Adjusts a counter only when it already exists.
///
/// A missing key stays missing so the next read recounts from the store.
/// A result below zero deletes the key for the same reason.
const ADJUST_EXISTING_SCRIPT: &str = r"
if redis.call('EXISTS', KEYS[1]) == 0 then
    return nil
end
local value = redis.call('INCRBY', KEYS[1], ARGV[1])
if value < 0 then
    redis.call('DEL', KEYS[1])
    return nil
end
return value
";

/// Cache error type.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Redis operation failed.
    #[error("Redis error: {0}")]
    Redis(String),

    /// The command did not complete in time.
    #[error("Cache command timed out after {0:?}")]
    Timeout(Duration),

    /// The cache was switched off or is unreachable.
    #[error("Cache unavailable")]
    Unavailable,

    /// A stored value could not be interpreted.
    #[error("Malformed cache value: {0}")]
    Malformed(String),
}

/// Minimal key-value contract the relationship caches rely on.
#[async_trait]
pub trait FastCache: Send + Sync {
    /// Read a raw value.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Overwrite a value.
    async fn set(&self, key: &str, value: &str) -> Result<(), CacheError>;

    /// Increment an existing counter. Returns `None` when the key is absent.
    async fn incr(&self, key: &str) -> Result<Option<i64>, CacheError>;

    /// Decrement an existing counter. Returns `None` when the key is absent
    /// or the counter would drop below zero (the key is then removed).
    async fn decr(&self, key: &str) -> Result<Option<i64>, CacheError>;

    /// Remove a value.
    async fn remove(&self, key: &str) -> Result<(), CacheError>;

    /// Check that the backend answers.
    async fn ping(&self) -> Result<(), CacheError>;
}

/// Shared handle to a cache backend.
pub type FastCacheService = Arc<dyn FastCache>;

/// Redis-backed [`FastCache`].
#[derive(Clone)]
pub struct RedisFastCache {
    redis: Arc<RedisClient>,
    prefix: String,
    command_timeout: Duration,
    ttl_secs: i64,
}

impl RedisFastCache {
    /// Wrap an already connected client.
    #[must_use]
    pub fn new(redis: Arc<RedisClient>, config: &RedisConfig) -> Self {
        Self {
            redis,
            prefix: config.prefix.clone(),
            command_timeout: config.command_timeout(),
            ttl_secs: config.entry_ttl_secs,
        }
    }

    /// Connect to Redis, giving up after the configured connect timeout.
    pub async fn connect(config: &RedisConfig) -> Result<Self, CacheError> {
        let fred_config =
            FredConfig::from_url(&config.url).map_err(|e| CacheError::Redis(e.to_string()))?;
        let client = RedisClient::new(fred_config, None, None, None);

        match tokio::time::timeout(config.connect_timeout(), client.init()).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(CacheError::Redis(e.to_string())),
            Err(_) => return Err(CacheError::Timeout(config.connect_timeout())),
        }

        info!(prefix = %config.prefix, "Connected to Redis cache");
        Ok(Self::new(Arc::new(client), config))
    }

    /// Namespaced key.
    fn key(&self, key: &str) -> String {
        format!("{}:{key}", self.prefix)
    }

    fn expiration(&self) -> Option<Expiration> {
        (self.ttl_secs > 0).then_some(Expiration::EX(self.ttl_secs))
    }

    async fn bounded<T, F>(&self, command: F) -> Result<T, CacheError>
    where
        F: Future<Output = Result<T, fred::error::Error>>,
    {
        match tokio::time::timeout(self.command_timeout, command).await {
            Ok(result) => result.map_err(|e| CacheError::Redis(e.to_string())),
            Err(_) => Err(CacheError::Timeout(self.command_timeout)),
        }
    }

    async fn adjust(&self, key: &str, delta: i64) -> Result<Option<i64>, CacheError> {
        let value: Option<i64> = self
            .bounded(self.redis.eval::<Option<i64>, _, _, _>(
                ADJUST_EXISTING_SCRIPT,
                vec![self.key(key)],
                vec![delta],
            ))
            .await?;

        debug!(key = %key, delta = delta, value = ?value, "Adjusted cached counter");
        Ok(value)
    }
}

#[async_trait]
impl FastCache for RedisFastCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.bounded(self.redis.get::<Option<String>, _>(self.key(key)))
            .await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        self.bounded(self.redis.set::<(), _, _>(
            self.key(key),
            value,
            self.expiration(),
            None,
            false,
        ))
        .await
    }

    async fn incr(&self, key: &str) -> Result<Option<i64>, CacheError> {
        self.adjust(key, 1).await
    }

    async fn decr(&self, key: &str) -> Result<Option<i64>, CacheError> {
        self.adjust(key, -1).await
    }

    async fn remove(&self, key: &str) -> Result<(), CacheError> {
        self.bounded(self.redis.del::<i64, _>(self.key(key)))
            .await
            .map(|_| ())
    }

    async fn ping(&self) -> Result<(), CacheError> {
        self.bounded(self.redis.exists::<i64, _>(self.key("ping")))
            .await
            .map(|_| ())
    }
}

/// In-process [`FastCache`].
///
/// Mirrors the Redis semantics the services depend on, including the
/// existing-key-only counter adjustments. [`MemoryCache::set_failing`] makes
/// every call return [`CacheError::Unavailable`], and
/// [`MemoryCache::set_failing_adjustments`] fails only `incr` and `decr`.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, String>>,
    failing: AtomicBool,
    failing_adjustments: AtomicBool,
}

impl MemoryCache {
    /// Create an empty, healthy cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a cache that fails every call.
    #[must_use]
    pub fn unavailable() -> Self {
        let cache = Self::default();
        cache.set_failing(true);
        cache
    }

    /// Switch failure mode on or off.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Make counter adjustments time out while every other call succeeds.
    pub fn set_failing_adjustments(&self, failing: bool) {
        self.failing_adjustments.store(failing, Ordering::SeqCst);
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries().clear();
    }

    /// Raw value for `key`, bypassing failure mode.
    #[must_use]
    pub fn peek(&self, key: &str) -> Option<String> {
        self.entries().get(key).cloned()
    }

    /// Number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    /// Whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check(&self) -> Result<(), CacheError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(CacheError::Unavailable)
        } else {
            Ok(())
        }
    }

    fn adjust(&self, key: &str, delta: i64) -> Result<Option<i64>, CacheError> {
        self.check()?;
        if self.failing_adjustments.load(Ordering::SeqCst) {
            return Err(CacheError::Timeout(Duration::ZERO));
        }
        let mut entries = self.entries();
        let Some(raw) = entries.get(key) else {
            return Ok(None);
        };
        let current: i64 = raw
            .parse()
            .map_err(|_| CacheError::Malformed(format!("{key} is not an integer")))?;
        let value = current + delta;
        if value < 0 {
            entries.remove(key);
            return Ok(None);
        }
        entries.insert(key.to_string(), value.to_string());
        Ok(Some(value))
    }
}

#[async_trait]
impl FastCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.check()?;
        Ok(self.peek(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        self.check()?;
        self.entries().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn incr(&self, key: &str) -> Result<Option<i64>, CacheError> {
        self.adjust(key, 1)
    }

    async fn decr(&self, key: &str) -> Result<Option<i64>, CacheError> {
        self.adjust(key, -1)
    }

    async fn remove(&self, key: &str) -> Result<(), CacheError> {
        self.check()?;
        self.entries().remove(key);
        Ok(())
    }

    async fn ping(&self) -> Result<(), CacheError> {
        self.check()
    }
}

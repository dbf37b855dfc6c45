//! Read-through caching over a [`plaza_common::FastCache`].
//!
//! [`CacheLayer`] is the only place that sees a [`plaza_common::CacheError`].
//! Every cache failure is logged and then treated as a miss or a no-op, so the
//! outcome of an operation is always decided by the store. Store errors come
//! from the loaders and are propagated unchanged.

use plaza_common::{AppResult, FastCacheService};
use std::future::Future;
use tracing::{debug, warn};

/// Cache keys, before the backend namespace prefix is applied.
pub mod keys {
    /// Number of likes on a post.
    #[must_use]
    pub fn like_count(post_id: &str) -> String {
        format!("like_count:{post_id}")
    }

    /// Whether a user likes a post.
    #[must_use]
    pub fn user_likes(user_id: &str, post_id: &str) -> String {
        format!("like_users:{post_id}:{user_id}")
    }

    /// Whether `from_id` follows `to_id`.
    #[must_use]
    pub fn follows(from_id: &str, to_id: &str) -> String {
        format!("follows:{from_id}:{to_id}")
    }

    /// Number of comments on a post.
    #[must_use]
    pub fn comment_count(post_id: &str) -> String {
        format!("comment_count:{post_id}")
    }
}

/// Stored in place of a relationship id once the store said "no such row".
///
/// Ids are ULIDs and never contain `!`.
const ABSENT_SENTINEL: &str = "!absent";

/// Conversion between a value and its cached string form.
pub trait CacheCodec: Sized {
    /// Encode for storage.
    fn encode(&self) -> String;

    /// Decode a stored value. `None` means the entry is unusable.
    fn decode(raw: &str) -> Option<Self>;
}

impl CacheCodec for u64 {
    fn encode(&self) -> String {
        self.to_string()
    }

    fn decode(raw: &str) -> Option<Self> {
        raw.trim().parse().ok()
    }
}

/// Cached existence of a relationship.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Relation {
    /// The relationship exists with this id.
    Present(String),
    /// The store was checked and no relationship exists.
    Absent,
}

impl Relation {
    /// The relationship id, if present.
    #[must_use]
    pub fn into_id(self) -> Option<String> {
        match self {
            Self::Present(id) => Some(id),
            Self::Absent => None,
        }
    }
}

impl From<Option<String>> for Relation {
    fn from(id: Option<String>) -> Self {
        id.map_or(Self::Absent, Self::Present)
    }
}

impl CacheCodec for Relation {
    fn encode(&self) -> String {
        match self {
            Self::Present(id) => id.clone(),
            Self::Absent => ABSENT_SENTINEL.to_string(),
        }
    }

    fn decode(raw: &str) -> Option<Self> {
        match raw {
            "" => None,
            ABSENT_SENTINEL => Some(Self::Absent),
            id => Some(Self::Present(id.to_string())),
        }
    }
}

/// Result of a single cache read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup<T> {
    /// A usable entry.
    Hit(T),
    /// No entry, or one that could not be decoded.
    Miss,
    /// The cache could not be reached.
    Unavailable,
}

/// Best-effort cache in front of the store.
#[derive(Clone, Default)]
pub struct CacheLayer {
    cache: Option<FastCacheService>,
}

impl CacheLayer {
    /// Create a cache layer over a backend.
    #[must_use]
    pub fn new(cache: FastCacheService) -> Self {
        Self { cache: Some(cache) }
    }

    /// Create a cache layer that always reads the store and never writes.
    #[must_use]
    pub const fn disabled() -> Self {
        Self { cache: None }
    }

    /// Whether a backend is attached.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.cache.is_some()
    }

    /// Read and decode a single entry.
    pub async fn lookup<T: CacheCodec>(&self, key: &str) -> CacheLookup<T> {
        let Some(cache) = &self.cache else {
            return CacheLookup::Miss;
        };

        match cache.get(key).await {
            Ok(Some(raw)) => match T::decode(&raw) {
                Some(value) => CacheLookup::Hit(value),
                None => {
                    warn!(key = %key, raw = %raw, "Discarding undecodable cache entry");
                    CacheLookup::Miss
                }
            },
            Ok(None) => CacheLookup::Miss,
            Err(e) => {
                warn!(key = %key, error = %e, "Cache read failed, falling back to store");
                CacheLookup::Unavailable
            }
        }
    }

    /// Return the cached value, or load it from the store and cache it.
    pub async fn read_through<T, F, Fut>(&self, key: &str, loader: F) -> AppResult<T>
    where
        T: CacheCodec,
        F: FnOnce() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        match self.lookup::<T>(key).await {
            CacheLookup::Hit(value) => {
                debug!(key = %key, "Cache hit");
                return Ok(value);
            }
            CacheLookup::Miss => debug!(key = %key, "Cache miss"),
            CacheLookup::Unavailable => {}
        }

        let value = loader().await?;
        self.write(key, &value).await;
        Ok(value)
    }

    /// Overwrite an entry.
    pub async fn write<T: CacheCodec>(&self, key: &str, value: &T) {
        let Some(cache) = &self.cache else {
            return;
        };

        if let Err(e) = cache.set(key, &value.encode()).await {
            warn!(key = %key, error = %e, "Cache write failed");
        }
    }

    /// Add one to a cached counter, if it is cached.
    ///
    /// A failed adjustment may or may not have been applied, so the counter
    /// is dropped and the next read recounts from the store. When the cache
    /// is down entirely the drop fails too and the entry lives until its TTL.
    pub async fn increment(&self, key: &str) {
        let Some(cache) = &self.cache else {
            return;
        };

        match cache.incr(key).await {
            Ok(Some(value)) => debug!(key = %key, value = value, "Incremented cached counter"),
            Ok(None) => debug!(key = %key, "Counter not cached, left for next read"),
            Err(e) => {
                warn!(key = %key, error = %e, "Cache increment failed");
                self.invalidate(key).await;
            }
        }
    }

    /// Subtract one from a cached counter, if it is cached. Failures are
    /// handled as in [`CacheLayer::increment`].
    pub async fn decrement(&self, key: &str) {
        let Some(cache) = &self.cache else {
            return;
        };

        match cache.decr(key).await {
            Ok(Some(value)) => debug!(key = %key, value = value, "Decremented cached counter"),
            Ok(None) => debug!(key = %key, "Counter not cached, left for next read"),
            Err(e) => {
                warn!(key = %key, error = %e, "Cache decrement failed");
                self.invalidate(key).await;
            }
        }
    }

    /// Drop an entry so the next read goes to the store.
    pub async fn invalidate(&self, key: &str) {
        let Some(cache) = &self.cache else {
            return;
        };

        if let Err(e) = cache.remove(key).await {
            warn!(key = %key, error = %e, "Cache invalidation failed");
        }
    }
}

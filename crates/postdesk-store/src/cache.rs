//! Keyed query cache
//!
//! Holds the client's view of remote collections. Invalidation marks an
//! entry stale without dropping its value, so readers keep showing the
//! last known data until the next fetch replaces it.

use postdesk_util::MonotonicInstant;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::trace;

/// Stable key for a cached query
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(Cow<'static, str>);

impl CacheKey {
    /// The full posts collection
    pub const POSTS: CacheKey = CacheKey(Cow::Borrowed("posts"));

    pub fn new(key: impl Into<Cow<'static, str>>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How usable a cached entry is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Nothing cached under the key
    Missing,
    /// Cached and within its freshness window
    Fresh,
    /// Cached but invalidated or older than the freshness window
    Stale,
}

/// Key-value cache for query results
pub trait QueryCache<V>: Send + Sync {
    /// Current value under `key`, fresh or stale
    fn get(&self, key: &CacheKey) -> Option<V>;

    /// Replace the value under `key`, marking it fresh
    fn set(&self, key: CacheKey, value: V);

    /// Mark the entry stale so the next read re-fetches it
    fn invalidate(&self, key: &CacheKey);

    /// Freshness of the entry given how long values stay fresh
    fn freshness(&self, key: &CacheKey, stale_after: Duration) -> Freshness;
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    updated_at: MonotonicInstant,
    invalidated: bool,
}

/// In-memory [`QueryCache`]
#[derive(Debug)]
pub struct MemoryCache<V> {
    entries: Mutex<HashMap<CacheKey, CacheEntry<V>>>,
}

impl<V> MemoryCache<V> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<CacheKey, CacheEntry<V>>> {
        // Every update replaces or flags a whole entry, so a poisoned map is still consistent
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<V> Default for MemoryCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone + Send> QueryCache<V> for MemoryCache<V> {
    fn get(&self, key: &CacheKey) -> Option<V> {
        self.entries().get(key).map(|entry| entry.value.clone())
    }

    fn set(&self, key: CacheKey, value: V) {
        trace!(key = %key, "Cache set");
        self.entries().insert(
            key,
            CacheEntry {
                value,
                updated_at: MonotonicInstant::now(),
                invalidated: false,
            },
        );
    }

    fn invalidate(&self, key: &CacheKey) {
        if let Some(entry) = self.entries().get_mut(key) {
            trace!(key = %key, "Cache invalidated");
            entry.invalidated = true;
        }
    }

    fn freshness(&self, key: &CacheKey, stale_after: Duration) -> Freshness {
        match self.entries().get(key) {
            None => Freshness::Missing,
            Some(entry) if entry.invalidated || entry.updated_at.elapsed() >= stale_after => {
                Freshness::Stale
            }
            Some(_) => Freshness::Fresh,
        }
    }
}

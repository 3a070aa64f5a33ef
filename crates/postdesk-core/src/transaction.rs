//! Optimistic cache transactions

use postdesk_store::{CacheKey, QueryCache};
use tracing::{debug, warn};

/// A cache change applied ahead of the remote call that confirms it.
///
/// `begin` snapshots the entry and applies the change at once. The
/// transaction must then be consumed: `commit` keeps the change,
/// `rollback` puts the snapshot back exactly as it was. Either way the
/// entry is left stale so the next read re-syncs with the remote.
///
/// A transaction dropped without being consumed, for instance when the
/// future awaiting the remote call is cancelled, is rolled back.
#[must_use = "an optimistic change must be committed or rolled back"]
pub struct OptimisticTransaction<'c, V: Clone> {
    cache: &'c dyn QueryCache<V>,
    key: CacheKey,
    snapshot: Option<V>,
    settled: bool,
}

impl<'c, V: Clone> OptimisticTransaction<'c, V> {
    /// Snapshot `key` and apply `change` to its current value.
    ///
    /// When nothing is cached there is nothing to change; rollback then
    /// leaves the key absent.
    pub fn begin(
        cache: &'c dyn QueryCache<V>,
        key: CacheKey,
        change: impl FnOnce(&V) -> V,
    ) -> Self {
        let snapshot = cache.get(&key);
        if let Some(current) = &snapshot {
            cache.set(key.clone(), change(current));
        }
        debug!(key = %key, had_value = snapshot.is_some(), "Optimistic change applied");

        Self {
            cache,
            key,
            snapshot,
            settled: false,
        }
    }

    /// Value as it was before the change
    pub fn snapshot(&self) -> Option<&V> {
        self.snapshot.as_ref()
    }

    /// Keep the change and mark the entry stale
    pub fn commit(mut self) {
        self.settled = true;
        self.cache.invalidate(&self.key);
        debug!(key = %self.key, "Optimistic change committed");
    }

    /// Restore the snapshot by full replacement and mark the entry stale
    pub fn rollback(mut self) {
        self.restore();
        debug!(key = %self.key, "Optimistic change rolled back");
    }

    fn restore(&mut self) {
        self.settled = true;
        if let Some(snapshot) = self.snapshot.take() {
            self.cache.set(self.key.clone(), snapshot);
        }
        // `set` marks the entry fresh; an earlier invalidation must survive
        self.cache.invalidate(&self.key);
    }
}

impl<V: Clone> Drop for OptimisticTransaction<'_, V> {
    fn drop(&mut self) {
        if !self.settled {
            warn!(key = %self.key, "Optimistic change abandoned, rolling back");
            self.restore();
        }
    }
}

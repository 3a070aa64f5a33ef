//! Mutation reconciler
//!
//! Keeps the cached posts list in step with the remote collection. Reads
//! go through the cache; writes go to the remote first (or, for deletes,
//! optimistically to the cache first) and are then folded into the cache.
//!
//! Every operation on the posts list holds the `posts` key lock for its
//! whole duration, including the remote call. Concurrent callers therefore
//! queue, and a rollback can never overwrite a change made by another
//! operation while the failing call was in flight.

use postdesk_api::{Post, PostInput, PostRecord, is_local_post_id};
use postdesk_config::Settings;
use postdesk_remote::{PostsRemote, RemoteResult, RetryPolicy};
use postdesk_store::{CacheKey, Freshness, QueryCache};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::{KeyLocks, OptimisticTransaction};

/// How long a fetched list is served without refetching
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(5 * 60);

/// Result of [`PostsReconciler::update`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdatedPost {
    pub record: PostRecord,
    /// The remote rejected the update and the post only exists locally,
    /// so the new state was built from the input instead
    pub recovered_locally: bool,
}

/// Coordinates the posts cache with the remote collection
pub struct PostsReconciler {
    remote: Arc<dyn PostsRemote>,
    cache: Arc<dyn QueryCache<Vec<PostRecord>>>,
    locks: KeyLocks,
    retry: RetryPolicy,
    stale_after: Duration,
}

impl PostsReconciler {
    pub fn new(
        remote: Arc<dyn PostsRemote>,
        cache: Arc<dyn QueryCache<Vec<PostRecord>>>,
    ) -> Self {
        Self {
            remote,
            cache,
            locks: KeyLocks::new(),
            retry: RetryPolicy::default(),
            stale_after: DEFAULT_STALE_AFTER,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    /// Apply the cache and retry settings
    pub fn with_settings(self, settings: &Settings) -> Self {
        self.with_retry(RetryPolicy::new(
            settings.retry.max_retries,
            settings.retry.base_delay,
        ))
        .with_stale_after(settings.cache.stale_after)
    }

    pub fn cache(&self) -> &Arc<dyn QueryCache<Vec<PostRecord>>> {
        &self.cache
    }

    /// The posts list, fetched when missing or stale
    pub async fn posts(&self) -> RemoteResult<Vec<PostRecord>> {
        let _guard = self.locks.lock(&CacheKey::POSTS).await;

        if self.cache.freshness(&CacheKey::POSTS, self.stale_after) == Freshness::Fresh {
            if let Some(posts) = self.cache.get(&CacheKey::POSTS) {
                debug!(count = posts.len(), "Serving posts from cache");
                return Ok(posts);
            }
        }

        self.fetch_locked().await
    }

    /// The cached list as it is now, without any I/O
    pub fn cached_posts(&self) -> Vec<PostRecord> {
        self.cache.get(&CacheKey::POSTS).unwrap_or_default()
    }

    /// Drop freshness and fetch the list again
    pub async fn refresh(&self) -> RemoteResult<Vec<PostRecord>> {
        let _guard = self.locks.lock(&CacheKey::POSTS).await;
        self.cache.invalidate(&CacheKey::POSTS);
        self.fetch_locked().await
    }

    /// A single post.
    ///
    /// Locally created posts are unknown to the remote, so the cached list
    /// is consulted first.
    pub async fn post(&self, id: i64) -> RemoteResult<PostRecord> {
        if let Some(record) = self.cached_posts().into_iter().find(|r| r.id() == id) {
            debug!(post_id = id, "Serving post from cache");
            return Ok(record);
        }

        let remote: &dyn PostsRemote = &*self.remote;
        let post = self.retry.run("get", move || remote.get(id)).await?;
        Ok(PostRecord::tagged(post))
    }

    /// Create a post and put it at the front of the list
    pub async fn create(&self, input: &PostInput) -> RemoteResult<PostRecord> {
        let _guard = self.locks.lock(&CacheKey::POSTS).await;

        let created = self.remote.create(input).await?;
        let record = PostRecord::tagged(created);

        let posts = match self.cache.get(&CacheKey::POSTS) {
            Some(existing) => std::iter::once(record.clone()).chain(existing).collect(),
            None => vec![record.clone()],
        };
        self.cache.set(CacheKey::POSTS, posts);

        info!(
            post_id = record.id(),
            locally_created = record.is_locally_created,
            "Post created"
        );
        Ok(record)
    }

    /// Update a post and replace it in the list.
    ///
    /// The remote cannot update posts it never persisted. For those, a
    /// failed call is recovered by building the post from the input.
    pub async fn update(&self, id: i64, input: &PostInput) -> RemoteResult<UpdatedPost> {
        let _guard = self.locks.lock(&CacheKey::POSTS).await;

        let (updated, recovered_locally) = match self.remote.update(id, input).await {
            Ok(post) => (post, false),
            Err(e) if is_local_post_id(id) => {
                warn!(
                    post_id = id,
                    error = %e,
                    "Remote update failed for local post, keeping local changes"
                );
                (Post::from_input(id, input.clone()), true)
            }
            Err(e) => {
                warn!(post_id = id, error = %e, "Remote update failed");
                return Err(e);
            }
        };

        let record = PostRecord::tagged(updated);
        let posts = match self.cache.get(&CacheKey::POSTS) {
            Some(existing) => existing
                .into_iter()
                .map(|r| if r.id() == id { record.clone() } else { r })
                .collect(),
            None => vec![record.clone()],
        };
        self.cache.set(CacheKey::POSTS, posts);

        info!(post_id = id, recovered_locally, "Post updated");
        Ok(UpdatedPost {
            record,
            recovered_locally,
        })
    }

    /// Delete a post, removing it from the list before the remote confirms
    pub async fn delete(&self, id: i64) -> RemoteResult<()> {
        let _guard = self.locks.lock(&CacheKey::POSTS).await;

        let tx = OptimisticTransaction::begin(&*self.cache, CacheKey::POSTS, |posts| {
            posts.iter().filter(|r| r.id() != id).cloned().collect()
        });

        match self.remote.delete(id).await {
            Ok(()) => {
                tx.commit();
                info!(post_id = id, "Post deleted");
                Ok(())
            }
            Err(e) => {
                tx.rollback();
                warn!(post_id = id, error = %e, "Delete failed, restored previous posts");
                Err(e)
            }
        }
    }

    async fn fetch_locked(&self) -> RemoteResult<Vec<PostRecord>> {
        let remote: &dyn PostsRemote = &*self.remote;
        let posts = self.retry.run("get_all", move || remote.get_all()).await?;

        let records: Vec<PostRecord> = posts.into_iter().map(PostRecord::tagged).collect();
        self.cache.set(CacheKey::POSTS, records.clone());

        debug!(count = records.len(), "Posts fetched");
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use postdesk_remote::{MockCall, MockRemote, RemoteError};
    use postdesk_store::MemoryCache;

    const LONG: Duration = Duration::from_secs(300);

    fn setup(seed: i64) -> (Arc<MockRemote>, Arc<PostsReconciler>) {
        let remote = Arc::new(MockRemote::with_seed(seed));
        let cache: Arc<MemoryCache<Vec<PostRecord>>> = Arc::new(MemoryCache::new());
        let reconciler = PostsReconciler::new(remote.clone(), cache)
            .with_retry(RetryPolicy::new(2, Duration::ZERO));
        (remote, Arc::new(reconciler))
    }

    fn ids(records: &[PostRecord]) -> Vec<i64> {
        records.iter().map(PostRecord::id).collect()
    }

    fn server_error() -> RemoteError {
        RemoteError::http(500, "Internal Server Error")
    }

    #[tokio::test]
    async fn posts_read_through_cache() {
        let (remote, reconciler) = setup(3);

        let posts = reconciler.posts().await.unwrap();
        assert_eq!(ids(&posts), [1, 2, 3]);
        assert!(posts.iter().all(|r| !r.is_locally_created));

        reconciler.posts().await.unwrap();
        assert_eq!(remote.get_all_calls(), 1);

        reconciler.refresh().await.unwrap();
        assert_eq!(remote.get_all_calls(), 2);
    }

    #[tokio::test]
    async fn stale_list_is_refetched() {
        let remote = Arc::new(MockRemote::with_seed(2));
        let cache: Arc<MemoryCache<Vec<PostRecord>>> = Arc::new(MemoryCache::new());
        let reconciler =
            PostsReconciler::new(remote.clone(), cache).with_stale_after(Duration::ZERO);

        reconciler.posts().await.unwrap();
        reconciler.posts().await.unwrap();
        assert_eq!(remote.get_all_calls(), 2);
    }

    #[tokio::test]
    async fn transient_read_failures_are_retried() {
        let (remote, reconciler) = setup(2);
        *remote.transient_read_failures.lock().unwrap() = 2;

        assert_eq!(reconciler.posts().await.unwrap().len(), 2);
        assert_eq!(remote.get_all_calls(), 3);
    }

    #[tokio::test]
    async fn persistent_read_failure_leaves_cache_empty() {
        let (remote, reconciler) = setup(2);
        *remote.fail_get_all.lock().unwrap() = Some(server_error());

        assert_eq!(reconciler.posts().await.unwrap_err(), server_error());
        assert_eq!(remote.get_all_calls(), 3);
        assert!(reconciler.cached_posts().is_empty());
    }

    #[tokio::test]
    async fn missing_post_is_not_retried() {
        let (remote, reconciler) = setup(2);

        let err = reconciler.post(404).await.unwrap_err();
        assert_eq!(err.status(), Some(404));
        assert_eq!(remote.calls(), [MockCall::Get(404)]);
    }

    #[tokio::test]
    async fn local_post_is_served_from_cache() {
        let (remote, reconciler) = setup(100);
        reconciler.posts().await.unwrap();
        reconciler.create(&PostInput::new(1, "T", "Body text")).await.unwrap();

        let record = reconciler.post(101).await.unwrap();
        assert!(record.is_locally_created);
        assert!(!remote.calls().contains(&MockCall::Get(101)));
    }

    #[tokio::test]
    async fn create_prepends_tagged_record() {
        let (_remote, reconciler) = setup(100);
        reconciler.posts().await.unwrap();

        let record = reconciler
            .create(&PostInput::new(1, "T", "B"))
            .await
            .unwrap();

        let cached = reconciler.cached_posts();
        assert_eq!(cached.len(), 101);
        assert_eq!(cached[0], record);
        assert_eq!(
            serde_json::to_value(&cached[0]).unwrap(),
            serde_json::json!({
                "id": 101, "userId": 1, "title": "T", "body": "B", "isLocallyCreated": true
            })
        );
    }

    #[tokio::test]
    async fn create_seeds_missing_list() {
        let (_remote, reconciler) = setup(0);
        let record = reconciler.create(&PostInput::new(1, "T", "B")).await.unwrap();
        assert_eq!(reconciler.cached_posts(), vec![record]);
    }

    #[tokio::test]
    async fn failed_create_leaves_cache_untouched() {
        let (remote, reconciler) = setup(3);
        let before = reconciler.posts().await.unwrap();
        *remote.fail_create.lock().unwrap() = Some(server_error());

        assert!(reconciler.create(&PostInput::new(1, "T", "B")).await.is_err());
        assert_eq!(reconciler.cached_posts(), before);
        assert_eq!(
            reconciler.cache().freshness(&CacheKey::POSTS, LONG),
            Freshness::Fresh
        );
    }

    #[tokio::test]
    async fn update_replaces_matching_entry() {
        let (_remote, reconciler) = setup(3);
        reconciler.posts().await.unwrap();

        let updated = reconciler
            .update(2, &PostInput::new(9, "New title", "New body text"))
            .await
            .unwrap();
        assert!(!updated.recovered_locally);

        let cached = reconciler.cached_posts();
        assert_eq!(ids(&cached), [1, 2, 3]);
        assert_eq!(cached[1].post.title, "New title");
        assert_eq!(cached[1].post.user_id, 9);
        assert!(!cached[1].is_locally_created);
    }

    #[tokio::test]
    async fn failed_update_of_local_post_is_recovered() {
        let (remote, reconciler) = setup(100);
        reconciler.posts().await.unwrap();
        reconciler.create(&PostInput::new(1, "T", "B")).await.unwrap();

        // The remote never stored post 101, so it rejects the update
        let updated = reconciler
            .update(101, &PostInput::new(1, "T2", "B2"))
            .await
            .unwrap();
        assert!(updated.recovered_locally);
        assert_eq!(updated.record.post, Post::from_input(101, PostInput::new(1, "T2", "B2")));
        assert!(matches!(remote.calls().last(), Some(MockCall::Update(101, _))));

        let cached = reconciler.cached_posts();
        assert_eq!(cached.len(), 101);
        assert_eq!(cached[0].post.title, "T2");
        assert!(cached[0].is_locally_created);
    }

    #[tokio::test]
    async fn failed_update_of_server_post_propagates() {
        let (remote, reconciler) = setup(3);
        let before = reconciler.posts().await.unwrap();
        *remote.fail_update.lock().unwrap() = Some(server_error());

        let err = reconciler
            .update(2, &PostInput::new(1, "T2", "B2"))
            .await
            .unwrap_err();
        assert_eq!(err, server_error());
        assert_eq!(reconciler.cached_posts(), before);
    }

    #[tokio::test]
    async fn update_seeds_missing_list() {
        let (_remote, reconciler) = setup(3);
        let updated = reconciler
            .update(2, &PostInput::new(1, "T2", "B2"))
            .await
            .unwrap();
        assert_eq!(reconciler.cached_posts(), vec![updated.record]);
    }

    #[tokio::test]
    async fn delete_commits_and_invalidates() {
        let (_remote, reconciler) = setup(3);
        reconciler.posts().await.unwrap();

        reconciler.delete(2).await.unwrap();
        assert_eq!(ids(&reconciler.cached_posts()), [1, 3]);
        assert_eq!(
            reconciler.cache().freshness(&CacheKey::POSTS, LONG),
            Freshness::Stale
        );
    }

    #[tokio::test]
    async fn failed_delete_restores_exact_snapshot() {
        let (remote, reconciler) = setup(3);
        reconciler.posts().await.unwrap();
        reconciler.create(&PostInput::new(1, "T", "B")).await.unwrap();
        let before = reconciler.cached_posts();
        *remote.fail_delete.lock().unwrap() = Some(server_error());

        let err = reconciler.delete(2).await.unwrap_err();
        assert_eq!(err.to_string(), "HTTP 500: Internal Server Error");
        assert_eq!(reconciler.cached_posts(), before);
    }

    #[tokio::test]
    async fn failed_delete_keeps_earlier_invalidation() {
        let (remote, reconciler) = setup(5);
        reconciler.posts().await.unwrap();
        reconciler.delete(2).await.unwrap();

        *remote.fail_delete.lock().unwrap() = Some(server_error());
        assert!(reconciler.delete(3).await.is_err());
        assert_eq!(ids(&reconciler.cached_posts()), [1, 3, 4, 5]);

        // The list is still stale, so the next read goes to the remote
        reconciler.posts().await.unwrap();
        assert_eq!(remote.get_all_calls(), 2);
    }

    #[tokio::test]
    async fn cancelled_delete_is_rolled_back() {
        let (remote, reconciler) = setup(5);
        reconciler.posts().await.unwrap();
        let _gate = remote.hold();

        let timed_out =
            tokio::time::timeout(Duration::from_millis(50), reconciler.delete(2)).await;
        assert!(timed_out.is_err());
        assert!(remote.calls().contains(&MockCall::Delete(2)));

        assert_eq!(ids(&reconciler.cached_posts()), [1, 2, 3, 4, 5]);
        assert_eq!(
            reconciler.cache().freshness(&CacheKey::POSTS, LONG),
            Freshness::Stale
        );
        remote.release();
    }

    #[tokio::test]
    async fn removal_is_visible_while_delete_is_in_flight() {
        let (remote, reconciler) = setup(3);
        reconciler.posts().await.unwrap();
        let gate = remote.hold();

        let delete = {
            let reconciler = reconciler.clone();
            tokio::spawn(async move { reconciler.delete(2).await })
        };
        while !remote.calls().contains(&MockCall::Delete(2)) {
            tokio::task::yield_now().await;
        }
        assert_eq!(ids(&reconciler.cached_posts()), [1, 3]);

        gate.add_permits(1);
        delete.await.unwrap().unwrap();
        assert_eq!(ids(&reconciler.cached_posts()), [1, 3]);
    }

    #[tokio::test]
    async fn concurrent_deletes_are_serialised() {
        let (remote, reconciler) = setup(3);
        reconciler.posts().await.unwrap();
        let gate = remote.hold();
        *remote.fail_delete.lock().unwrap() = Some(server_error());

        let first = {
            let reconciler = reconciler.clone();
            tokio::spawn(async move { reconciler.delete(1).await })
        };
        while remote.calls().len() < 2 {
            tokio::task::yield_now().await;
        }

        let second = {
            let reconciler = reconciler.clone();
            tokio::spawn(async move { reconciler.delete(2).await })
        };
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        // The second delete waits for the first to settle before touching anything
        assert_eq!(remote.calls().len(), 2);
        assert_eq!(ids(&reconciler.cached_posts()), [2, 3]);

        gate.add_permits(1);
        assert!(first.await.unwrap().is_err());

        while remote.calls().len() < 3 {
            tokio::task::yield_now().await;
        }
        *remote.fail_delete.lock().unwrap() = None;
        gate.add_permits(1);
        second.await.unwrap().unwrap();

        // The rollback of the first delete did not bring post 2 back
        assert_eq!(ids(&reconciler.cached_posts()), [1, 3]);
    }
}

//! Mock remote collection for testing

use async_trait::async_trait;
use postdesk_api::{LOCAL_POST_ID_THRESHOLD, Post, PostInput};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

use crate::{PostsRemote, RemoteError, RemoteResult};

/// A call received by [`MockRemote`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    GetAll,
    Get(i64),
    Create(PostInput),
    Update(i64, PostInput),
    Delete(i64),
}

/// In-memory stand-in for the demo backend.
///
/// Like the real backend it acknowledges writes without keeping them:
/// creates are echoed with a fresh id above the seed range, updates of
/// unknown ids fail with a 500, and deletes always succeed.
pub struct MockRemote {
    posts: Arc<Mutex<Vec<Post>>>,
    next_id: AtomicI64,
    calls: Arc<Mutex<Vec<MockCall>>>,

    /// Configure get_all to fail
    pub fail_get_all: Arc<Mutex<Option<RemoteError>>>,

    /// Configure create to fail
    pub fail_create: Arc<Mutex<Option<RemoteError>>>,

    /// Configure update to fail
    pub fail_update: Arc<Mutex<Option<RemoteError>>>,

    /// Configure delete to fail
    pub fail_delete: Arc<Mutex<Option<RemoteError>>>,

    /// Number of upcoming reads that fail with a 503 before behaving normally
    pub transient_read_failures: Arc<Mutex<u32>>,

    /// When set, every call waits for a permit before answering
    pub gate: Arc<Mutex<Option<Arc<Semaphore>>>>,
}

impl MockRemote {
    pub fn new() -> Self {
        Self {
            posts: Arc::new(Mutex::new(Vec::new())),
            next_id: AtomicI64::new(LOCAL_POST_ID_THRESHOLD + 1),
            calls: Arc::new(Mutex::new(Vec::new())),
            fail_get_all: Arc::new(Mutex::new(None)),
            fail_create: Arc::new(Mutex::new(None)),
            fail_update: Arc::new(Mutex::new(None)),
            fail_delete: Arc::new(Mutex::new(None)),
            transient_read_failures: Arc::new(Mutex::new(0)),
            gate: Arc::new(Mutex::new(None)),
        }
    }

    /// Seed with posts 1..=count, ten per user
    pub fn with_seed(count: i64) -> Self {
        let mock = Self::new();
        mock.set_posts(
            (1..=count)
                .map(|id| Post {
                    id,
                    user_id: (id - 1) / 10 + 1,
                    title: format!("Post title {}", id),
                    body: format!("Body of post number {}", id),
                })
                .collect(),
        );
        mock
    }

    pub fn set_posts(&self, posts: Vec<Post>) {
        *self.posts.lock().unwrap() = posts;
    }

    /// Calls received so far, oldest first
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn get_all_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, MockCall::GetAll))
            .count()
    }

    /// Hold every call until permits are added to the returned semaphore
    pub fn hold(&self) -> Arc<Semaphore> {
        let semaphore = Arc::new(Semaphore::new(0));
        *self.gate.lock().unwrap() = Some(semaphore.clone());
        semaphore
    }

    /// Stop holding calls, letting every waiting call through
    pub fn release(&self) {
        if let Some(semaphore) = self.gate.lock().unwrap().take() {
            semaphore.close();
        }
    }

    async fn enter(&self, call: MockCall) {
        self.calls.lock().unwrap().push(call);

        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            // A closed gate lets the call through
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
    }

    fn injected(slot: &Mutex<Option<RemoteError>>) -> RemoteResult<()> {
        match slot.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn transient(&self) -> RemoteResult<()> {
        let mut remaining = self.transient_read_failures.lock().unwrap();
        if *remaining > 0 {
            *remaining -= 1;
            return Err(RemoteError::http(503, "Service Unavailable"));
        }
        Ok(())
    }
}

impl Default for MockRemote {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PostsRemote for MockRemote {
    async fn get_all(&self) -> RemoteResult<Vec<Post>> {
        self.enter(MockCall::GetAll).await;
        self.transient()?;
        Self::injected(&self.fail_get_all)?;
        Ok(self.posts.lock().unwrap().clone())
    }

    async fn get(&self, id: i64) -> RemoteResult<Post> {
        self.enter(MockCall::Get(id)).await;
        self.transient()?;
        self.posts
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or_else(|| RemoteError::http(404, "Not Found"))
    }

    async fn create(&self, input: &PostInput) -> RemoteResult<Post> {
        self.enter(MockCall::Create(input.clone())).await;
        Self::injected(&self.fail_create)?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(Post::from_input(id, input.clone()))
    }

    async fn update(&self, id: i64, input: &PostInput) -> RemoteResult<Post> {
        self.enter(MockCall::Update(id, input.clone())).await;
        Self::injected(&self.fail_update)?;
        let known = self.posts.lock().unwrap().iter().any(|p| p.id == id);
        if !known {
            return Err(RemoteError::http(500, "Internal Server Error"));
        }
        Ok(Post::from_input(id, input.clone()))
    }

    async fn delete(&self, id: i64) -> RemoteResult<()> {
        self.enter(MockCall::Delete(id)).await;
        Self::injected(&self.fail_delete)?;
        Ok(())
    }
}

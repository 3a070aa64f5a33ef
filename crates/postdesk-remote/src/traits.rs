//! Remote collection traits

use async_trait::async_trait;
use postdesk_api::{Post, PostInput};
use thiserror::Error;

/// Errors from the remote posts collection
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// The server answered with a non-2xx status
    #[error("HTTP {status}: {status_text}")]
    Http { status: u16, status_text: String },

    /// The request never produced a response
    #[error("Transport error: {0}")]
    Transport(String),

    /// The response body was not the expected JSON
    #[error("Decode error: {0}")]
    Decode(String),
}

impl RemoteError {
    pub fn http(status: u16, status_text: impl Into<String>) -> Self {
        Self::Http {
            status,
            status_text: status_text.into(),
        }
    }

    /// HTTP status, if the server answered
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether a read may be retried after this error
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http { status, .. } => *status >= 500,
            Self::Transport(_) => true,
            Self::Decode(_) => false,
        }
    }
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// The remote posts collection
///
/// Writes are acknowledged but may not be persisted: the demo backend
/// echoes creates with a fresh id and forgets them.
#[async_trait]
pub trait PostsRemote: Send + Sync {
    /// `GET /posts`
    async fn get_all(&self) -> RemoteResult<Vec<Post>>;

    /// `GET /posts/{id}`
    async fn get(&self, id: i64) -> RemoteResult<Post>;

    /// `POST /posts`, returning the created post with its assigned id
    async fn create(&self, input: &PostInput) -> RemoteResult<Post>;

    /// `PUT /posts/{id}`
    async fn update(&self, id: i64, input: &PostInput) -> RemoteResult<Post>;

    /// `DELETE /posts/{id}`
    async fn delete(&self, id: i64) -> RemoteResult<()>;
}

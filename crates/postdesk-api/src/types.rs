//! Post types for the postdesk API

use serde::{Deserialize, Serialize};
use std::fmt;

/// Highest id in the remote seed dataset.
///
/// The backing API echoes writes without persisting them, so any post with
/// a larger id only exists in the client cache. This threshold is a
/// workaround for that backend and should be revisited if the backing
/// store ever persists writes.
pub const LOCAL_POST_ID_THRESHOLD: i64 = 100;

/// Whether a post id lies outside the persisted seed dataset
pub fn is_local_post_id(id: i64) -> bool {
    id > LOCAL_POST_ID_THRESHOLD
}

/// A post as served by the remote collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub body: String,
}

impl Post {
    /// Build a post from an id and the fields of an input
    pub fn from_input(id: i64, input: PostInput) -> Self {
        Self {
            id,
            user_id: input.user_id,
            title: input.title,
            body: input.body,
        }
    }

    pub fn is_locally_created(&self) -> bool {
        is_local_post_id(self.id)
    }
}

impl fmt::Display for Post {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} (user {}): {}", self.id, self.user_id, self.title)
    }
}

/// Writable fields of a post, sent on create and update
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostInput {
    pub user_id: i64,
    pub title: String,
    pub body: String,
}

impl PostInput {
    pub fn new(user_id: i64, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            user_id,
            title: title.into(),
            body: body.into(),
        }
    }
}

impl From<&Post> for PostInput {
    fn from(post: &Post) -> Self {
        Self {
            user_id: post.user_id,
            title: post.title.clone(),
            body: post.body.clone(),
        }
    }
}

/// A post as held in the client cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostRecord {
    #[serde(flatten)]
    pub post: Post,

    /// True when the post's authoritative state lives only in the cache
    #[serde(default)]
    pub is_locally_created: bool,
}

impl PostRecord {
    /// Wrap a post, deriving the local flag from its id
    pub fn tagged(post: Post) -> Self {
        let is_locally_created = post.is_locally_created();
        Self {
            post,
            is_locally_created,
        }
    }

    pub fn id(&self) -> i64 {
        self.post.id
    }
}

impl From<Post> for PostRecord {
    fn from(post: Post) -> Self {
        Self::tagged(post)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_uses_camel_case_fields() {
        let json = r#"{"userId":1,"id":1,"title":"sunt aut","body":"quia et"}"#;
        let post: Post = serde_json::from_str(json).unwrap();
        assert_eq!(post.user_id, 1);
        assert_eq!(post.title, "sunt aut");

        let out = serde_json::to_value(&post).unwrap();
        assert_eq!(out["userId"], 1);
        assert!(out.get("user_id").is_none());
    }

    #[test]
    fn record_flattens_post_fields() {
        let record = PostRecord::tagged(Post {
            id: 101,
            user_id: 1,
            title: "T".into(),
            body: "B".into(),
        });
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "id": 101,
                "userId": 1,
                "title": "T",
                "body": "B",
                "isLocallyCreated": true
            })
        );
    }

    #[test]
    fn local_threshold_is_exclusive() {
        assert!(!is_local_post_id(1));
        assert!(!is_local_post_id(LOCAL_POST_ID_THRESHOLD));
        assert!(is_local_post_id(LOCAL_POST_ID_THRESHOLD + 1));
    }

    #[test]
    fn from_input_keeps_fields() {
        let input = PostInput::new(3, "title", "body text");
        let post = Post::from_input(150, input.clone());
        assert_eq!(post.id, 150);
        assert_eq!(PostInput::from(&post), input);
    }
}

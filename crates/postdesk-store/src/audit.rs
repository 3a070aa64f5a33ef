//! Audit event types

use chrono::{DateTime, Local};
use postdesk_api::UserRole;
use serde::{Deserialize, Serialize};

/// Types of audit events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEventType {
    /// Credentials accepted
    LoginSucceeded { username: String, role: UserRole },

    /// Credentials rejected
    LoginFailed { username: String, reason: String },

    /// Attempt refused by the login limiter
    LoginBlocked {
        username: String,
        retry_after_secs: u64,
    },

    /// Saved session cleared
    LoggedOut { username: String },

    /// Post created
    PostCreated {
        post_id: i64,
        locally_created: bool,
        actor: String,
    },

    /// Post updated. `recovered_locally` is set when the remote write failed
    /// for a locally-created post and the cache was updated anyway.
    PostUpdated {
        post_id: i64,
        recovered_locally: bool,
        actor: String,
    },

    /// Post deleted
    PostDeleted { post_id: i64, actor: String },

    /// Remote delete failed; the cache was restored
    DeleteRolledBack {
        post_id: i64,
        error: String,
        actor: String,
    },
}

/// Full audit event with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique event ID
    pub id: i64,

    /// Event timestamp
    pub timestamp: DateTime<Local>,

    /// Event type and details
    pub event: AuditEventType,
}

impl AuditEvent {
    pub fn new(event: AuditEventType) -> Self {
        Self {
            id: 0, // Will be set by store
            timestamp: postdesk_util::now(),
            event,
        }
    }
}

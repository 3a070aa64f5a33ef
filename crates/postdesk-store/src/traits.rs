//! Store trait definitions

use postdesk_api::User;

use crate::{AuditEvent, StoreResult};

/// Durable client-side state
pub trait Store: Send + Sync {
    // Audit log

    /// Append an audit event
    fn append_audit(&self, event: AuditEvent) -> StoreResult<()>;

    /// Get recent audit events, newest first
    fn get_recent_audits(&self, limit: usize) -> StoreResult<Vec<AuditEvent>>;

    // Login session

    /// Load the saved user, if any
    fn load_session(&self) -> StoreResult<Option<User>>;

    /// Save the logged-in user, replacing any previous one
    fn save_session(&self, user: &User) -> StoreResult<()>;

    /// Forget the saved user
    fn clear_session(&self) -> StoreResult<()>;

    // Health

    /// Check if store is healthy
    fn is_healthy(&self) -> bool;
}

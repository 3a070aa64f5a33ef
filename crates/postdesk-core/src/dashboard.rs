//! Role-gated view of the posts collection

use postdesk_api::{Permissions, PostRecord, User};
use postdesk_store::{AuditEvent, AuditEventType, Store};
use std::sync::Arc;
use tracing::warn;

use crate::{
    CoreError, CoreResult, PostForm, PostsReconciler, TablePage, TableQuery, UpdatedPost,
    table_page, validate_post_form,
};

/// Default number of rows per table page
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// What a logged-in user can see and do.
///
/// Every operation checks the user's permissions before anything else,
/// and writes are recorded in the audit log.
pub struct Dashboard {
    reconciler: Arc<PostsReconciler>,
    store: Arc<dyn Store>,
    user: User,
    page_size: usize,
}

impl Dashboard {
    pub fn new(reconciler: Arc<PostsReconciler>, store: Arc<dyn Store>, user: User) -> Self {
        Self {
            reconciler,
            store,
            user,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn can(&self, required: Permissions) -> bool {
        self.user.can(required)
    }

    pub async fn posts(&self) -> CoreResult<Vec<PostRecord>> {
        self.require("view posts", Permissions::VIEW)?;
        Ok(self.reconciler.posts().await?)
    }

    /// One page of the table after search and sort
    pub async fn table(&self, query: &TableQuery) -> CoreResult<TablePage> {
        let posts = self.posts().await?;
        Ok(table_page(&posts, query, self.page_size))
    }

    pub async fn post(&self, id: i64) -> CoreResult<PostRecord> {
        self.require("view posts", Permissions::VIEW)?;
        Ok(self.reconciler.post(id).await?)
    }

    pub async fn refresh(&self) -> CoreResult<Vec<PostRecord>> {
        self.require("view posts", Permissions::VIEW)?;
        Ok(self.reconciler.refresh().await?)
    }

    pub async fn create(&self, form: &PostForm) -> CoreResult<PostRecord> {
        self.require("create posts", Permissions::CREATE)?;
        let input = validate_post_form(form)?;

        let record = self.reconciler.create(&input).await?;
        self.audit(AuditEventType::PostCreated {
            post_id: record.id(),
            locally_created: record.is_locally_created,
            actor: self.user.username.clone(),
        });
        Ok(record)
    }

    pub async fn update(&self, id: i64, form: &PostForm) -> CoreResult<UpdatedPost> {
        self.require("edit posts", Permissions::EDIT)?;
        let input = validate_post_form(form)?;

        let updated = self.reconciler.update(id, &input).await?;
        self.audit(AuditEventType::PostUpdated {
            post_id: id,
            recovered_locally: updated.recovered_locally,
            actor: self.user.username.clone(),
        });
        Ok(updated)
    }

    pub async fn delete(&self, id: i64) -> CoreResult<()> {
        self.require("delete posts", Permissions::DELETE)?;

        match self.reconciler.delete(id).await {
            Ok(()) => {
                self.audit(AuditEventType::PostDeleted {
                    post_id: id,
                    actor: self.user.username.clone(),
                });
                Ok(())
            }
            Err(e) => {
                self.audit(AuditEventType::DeleteRolledBack {
                    post_id: id,
                    error: e.to_string(),
                    actor: self.user.username.clone(),
                });
                Err(e.into())
            }
        }
    }

    /// Recent audit events, newest first
    pub fn recent_audits(&self, limit: usize) -> CoreResult<Vec<AuditEvent>> {
        self.require("view the audit log", Permissions::VIEW)?;
        Ok(self.store.get_recent_audits(limit)?)
    }

    fn require(&self, action: &'static str, required: Permissions) -> CoreResult<()> {
        if self.user.can(required) {
            return Ok(());
        }
        warn!(
            username = %self.user.username,
            role = %self.user.role,
            action,
            "Permission denied"
        );
        Err(CoreError::PermissionDenied {
            action,
            role: self.user.role,
            required,
        })
    }

    fn audit(&self, event: AuditEventType) {
        if let Err(e) = self.store.append_audit(AuditEvent::new(event)) {
            warn!(error = %e, "Failed to record audit event");
        }
    }
}

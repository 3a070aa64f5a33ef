//! Login flow and saved session

use async_trait::async_trait;
use postdesk_api::{Credentials, User, UserRole};
use postdesk_config::{Account, Settings};
use postdesk_store::{AuditEvent, AuditEventType, Store};
use postdesk_util::{LoginRateLimiter, MonotonicInstant, RateLimitConfig, UserId, ceil_secs};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::{AuthError, CoreError, CoreResult, validate_login_form};

/// Checks credentials and says which role they grant
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, credentials: &Credentials) -> Result<UserRole, AuthError>;
}

/// Accounts known ahead of time, looked up by username ignoring case.
///
/// This stands in for an identity provider. It compares plain passwords
/// and is not a security boundary.
#[derive(Debug, Clone, Default)]
pub struct AccountDirectory {
    accounts: Vec<Account>,
}

impl AccountDirectory {
    pub fn new(accounts: Vec<Account>) -> Self {
        Self { accounts }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.accounts.clone())
    }

    /// The built-in demo accounts
    pub fn demo() -> Self {
        let account = |username: &str, password: &str, role| Account {
            username: username.to_string(),
            password: password.to_string(),
            role,
        };
        Self::new(vec![
            account("editor@test.com", "Editor123!", UserRole::Editor),
            account("viewer@test.com", "Viewer123!", UserRole::Viewer),
            account("admin@test.com", "Admin123!", UserRole::Editor),
        ])
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    fn find(&self, username: &str) -> Option<&Account> {
        self.accounts
            .iter()
            .find(|a| a.username.eq_ignore_ascii_case(username))
    }
}

#[async_trait]
impl Authenticator for AccountDirectory {
    async fn authenticate(&self, credentials: &Credentials) -> Result<UserRole, AuthError> {
        let account = self
            .find(&credentials.username)
            .ok_or(AuthError::UnknownAccount)?;

        if account.password != credentials.password {
            return Err(AuthError::IncorrectPassword);
        }

        Ok(account.role)
    }
}

/// Limiter state as shown next to a login form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoginStatus {
    pub blocked: bool,
    pub remaining_attempts: u32,
    pub time_until_reset: Duration,
}

/// Login, logout and the saved session.
///
/// One flow owns one limiter, so attempts are counted for as long as the
/// flow lives.
pub struct LoginFlow {
    authenticator: Arc<dyn Authenticator>,
    store: Arc<dyn Store>,
    limiter: LoginRateLimiter,
}

impl LoginFlow {
    pub fn new(
        authenticator: Arc<dyn Authenticator>,
        store: Arc<dyn Store>,
        limits: RateLimitConfig,
    ) -> Self {
        Self {
            authenticator,
            store,
            limiter: LoginRateLimiter::new(limits),
        }
    }

    pub fn status(&self, now: MonotonicInstant) -> LoginStatus {
        LoginStatus {
            blocked: self.limiter.is_blocked(now),
            remaining_attempts: self.limiter.remaining_attempts(now),
            time_until_reset: self.limiter.time_until_reset(now),
        }
    }

    /// Clear the attempt history and any block
    pub fn reset_rate_limit(&mut self) {
        self.limiter.reset();
    }

    /// Try to log in.
    ///
    /// Malformed forms are rejected without using up an attempt. A well
    /// formed submission counts against the limiter whether or not the
    /// credentials turn out to be right; success clears the count.
    pub async fn login(
        &mut self,
        credentials: &Credentials,
        now: MonotonicInstant,
    ) -> CoreResult<User> {
        if !self.limiter.can_attempt(now) {
            return Err(self.blocked(&credentials.username, now));
        }

        let credentials = validate_login_form(credentials)?;

        if !self.limiter.attempt(now) {
            return Err(self.blocked(&credentials.username, now));
        }

        let role = match self.authenticator.authenticate(&credentials).await {
            Ok(role) => role,
            Err(e) => {
                warn!(
                    username = %credentials.username,
                    reason = %e,
                    remaining_attempts = self.limiter.remaining_attempts(now),
                    "Login failed"
                );
                self.audit(AuditEventType::LoginFailed {
                    username: credentials.username.clone(),
                    reason: e.to_string(),
                });
                return Err(e.into());
            }
        };

        self.limiter.reset();

        let user = User {
            id: UserId::new(),
            username: credentials.username,
            role,
            logged_in_at: postdesk_util::now(),
        };
        self.store.save_session(&user)?;

        info!(username = %user.username, role = %user.role, "Logged in");
        self.audit(AuditEventType::LoginSucceeded {
            username: user.username.clone(),
            role,
        });

        Ok(user)
    }

    /// The user saved by a previous login, if any
    pub fn restore(&self) -> CoreResult<Option<User>> {
        let user = self.store.load_session()?;
        if let Some(user) = &user {
            debug!(username = %user.username, "Session restored");
        }
        Ok(user)
    }

    /// Forget the saved user, returning who was logged in
    pub fn logout(&self) -> CoreResult<Option<User>> {
        let user = self.store.load_session()?;
        self.store.clear_session()?;

        if let Some(user) = &user {
            info!(username = %user.username, "Logged out");
            self.audit(AuditEventType::LoggedOut {
                username: user.username.clone(),
            });
        }
        Ok(user)
    }

    fn blocked(&self, username: &str, now: MonotonicInstant) -> CoreError {
        let retry_after = self.limiter.time_until_reset(now);
        warn!(username = %username, retry_after_secs = ceil_secs(retry_after), "Login blocked");
        self.audit(AuditEventType::LoginBlocked {
            username: username.to_string(),
            retry_after_secs: ceil_secs(retry_after),
        });
        CoreError::RateLimited { retry_after }
    }

    fn audit(&self, event: AuditEventType) {
        if let Err(e) = self.store.append_audit(AuditEvent::new(event)) {
            warn!(error = %e, "Failed to record audit event");
        }
    }
}

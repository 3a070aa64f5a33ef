//! Core error type

use postdesk_api::{Permissions, UserRole};
use postdesk_remote::RemoteError;
use postdesk_store::StoreError;
use postdesk_util::ceil_secs;
use std::time::Duration;
use thiserror::Error;

use crate::FieldErrors;

/// Why a login was refused by the authenticator
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("No account found with this email address. Please check your email and try again.")]
    UnknownAccount,

    #[error("Incorrect password. Please check your password and try again.")]
    IncorrectPassword,
}

/// Errors from core operations
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Invalid input: {0}")]
    Invalid(FieldErrors),

    #[error("Permission denied: {role} users cannot {action}")]
    PermissionDenied {
        action: &'static str,
        role: UserRole,
        required: Permissions,
    },

    #[error("Not logged in")]
    NotAuthenticated,

    #[error("Too many failed attempts. Try again in {} seconds.", ceil_secs(*retry_after))]
    RateLimited { retry_after: Duration },

    #[error(transparent)]
    InvalidCredentials(#[from] AuthError),
}

impl From<FieldErrors> for CoreError {
    fn from(errors: FieldErrors) -> Self {
        CoreError::Invalid(errors)
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

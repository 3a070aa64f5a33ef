//! Configuration validation

use crate::schema::{RawAccount, RawConfig};
use postdesk_api::UserRole;
use std::collections::HashSet;
use thiserror::Error;

/// Validation error
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("Invalid base URL '{value}': {message}")]
    InvalidBaseUrl { value: String, message: String },

    #[error("{field} must be greater than zero")]
    ZeroValue { field: &'static str },

    #[error("Duplicate account: {0}")]
    DuplicateAccount(String),

    #[error("Account '{username}': {message}")]
    AccountError { username: String, message: String },
}

/// Validate a raw configuration, collecting every problem found
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if let Some(url) = &config.api.base_url {
        if let Err(message) = check_base_url(url) {
            errors.push(ValidationError::InvalidBaseUrl {
                value: url.clone(),
                message,
            });
        }
    }

    let non_zero = [
        ("api.timeout_seconds", config.api.timeout_seconds),
        ("login.max_attempts", config.login.max_attempts.map(u64::from)),
        ("login.window_seconds", config.login.window_seconds),
        ("login.block_seconds", config.login.block_seconds),
        ("table.page_size", config.table.page_size.map(|v| v as u64)),
    ];
    for (field, value) in non_zero {
        if value == Some(0) {
            errors.push(ValidationError::ZeroValue { field });
        }
    }

    let mut seen = HashSet::new();
    for account in &config.accounts {
        if !seen.insert(account.username.to_ascii_lowercase()) {
            errors.push(ValidationError::DuplicateAccount(account.username.clone()));
        }
        errors.extend(validate_account(account));
    }

    errors
}

fn validate_account(account: &RawAccount) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let error = |message: &str| ValidationError::AccountError {
        username: account.username.clone(),
        message: message.to_string(),
    };

    if account.username.trim().is_empty() {
        errors.push(error("username cannot be empty"));
    } else if account.username.chars().any(char::is_whitespace) {
        errors.push(error("username cannot contain whitespace"));
    }

    if account.password.is_empty() {
        errors.push(error("password cannot be empty"));
    }

    if let Err(e) = account.role.parse::<UserRole>() {
        errors.push(error(&e));
    }

    errors
}

/// Check that a base URL is absolute http(s) with a host
pub fn check_base_url(url: &str) -> Result<(), String> {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .ok_or_else(|| "scheme must be http or https".to_string())?;

    let host = rest.split('/').next().unwrap_or_default();
    if host.is_empty() {
        return Err("missing host".into());
    }

    Ok(())
}

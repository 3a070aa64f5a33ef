//! Validated settings structures

use crate::schema::{RawAccount, RawConfig};
use postdesk_api::UserRole;
use postdesk_util::{RateLimitConfig, data_dir_without_env};
use std::path::PathBuf;
use std::time::Duration;

/// Base URL used when none is configured
pub const DEFAULT_API_BASE_URL: &str = "https://jsonplaceholder.typicode.com";

/// Validated settings ready for use by the core
#[derive(Debug, Clone)]
pub struct Settings {
    pub api: ApiSettings,
    pub cache: CacheSettings,
    pub retry: RetrySettings,
    /// Login attempt limiter
    pub login: RateLimitConfig,
    pub table: TableSettings,
    pub storage: StorageSettings,
    pub accounts: Vec<Account>,
}

impl Settings {
    /// Convert from raw config (after validation)
    pub fn from_raw(raw: RawConfig) -> Self {
        let defaults = Settings::default();

        let api = ApiSettings {
            base_url: raw
                .api
                .base_url
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.api.base_url),
            timeout: raw
                .api
                .timeout_seconds
                .map(Duration::from_secs)
                .unwrap_or(defaults.api.timeout),
        };

        let cache = CacheSettings {
            stale_after: raw
                .cache
                .stale_seconds
                .map(Duration::from_secs)
                .unwrap_or(defaults.cache.stale_after),
        };

        let retry = RetrySettings {
            max_retries: raw.retry.max_retries.unwrap_or(defaults.retry.max_retries),
            base_delay: raw
                .retry
                .base_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.retry.base_delay),
        };

        // The cooldown follows the window unless set on its own
        let window = raw
            .login
            .window_seconds
            .map(Duration::from_secs)
            .unwrap_or(defaults.login.window);
        let block_duration = match (raw.login.block_seconds, raw.login.window_seconds) {
            (Some(secs), _) => Duration::from_secs(secs),
            (None, Some(_)) => window,
            (None, None) => defaults.login.block_duration,
        };
        let login = RateLimitConfig {
            max_attempts: raw.login.max_attempts.unwrap_or(defaults.login.max_attempts),
            window,
            block_duration,
        };

        let table = TableSettings {
            page_size: raw.table.page_size.unwrap_or(defaults.table.page_size),
        };

        let storage = StorageSettings {
            data_dir: raw.storage.data_dir.unwrap_or(defaults.storage.data_dir),
        };

        let accounts = raw.accounts.into_iter().filter_map(Account::from_raw).collect();

        Self {
            api,
            cache,
            retry,
            login,
            table,
            storage,
            accounts,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api: ApiSettings {
                base_url: DEFAULT_API_BASE_URL.to_string(),
                timeout: Duration::from_secs(10),
            },
            cache: CacheSettings {
                stale_after: Duration::from_secs(5 * 60),
            },
            retry: RetrySettings {
                max_retries: 2,
                base_delay: Duration::from_millis(250),
            },
            login: RateLimitConfig::default(),
            table: TableSettings { page_size: 10 },
            storage: StorageSettings {
                data_dir: data_dir_without_env(),
            },
            accounts: Vec::new(),
        }
    }
}

/// Remote API settings
#[derive(Debug, Clone)]
pub struct ApiSettings {
    /// Base URL without a trailing slash
    pub base_url: String,
    pub timeout: Duration,
}

/// Cache settings
#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub stale_after: Duration,
}

/// Read retry settings
#[derive(Debug, Clone)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub base_delay: Duration,
}

/// Table view settings
#[derive(Debug, Clone)]
pub struct TableSettings {
    pub page_size: usize,
}

/// Storage settings
#[derive(Debug, Clone)]
pub struct StorageSettings {
    pub data_dir: PathBuf,
}

/// An account allowed to log in
#[derive(Clone)]
pub struct Account {
    pub username: String,
    pub password: String,
    pub role: UserRole,
}

impl Account {
    fn from_raw(raw: RawAccount) -> Option<Self> {
        let role = raw.role.parse().ok()?;
        Some(Self {
            username: raw.username,
            password: raw.password,
            role,
        })
    }
}

impl std::fmt::Debug for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Account")
            .field("username", &self.username)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_config;

    #[test]
    fn defaults_applied() {
        let settings = parse_config("config_version = 1").unwrap();
        assert_eq!(settings.api.base_url, DEFAULT_API_BASE_URL);
        assert_eq!(settings.api.timeout, Duration::from_secs(10));
        assert_eq!(settings.cache.stale_after, Duration::from_secs(300));
        assert_eq!(settings.retry.max_retries, 2);
        assert_eq!(settings.login.max_attempts, 5);
        assert_eq!(settings.login.window, Duration::from_secs(900));
        assert_eq!(settings.login.block_duration, Duration::from_secs(300));
        assert_eq!(settings.table.page_size, 10);
    }

    #[test]
    fn block_follows_configured_window() {
        let settings = parse_config(
            r#"
            config_version = 1
            [login]
            window_seconds = 120
            "#,
        )
        .unwrap();
        assert_eq!(settings.login.window, Duration::from_secs(120));
        assert_eq!(settings.login.block_duration, Duration::from_secs(120));
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let settings = parse_config(
            r#"
            config_version = 1
            [api]
            base_url = "http://localhost:3000/"
            "#,
        )
        .unwrap();
        assert_eq!(settings.api.base_url, "http://localhost:3000");
    }

    #[test]
    fn accounts_resolved() {
        let settings = parse_config(
            r#"
            config_version = 1
            [[accounts]]
            username = "Editor@Example.com"
            password = "Editor123!"
            role = "editor"
            "#,
        )
        .unwrap();

        let account = &settings.accounts[0];
        assert_eq!(account.username, "Editor@Example.com");
        assert_eq!(account.role, UserRole::Editor);
    }

    #[test]
    fn account_debug_hides_password() {
        let account = Account {
            username: "editor@example.com".into(),
            password: "Editor123!".into(),
            role: UserRole::Editor,
        };
        assert!(!format!("{:?}", account).contains("Editor123!"));
    }
}

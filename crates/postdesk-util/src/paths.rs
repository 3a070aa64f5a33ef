//! Default paths for postdesk
//!
//! Paths are user-writable by default:
//! - Config: `$XDG_CONFIG_HOME/postdesk/config.toml` or `~/.config/postdesk/config.toml`
//! - Data: `$XDG_DATA_HOME/postdesk` or `~/.local/share/postdesk`

use std::path::PathBuf;

/// Environment variable for overriding the config file path
pub const POSTDESK_CONFIG_ENV: &str = "POSTDESK_CONFIG";

/// Environment variable for overriding the data directory
pub const POSTDESK_DATA_DIR_ENV: &str = "POSTDESK_DATA_DIR";

/// Application subdirectory name
const APP_DIR: &str = "postdesk";

/// Config filename within the config directory
const CONFIG_FILENAME: &str = "config.toml";

/// Get the default config file path.
///
/// Order of precedence:
/// 1. `$XDG_CONFIG_HOME/postdesk/config.toml` (if XDG_CONFIG_HOME is set)
/// 2. `~/.config/postdesk/config.toml` (fallback)
///
/// `$POSTDESK_CONFIG` is handled by the CLI argument parser.
pub fn default_config_path() -> PathBuf {
    if let Ok(config_home) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(config_home).join(APP_DIR).join(CONFIG_FILENAME);
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".config")
            .join(APP_DIR)
            .join(CONFIG_FILENAME);
    }

    PathBuf::from("/tmp").join(APP_DIR).join(CONFIG_FILENAME)
}

/// Get the default data directory.
///
/// Order of precedence:
/// 1. `$XDG_DATA_HOME/postdesk` (if XDG_DATA_HOME is set)
/// 2. `~/.local/share/postdesk` (fallback)
///
/// `$POSTDESK_DATA_DIR` is handled by the CLI argument parser.
pub fn data_dir_without_env() -> PathBuf {
    if let Ok(data_home) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(data_home).join(APP_DIR);
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".local")
            .join("share")
            .join(APP_DIR);
    }

    // Last resort
    PathBuf::from("/tmp").join(APP_DIR).join("data")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_path_ends_with_config_toml() {
        let path = default_config_path();
        assert!(path.ends_with("postdesk/config.toml"));
    }

    #[test]
    fn data_dir_contains_postdesk() {
        let path = data_dir_without_env();
        assert!(path.to_string_lossy().contains("postdesk"));
    }
}

//! Config validation CLI tool
//!
//! Validates a postdesk configuration file and reports any errors.

use postdesk_util::default_config_path;
use std::path::PathBuf;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    let config_path = match args.get(1) {
        Some(path) => PathBuf::from(path),
        None => {
            let default_path = default_config_path();
            eprintln!("Usage: validate-config [config-file]");
            eprintln!();
            eprintln!("Validates a postdesk configuration file.");
            eprintln!();
            eprintln!("Example:");
            eprintln!("  validate-config {}", default_path.display());
            return ExitCode::from(2);
        }
    };

    if !config_path.exists() {
        eprintln!("Error: Configuration file not found: {}", config_path.display());
        return ExitCode::from(1);
    }

    match postdesk_config::load_config(&config_path) {
        Ok(settings) => {
            println!("✓ Configuration is valid");
            println!();
            println!("Summary:");
            println!("  Config version: {}", postdesk_config::CURRENT_CONFIG_VERSION);
            println!("  API: {}", settings.api.base_url);
            println!(
                "  Login limit: {} attempts per {}, {} cooldown",
                settings.login.max_attempts,
                postdesk_util::format_duration(settings.login.window),
                postdesk_util::format_duration(settings.login.block_duration),
            );
            println!("  Page size: {}", settings.table.page_size);
            println!("  Accounts: {}", settings.accounts.len());

            if !settings.accounts.is_empty() {
                println!();
                println!("Accounts:");
                for account in &settings.accounts {
                    println!("  - {} [{}]", account.username, account.role);
                }
            }

            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed");
            eprintln!();
            match &e {
                postdesk_config::ConfigError::ReadError(io_err) => {
                    eprintln!("Failed to read file: {}", io_err);
                }
                postdesk_config::ConfigError::ParseError(parse_err) => {
                    eprintln!("TOML parse error:");
                    eprintln!("  {}", parse_err);
                }
                postdesk_config::ConfigError::ValidationFailed { errors } => {
                    eprintln!("Validation errors ({}):", errors.len());
                    for err in errors {
                        eprintln!("  - {}", err);
                    }
                }
                postdesk_config::ConfigError::UnsupportedVersion(ver) => {
                    eprintln!(
                        "Unsupported config version: {} (expected {})",
                        ver,
                        postdesk_config::CURRENT_CONFIG_VERSION
                    );
                }
            }
            ExitCode::from(1)
        }
    }
}

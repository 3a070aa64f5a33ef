//! postdeskctl - command-line front end for postdesk
//!
//! Wires together:
//! - Configuration loading
//! - Store initialization (audit log, saved session)
//! - The HTTP posts client and the mutation reconciler
//! - Login flow and the role-gated dashboard

mod commands;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use postdesk_api::PostRecord;
use postdesk_config::{Settings, check_base_url, load_config};
use postdesk_core::{AccountDirectory, CoreError, Dashboard, LoginFlow, PostsReconciler, SortKey};
use postdesk_remote::HttpPostsClient;
use postdesk_store::{MemoryCache, SqliteStore, Store};
use postdesk_util::{POSTDESK_CONFIG_ENV, POSTDESK_DATA_DIR_ENV, default_config_path};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Environment variable overriding the remote API base URL
const POSTDESK_API_BASE_URL_ENV: &str = "POSTDESK_API_BASE_URL";

/// postdeskctl - browse and edit posts from a remote collection
#[derive(Parser, Debug)]
#[command(name = "postdeskctl")]
#[command(about = "Browse and edit posts from a remote collection", long_about = None)]
struct Args {
    /// Configuration file path (default: ~/.config/postdesk/config.toml)
    #[arg(short, long, env = POSTDESK_CONFIG_ENV, default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Remote API base URL override
    #[arg(long, env = POSTDESK_API_BASE_URL_ENV)]
    api_base_url: Option<String>,

    /// Data directory override
    #[arg(short, long, env = POSTDESK_DATA_DIR_ENV)]
    data_dir: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in. Passwords are read from --password or one per line on stdin
    Login {
        username: String,

        #[arg(short, long, env = "POSTDESK_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Forget the saved login
    Logout,

    /// Show the logged-in user
    Whoami,

    /// List posts
    List {
        /// Case-insensitive search over title, body, id and user id
        #[arg(short, long, default_value = "")]
        search: String,

        /// Sort column: id, user_id, title or body
        #[arg(long, default_value = "id")]
        sort: SortKey,

        /// Sort descending
        #[arg(long)]
        desc: bool,

        /// Page number, starting at 1
        #[arg(short, long, default_value_t = 1)]
        page: usize,

        /// Rows per page (default from config)
        #[arg(long)]
        page_size: Option<usize>,

        /// Refetch instead of using cached data
        #[arg(long)]
        refresh: bool,
    },

    /// Show one post
    Show { id: i64 },

    /// Create a post
    Create {
        #[arg(long)]
        user_id: String,

        #[arg(long)]
        title: String,

        #[arg(long)]
        body: String,
    },

    /// Update a post; fields left out keep their current value
    Update {
        id: i64,

        #[arg(long)]
        user_id: Option<String>,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        body: Option<String>,
    },

    /// Delete a post
    Delete { id: i64 },

    /// Show recent audit events
    Audit {
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,
    },
}

/// Everything a command needs
struct App {
    settings: Settings,
    store: Arc<dyn Store>,
    reconciler: Arc<PostsReconciler>,
}

impl App {
    fn new(args: &Args) -> Result<Self> {
        let mut settings = if args.config.exists() {
            let settings = load_config(&args.config)
                .with_context(|| format!("Failed to load config from {:?}", args.config))?;
            info!(
                config_path = %args.config.display(),
                account_count = settings.accounts.len(),
                "Configuration loaded"
            );
            settings
        } else {
            debug!(config_path = %args.config.display(), "No config file, using defaults");
            Settings::default()
        };

        if let Some(url) = &args.api_base_url {
            check_base_url(url).map_err(|e| anyhow!("Invalid API base URL '{}': {}", url, e))?;
            settings.api.base_url = url.trim_end_matches('/').to_string();
        }

        let data_dir = args
            .data_dir
            .clone()
            .unwrap_or_else(|| settings.storage.data_dir.clone());
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory {:?}", data_dir))?;

        let db_path = data_dir.join("postdesk.db");
        let store: Arc<dyn Store> = Arc::new(
            SqliteStore::open(&db_path)
                .with_context(|| format!("Failed to open database {:?}", db_path))?,
        );
        debug!(db_path = %db_path.display(), "Store initialized");

        let remote = HttpPostsClient::new(&settings.api.base_url, settings.api.timeout)
            .context("Failed to create HTTP client")?;
        debug!(base_url = %remote.base_url(), "Remote client ready");

        let cache: Arc<MemoryCache<Vec<PostRecord>>> = Arc::new(MemoryCache::new());
        let reconciler =
            Arc::new(PostsReconciler::new(Arc::new(remote), cache).with_settings(&settings));

        Ok(Self {
            settings,
            store,
            reconciler,
        })
    }

    fn login_flow(&self) -> LoginFlow {
        let directory = if self.settings.accounts.is_empty() {
            warn!("No accounts configured, using the demo accounts");
            AccountDirectory::demo()
        } else {
            AccountDirectory::from_settings(&self.settings)
        };
        LoginFlow::new(
            Arc::new(directory),
            self.store.clone(),
            self.settings.login.clone(),
        )
    }

    /// Dashboard for the saved user
    fn dashboard(&self) -> Result<Dashboard> {
        let user = self
            .login_flow()
            .restore()?
            .ok_or(CoreError::NotAuthenticated)
            .context("Run `postdeskctl login <username>` first")?;

        Ok(
            Dashboard::new(self.reconciler.clone(), self.store.clone(), user)
                .with_page_size(self.settings.table.page_size),
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    debug!(version = env!("CARGO_PKG_VERSION"), "postdeskctl starting");
    if postdesk_util::is_mock_time_active() {
        warn!("Mock time is active, audit and session timestamps are shifted");
    }

    let app = App::new(&args)?;
    commands::run(&app, args.command).await
}

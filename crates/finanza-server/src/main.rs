//! Finanza - personal finance tracker server
//!
//! Usage:
//!   finanza                          Local mode, data in the platform data dir
//!   finanza --database finanza.db    Cloud mode with sign-in
//!   finanza --static-dir ui/dist     Also serve the front-end bundle

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use finanza_core::config::default_data_dir;
use finanza_core::AppConfig;
use finanza_server::ServerConfig;

/// Finanza - track income and expenses, get AI spending tips
#[derive(Parser)]
#[command(name = "finanza")]
#[command(about = "Personal finance tracker with AI insights", long_about = None)]
#[command(version)]
struct Cli {
    /// Port to listen on
    #[arg(short, long, default_value = "3000", env = "FINANZA_PORT")]
    port: u16,

    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1", env = "FINANZA_HOST")]
    host: String,

    /// Data directory (local slot and config.toml)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// SQLite database path; enables cloud mode with sign-in
    ///
    /// Overrides FINANZA_DB and the [storage] section of config.toml.
    /// Set FINANZA_DB_KEY to encrypt the database.
    #[arg(long)]
    database: Option<PathBuf>,

    /// Start local mode with an empty list instead of the demo transactions
    #[arg(long)]
    no_seed: bool,

    /// Directory containing static files to serve (e.g., ui/dist)
    #[arg(long)]
    static_dir: Option<PathBuf>,

    /// Allowed CORS origin (repeatable)
    #[arg(long = "allow-origin")]
    allowed_origins: Vec<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    let data_dir = cli.data_dir.clone().unwrap_or_else(default_data_dir);
    let mut config = AppConfig::load_from(&data_dir)
        .with_context(|| format!("Failed to load configuration from {}", data_dir.display()))?;
    if let Some(database) = cli.database {
        config.database = Some(database);
    }
    if cli.no_seed {
        config.seed_demo_data = false;
    }

    info!(
        data_dir = %config.data_dir.display(),
        ai_backend = %config.ai_backend,
        "Configuration loaded"
    );

    let static_dir = cli
        .static_dir
        .as_ref()
        .map(|p| p.to_string_lossy().into_owned());
    let server_config = ServerConfig {
        allowed_origins: cli.allowed_origins,
    };

    finanza_server::serve(
        &config,
        &cli.host,
        cli.port,
        static_dir.as_deref(),
        server_config,
    )
    .await
}

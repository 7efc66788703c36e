//! # cloudsync
//!
//! CLI tool for exercising cloudsync sessions.
//!
//! ## Commands
//!
//! - `simulate`: Run a session against an in-memory remote store
//! - `config`: Print the effective configuration
//!
//! ## Example
//!
//! ```bash
//! # Save 50 records through a store that only takes 8 per batch
//! cloudsync simulate --records 50 --batch-limit 8
//!
//! # Watch retries and splits as they happen
//! cloudsync -vv simulate --records 20 --batch-limit 4 --transient-failures 2
//!
//! # Show the configuration a session would use
//! cloudsync --config cloudsync.toml config
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cloudsync_session::SessionConfig;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

mod commands;
mod remote;

use commands::{config, simulate};

/// CLI tool for exercising cloudsync sessions.
#[derive(Parser, Debug)]
#[command(name = "cloudsync")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Session configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Save records through a simulated remote store, then fetch them back
    Simulate {
        /// Number of records to save
        #[arg(long, default_value = "100")]
        records: usize,

        /// Largest batch the remote store accepts
        #[arg(long, default_value = "25")]
        batch_limit: usize,

        /// Number of remote calls that fail transiently before the store answers
        #[arg(long, default_value = "0")]
        transient_failures: usize,

        /// Reject every call as if no account were signed in
        #[arg(long)]
        unauthenticated: bool,

        /// Seconds to wait for the session to settle
        #[arg(long, default_value = "120")]
        timeout: u64,
    },

    /// Print the effective configuration as TOML
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let session_config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Simulate {
            records,
            batch_limit,
            transient_failures,
            unauthenticated,
            timeout,
        } => {
            if batch_limit == 0 {
                anyhow::bail!("--batch-limit must be at least 1");
            }
            let options = simulate::Options {
                records,
                batch_limit,
                transient_failures,
                unauthenticated,
                timeout: Duration::from_secs(timeout),
            };
            simulate::run(session_config, options).await?;
        }
        Commands::Config => {
            config::run(&session_config)?;
        }
    }

    Ok(())
}

/// Log to stderr. `RUST_LOG` overrides the `-v` level.
fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Load the session configuration, or the defaults when no file is given.
fn load_config(path: Option<&Path>) -> Result<SessionConfig> {
    match path {
        Some(path) => SessionConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Ok(SessionConfig::default()),
    }
}

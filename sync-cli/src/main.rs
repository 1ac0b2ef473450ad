//! # lanchat
//!
//! CLI tool for exercising the LAN chat sync layer.
//!
//! ## Commands
//!
//! - `init`: Write a default configuration file
//! - `replay`: Bootstrap a session against a scripted backend and print the
//!   resulting model
//!
//! ## Example
//!
//! ```bash
//! # Write lanchat.toml into the data directory
//! lanchat init --username alice --display-name "Alice A"
//!
//! # Replay a script of snapshots and push events
//! lanchat replay session.json
//!
//! # Same, as JSON, with client debug logs
//! RUST_LOG=lanchat_sync_client=debug lanchat replay session.json --json
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod config;

use commands::{init, replay};
use config::{Config, CONFIG_FILE_NAME};

/// CLI tool for exercising the LAN chat sync layer.
#[derive(Parser, Debug)]
#[command(name = "lanchat")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Data directory holding lanchat.toml
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Config file (default: <data-dir>/lanchat.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,

        /// Username to record
        #[arg(long)]
        username: Option<String>,

        /// Display name to record
        #[arg(long)]
        display_name: Option<String>,
    },

    /// Replay a JSON script against a mock backend
    Replay {
        /// Script file
        script: PathBuf,

        /// Print the resulting model as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Determine data directory
    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => default_data_dir()?,
    };
    let config_path = cli
        .config
        .unwrap_or_else(|| data_dir.join(CONFIG_FILE_NAME));

    match cli.command {
        Commands::Init {
            force,
            username,
            display_name,
        } => {
            setup_logging(cli.verbose, &Config::default());

            init::run(
                &config_path,
                force,
                username.as_deref(),
                display_name.as_deref(),
            )?;
        }
        Commands::Replay { script, json } => {
            let config = Config::load_or_default(&config_path)?;
            setup_logging(cli.verbose, &config);
            replay::run(&config, &script, json).await?;
        }
    }

    Ok(())
}

/// Install the `tracing` subscriber.
///
/// `RUST_LOG` wins, then `-v` flags, then the config file's filter.
fn setup_logging(verbosity: u8, config: &Config) {
    let filter = match verbosity {
        0 => config.logging.filter.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Get the default data directory for lanchat.
fn default_data_dir() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("io", "lanchat", "lanchat")
        .context("Could not determine home directory")?;
    Ok(dirs.data_dir().to_path_buf())
}

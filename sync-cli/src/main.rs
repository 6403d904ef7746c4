//! # syncpad
//!
//! Command-line host and viewer for SyncPad.
//!
//! ## Commands
//!
//! - `host`: Share local files and stream their edits to viewers
//! - `view`: Connect to a host and mirror its files
//!
//! ## Example
//!
//! ```bash
//! # Share two files on the default port
//! syncpad host notes.md src/main.rs
//!
//! # On another machine, mirror them into ./mirror
//! syncpad view 192.168.1.10:8080 --out ./mirror
//! ```
//!
//! Set `RUST_LOG=debug` for protocol-level logging.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{host, view};

/// Command-line host and viewer for SyncPad.
#[derive(Parser, Debug)]
#[command(name = "syncpad")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Share files with viewers
    Host {
        /// Configuration file (TOML)
        #[arg(long, short)]
        config: Option<PathBuf>,

        /// Bind address, overriding the configuration file
        #[arg(long, short)]
        bind: Option<String>,

        /// Files to share
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Mirror a host's files
    View {
        /// Host address (host:port)
        address: String,

        /// Directory to write mirrored files into
        #[arg(long, short)]
        out: Option<PathBuf>,

        /// Seconds to wait for the host to accept the connection
        #[arg(long, default_value = "10")]
        connect_timeout: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries user-facing output
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Host {
            config,
            bind,
            files,
        } => {
            host::run(config.as_deref(), bind, &files).await?;
        }
        Commands::View {
            address,
            out,
            connect_timeout,
        } => {
            let timeout = Duration::from_secs(connect_timeout);
            view::run(&address, out.as_deref(), timeout).await?;
        }
    }

    Ok(())
}

//! quire — incremental static blog publisher.
//!
//! # Usage
//!
//! ```text
//! quire publish [--config quire.yaml] [--source .] [--dry-run] [--concurrency N]
//! quire fingerprint <FILE>...
//! ```
//!
//! Exit status of `publish`: 0 when everything was published, 2 when the run
//! completed with item failures, 1 when it aborted.

mod commands;

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use commands::{fingerprint::FingerprintArgs, publish::PublishArgs};

#[derive(Parser, Debug)]
#[command(
    name = "quire",
    version,
    about = "Publish a markdown blog to an object store, uploading only what changed",
    long_about = None,
)]
struct Cli {
    /// Log at debug level (overridden by RUST_LOG).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Render the site and upload changed pages, assets and the feed.
    Publish(PublishArgs),

    /// Print the store-compatible fingerprint of local files.
    Fingerprint(FingerprintArgs),
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("cannot start async runtime")?;

    runtime.block_on(async move {
        match cli.command {
            Commands::Publish(args) => args.run().await,
            Commands::Fingerprint(args) => args.run().await,
        }
    })
}

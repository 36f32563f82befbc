//! vmclaim
//!
//! Polls OCI until the requested instance is created. See `vmclaim --help`
//! for the available modes; with no subcommand it serves the status page and
//! runs the retry loop in the background.

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use vmclaim_provisioner::{cli::Cli, config::ServerConfig};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // A missing .env file is fine; real deployments set the environment.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let server = ServerConfig::from_env()?;

    // Initialize tracing (prefer RUST_LOG, fallback to VMCLAIM_LOG_LEVEL)
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| server.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "Starting vmclaim");

    cli.run(server).await
}

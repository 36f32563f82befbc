//! Command-line entry points.

use std::future::Future;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::api;
use crate::config::{Config, ServerConfig};
use crate::notify::{NotificationSink, TelegramNotifier};
use crate::provider::{OciProvisioner, Provisioner};
use crate::state::{ConfigSummary, StatusBoard};
use crate::worker::{LoopOutcome, RetryLoop};

/// Keep asking OCI for a capacity-constrained instance until it says yes.
#[derive(Debug, Parser)]
#[command(name = "vmclaim", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, PartialEq, Eq)]
pub enum Command {
    /// Run the retry loop behind an HTTP status page (default).
    Serve,

    /// Run the retry loop in the foreground and exit once the instance exists.
    Run,

    /// Check configuration and credentials without creating anything.
    #[command(alias = "dry-run")]
    Validate,

    /// Send one test notification.
    TestNotify,
}

impl Cli {
    pub async fn run(self, server: ServerConfig) -> Result<ExitCode> {
        match self.command.unwrap_or(Command::Serve) {
            Command::Serve => serve(server, env_lookup, ctrl_c()).await,
            Command::Run => run_foreground(env_lookup).await,
            Command::Validate => validate(env_lookup).await,
            Command::TestNotify => test_notify(env_lookup).await,
        }
    }
}

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}

/// Load and check provisioning config, printing a friendly error on failure.
fn load_config<F>(lookup: F) -> Option<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let config = Config::from_lookup(lookup).and_then(|config| {
        config.validate()?;
        Ok(config)
    });

    match config {
        Ok(config) => Some(config),
        Err(e) => {
            report_config_error(&e);
            None
        }
    }
}

fn report_config_error(e: &dyn std::fmt::Display) {
    eprintln!("{} {}", "Configuration error:".red().bold(), e);
    eprintln!(
        "\n{}",
        "Hint: check your .env file and make sure all required variables are set.".yellow()
    );
}

fn build_clients(config: &Config) -> Result<(Arc<dyn Provisioner>, Arc<dyn NotificationSink>)> {
    let provisioner = OciProvisioner::new(config).context("Failed to initialise OCI client")?;
    let notifier = TelegramNotifier::new(&config.telegram);
    Ok((Arc::new(provisioner), Arc::new(notifier)))
}

/// Prepare the retry loop for service mode.
///
/// Any config or client error moves `board` to the error state and yields
/// `None`; the caller keeps serving the status page either way.
pub fn bootstrap<F>(board: &Arc<StatusBoard>, lookup: F) -> Option<RetryLoop>
where
    F: Fn(&str) -> Option<String>,
{
    let clients = Config::from_lookup(lookup)
        .and_then(|config| {
            config.validate()?;
            Ok(config)
        })
        .map_err(anyhow::Error::from)
        .and_then(|config| build_clients(&config).map(|clients| (config, clients)));

    match clients {
        Ok((config, (provisioner, notifier))) => {
            board.set_config_summary(ConfigSummary::from(&config));
            Some(RetryLoop::new(
                provisioner,
                notifier,
                Arc::clone(board),
                config.retry_interval,
            ))
        }
        Err(e) => {
            error!(error = %format!("{e:#}"), "Startup failed; serving error status only");
            board.fail(format!("Configuration error: {e:#}"));
            None
        }
    }
}

/// Serve until `signal` resolves, then drain the HTTP server and the retry
/// loop before returning.
async fn serve<F, S>(server: ServerConfig, lookup: F, signal: S) -> Result<ExitCode>
where
    F: Fn(&str) -> Option<String>,
    S: Future<Output = ()>,
{
    let board = Arc::new(StatusBoard::new());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let loop_task = bootstrap(&board, lookup).map(|retry_loop| {
        let handle = retry_loop.spawn(shutdown_rx.clone());
        tokio::spawn(async move {
            match handle.await {
                Ok(outcome) => log_outcome(&outcome),
                Err(e) => error!(error = %e, "Retry loop task panicked"),
            }
        })
    });

    let app = api::create_router(Arc::clone(&board));
    let listener = tokio::net::TcpListener::bind(server.listen_addr).await?;
    info!(addr = %server.listen_addr, "Listening for connections");

    let mut server_handle = tokio::spawn(async move {
        let mut shutdown_rx = shutdown_rx;
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.wait_for(|stop| *stop).await;
                info!("HTTP server shutting down");
            })
            .await
    });

    tokio::select! {
        _ = signal => {
            info!("Received shutdown signal");
            let _ = shutdown_tx.send(true);
            log_server_exit(server_handle.await);
        }
        result = &mut server_handle => {
            log_server_exit(result);
            let _ = shutdown_tx.send(true);
        }
    }

    if let Some(task) = loop_task {
        if let Err(e) = task.await {
            error!(error = %e, "Retry loop watcher panicked");
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn log_server_exit(result: Result<std::io::Result<()>, tokio::task::JoinError>) {
    match result {
        Ok(Ok(())) => info!("Server exited normally"),
        Ok(Err(e)) => error!(error = %e, "Server error"),
        Err(e) => error!(error = %e, "Server task panicked"),
    }
}

async fn run_foreground<F>(lookup: F) -> Result<ExitCode>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(config) = load_config(lookup) else {
        return Ok(ExitCode::FAILURE);
    };
    let (provisioner, notifier) = build_clients(&config)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal");
            let _ = shutdown_tx.send(true);
        }
    });

    let board = Arc::new(StatusBoard::new());
    board.set_config_summary(ConfigSummary::from(&config));
    let outcome = RetryLoop::new(provisioner, notifier, board, config.retry_interval)
        .run(shutdown_rx)
        .await;
    log_outcome(&outcome);

    Ok(match outcome {
        LoopOutcome::Created(_) | LoopOutcome::Interrupted => ExitCode::SUCCESS,
        LoopOutcome::Failed(_) => ExitCode::FAILURE,
    })
}

async fn validate<F>(lookup: F) -> Result<ExitCode>
where
    F: Fn(&str) -> Option<String>,
{
    println!("Validating configuration...");
    let Some(config) = load_config(lookup) else {
        return Ok(ExitCode::FAILURE);
    };
    println!("{}", "✅ Configuration validated".green());

    println!("Validating OCI credentials...");
    let (provisioner, _) = build_clients(&config)?;
    if !provisioner.validate_credentials().await {
        eprintln!("{}", "❌ OCI credential validation failed".red().bold());
        return Ok(ExitCode::FAILURE);
    }
    println!("{}", "✅ OCI credentials validated".green());

    let summary = ConfigSummary::from(&config);
    println!("\n{}", "Configuration summary:".bold());
    println!("  Region:              {}", summary.region);
    println!("  Availability Domain: {}", summary.availability_domain);
    println!("  Instance Name:       {}", summary.instance_name);
    println!("  Shape:               {}", summary.shape);
    println!("  OCPUs:               {}", summary.ocpus);
    println!("  Memory:              {} GB", summary.memory_gb);
    println!("  Retry Interval:      {}s", summary.retry_interval_secs);

    Ok(ExitCode::SUCCESS)
}

/// Only the Telegram settings matter here, so the OCI checks in
/// `Config::validate` are skipped.
async fn test_notify<F>(lookup: F) -> Result<ExitCode>
where
    F: Fn(&str) -> Option<String>,
{
    let config = match Config::from_lookup(lookup) {
        Ok(config) => config,
        Err(e) => {
            report_config_error(&e);
            return Ok(ExitCode::FAILURE);
        }
    };

    let notifier = TelegramNotifier::new(&config.telegram);
    let delivered = notifier
        .notify(
            "🧪 Test notification from Instance Auto-Register!\n\n\
             If you see this message, your Telegram configuration is correct.",
        )
        .await;

    if delivered {
        println!("{}", "✅ Test notification sent".green());
        Ok(ExitCode::SUCCESS)
    } else {
        eprintln!(
            "{}",
            "❌ Failed to send test notification. Check the bot token and chat id."
                .red()
                .bold()
        );
        Ok(ExitCode::FAILURE)
    }
}

fn log_outcome(outcome: &LoopOutcome) {
    match outcome {
        LoopOutcome::Created(instance) => info!(
            instance_id = %instance.id,
            public_ip = %instance.public_ip,
            "Retry loop finished: instance created"
        ),
        LoopOutcome::Failed(reason) => error!(reason = %reason, "Retry loop failed to start"),
        LoopOutcome::Interrupted => warn!("Retry loop interrupted before success"),
    }
}

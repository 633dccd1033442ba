mod api;
mod cli;
mod commands;
mod config;
mod console;

use std::process::ExitCode;

use anyhow::{Context as _, Result};
use clap::Parser;
use colored::Colorize;
use credential_store::CredentialStore;
use tokio::sync::broadcast;
use tracing::info;

use crate::cli::{Cli, Command};
use crate::commands::Context;
use crate::config::LoggingConfig;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => {
            tracing::error!(error = %format!("{err:#}"), "fatal error");
            eprintln!("{} {err:#}", "\n✗ Error:".red().bold());
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<ExitCode> {
    // 1. `.env` first so WS_URL / API_URL can come from it.
    let _ = dotenvy::dotenv();

    // 2. Parse CLI args.
    let cli = Cli::parse();

    // 3. Load config, then merge environment overrides.
    let (mut cfg, source) = config::resolve(cli.config.clone())?;
    cfg.apply_env(|key| std::env::var(key).ok());

    // 4. Logging goes to stderr; stdout belongs to the console renderer.
    init_tracing(&cfg.logging);
    source.log();

    let credentials = match cli.credentials.clone() {
        Some(path) => CredentialStore::new(path),
        None => CredentialStore::default_location()
            .context("cannot locate home directory for the credential file")?,
    };

    info!(
        relay = %cfg.relay.url,
        api = %cfg.api.url,
        credentials = %credentials.path().display(),
        "hooktunnel starting"
    );

    let ctx = Context {
        config: cfg,
        credentials,
    };

    match cli.command {
        Command::Login(args) => commands::login::run(args, &ctx).await,
        Command::List => commands::list::run(&ctx).await,
        Command::Connect(args) => {
            let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);
            spawn_signal_listener(shutdown_tx);
            commands::connect::run(args, &ctx, shutdown_rx).await
        }
    }
}

fn init_tracing(logging: &LoggingConfig) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));

    if logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
}

/// Broadcast a shutdown on ctrl-c or SIGTERM.
fn spawn_signal_listener(shutdown_tx: broadcast::Sender<()>) {
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = ctrl_c => info!("received SIGINT (ctrl-c)"),
                        _ = sigterm.recv() => info!("received SIGTERM"),
                    }
                }
                Err(err) => {
                    tracing::warn!(%err, "failed to register SIGTERM handler");
                    ctrl_c.await.ok();
                    info!("received SIGINT (ctrl-c)");
                }
            }
        }

        #[cfg(not(unix))]
        {
            ctrl_c.await.ok();
            info!("received SIGINT (ctrl-c)");
        }

        let _ = shutdown_tx.send(());
    });
}

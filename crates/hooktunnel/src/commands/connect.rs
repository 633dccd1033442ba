use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use colored::Colorize;
use local_forwarder::{ForwardTarget, Forwarder, ForwarderConfig};
use tokio::sync::broadcast;
use tunnel_session::{Dispatcher, Session, SessionConfig, SessionObserver};

use crate::cli::ConnectArgs;
use crate::commands::{load_credentials, Context};
use crate::console::ConsoleObserver;

/// Connect to the relay and forward until the connection closes.
///
/// Exits 0 when the connection closes (remotely or on operator interrupt)
/// and 1 on a precondition or connection failure.
pub async fn run(
    args: ConnectArgs,
    ctx: &Context,
    shutdown_rx: broadcast::Receiver<()>,
) -> Result<ExitCode> {
    println!("{}", "Connecting to hooktunnel...".dimmed());

    let Some(record) = load_credentials(&ctx.credentials)? else {
        return Ok(ExitCode::FAILURE);
    };

    let host = args
        .host
        .or_else(|| Some(ctx.config.forward.default_host.clone()));
    let target = ForwardTarget::new(host, args.port, args.target);
    let forwarder = Forwarder::new(ForwarderConfig {
        target,
        timeout: ctx.config.forward.timeout(),
    })
    .context("failed to set up local forwarder")?;

    let observer: Arc<dyn SessionObserver> =
        Arc::new(ConsoleObserver::new(record.user.display_name()));

    let dispatcher = Dispatcher::new(forwarder, observer.clone())
        .with_credentials(ctx.credentials.clone())
        .with_settings(&record.user.settings());

    let relay = &ctx.config.relay;
    let mut config = SessionConfig::new(&relay.url, &record.user.id, &record.api_key)
        .with_endpoint(args.endpoint);
    config.ping_interval = relay.ping_interval();
    config.stats_interval = relay.stats_interval();
    config.close_timeout = relay.close_timeout();

    let mut session = Session::new(config, dispatcher, observer, shutdown_rx);
    match session.run().await {
        Ok(end) => {
            tracing::info!(
                code = ?end.close.code,
                interrupted = end.close.interrupted,
                "session ended"
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            tracing::error!(%err, state = ?session.state(), "session failed");
            Ok(ExitCode::FAILURE)
        }
    }
}

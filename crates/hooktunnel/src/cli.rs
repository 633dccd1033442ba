use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const QUICK_START: &str = "\
Quick start:
  1. Authenticate:        hooktunnel login
  2. Start forwarding:    hooktunnel connect
  3. Send webhooks to:    https://hooktunnel.dev/r/<user-id>/<endpoint>

Examples:
  hooktunnel connect --port 8080
  hooktunnel connect --endpoint stripe-webhooks --port 3000
  hooktunnel connect --endpoint stripe-webhooks --target custom-url-webhook --port 3000";

#[derive(Parser, Debug)]
#[command(
    name = "hooktunnel",
    version,
    about = "Forward webhooks to your localhost",
    after_help = QUICK_START
)]
pub struct Cli {
    /// Path to the agent configuration file (defaults to ~/.hooktunnel/agent.yaml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to the credential file (defaults to ~/.hooktunnel/config.json)
    #[arg(long, global = true)]
    pub credentials: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Authenticate with hooktunnel
    Login(LoginArgs),

    /// Connect to hooktunnel and forward webhooks to localhost
    Connect(ConnectArgs),

    /// List available endpoints
    List,
}

#[derive(Args, Debug, Default)]
pub struct LoginArgs {
    /// API key to use instead of prompting for one
    #[arg(long)]
    pub api_key: Option<String>,
}

#[derive(Args, Debug, Default)]
pub struct ConnectArgs {
    /// Port to forward webhooks to
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Listen to this endpoint only
    #[arg(short, long)]
    pub endpoint: Option<String>,

    /// Path to forward to, overriding the endpoint's configured target
    #[arg(short, long)]
    pub target: Option<String>,

    /// Host to forward to (overrides config file setting)
    #[arg(short = 'H', long)]
    pub host: Option<String>,
}

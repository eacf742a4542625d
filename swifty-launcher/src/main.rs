use anyhow::{Context, Result};
use clap::Parser;
use std::process::ExitCode;
use swifty_common::redact::redact_body;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::EnvFilter;

mod launch;
mod provider_manager;
mod settings;

use launch::{launch_server, LaunchOutcome};
use provider_manager::ProviderManager;
use settings::Settings;

/// Provision a game server instance and report its public address.
#[derive(Parser, Debug)]
#[command(name = "swifty-launcher", version)]
struct Cli {
    /// Server identifier, used to build the instance label.
    #[arg(default_value = "1")]
    server_id: String,

    /// Cloud provider to use (`linode` or `mock`).
    #[arg(long, env = "PROVIDER", default_value = "linode")]
    provider: String,

    /// Stop once the instance is accepted instead of waiting for its address.
    #[arg(long)]
    no_wait: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match run(&cli).await {
        Ok(outcome) => {
            println!("{}", redact_body(&outcome.create_response));
            match outcome.address {
                Some(address) => println!("Instance {} IP: {}", outcome.instance_id, address),
                None => println!("Instance {} accepted", outcome.instance_id),
            }
            println!("Server launched successfully!");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            println!("Server failed to launch.");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> Result<LaunchOutcome> {
    let settings = Settings::from_env().context("invalid launcher settings")?;
    let provider = ProviderManager::get_provider(&cli.provider, &settings)?;

    println!("Launching Server on {}...", provider.provider_name());

    // Ctrl-C stops the address wait; an accepted creation request is not rolled back.
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, no longer waiting for the instance address");
            on_signal.cancel();
        }
    });

    launch_server(provider.as_ref(), &cli.server_id, !cli.no_wait, &cancel).await
}

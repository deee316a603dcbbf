// ABOUTME: Daemon entry point: connects to the sync server and logs traffic.
// ABOUTME: Initializes logging and config, runs until Ctrl-C, then stops the session.

use anyhow::{Context, Result};
use clap::Parser;
use deskwire::{config::Config, AgentIdentity, SyncClient};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(
    name = "deskwire",
    about = "Realtime sync client daemon for the Deskwire support CRM"
)]
struct Cli {
    /// Path to the config file (defaults to config.toml)
    #[arg(long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    tracing::info!(url = %config.server.url, "Configuration loaded");

    // Token acquisition is the session provider's job; the daemon stands in
    // for it by reading the credential from the environment
    let credential = std::env::var("DESKWIRE_TOKEN").context("DESKWIRE_TOKEN must be set")?;
    let identity = AgentIdentity {
        id: std::env::var("DESKWIRE_AGENT_ID").unwrap_or_else(|_| "agent".to_string()),
        display_name: std::env::var("DESKWIRE_AGENT_NAME")
            .unwrap_or_else(|_| "Deskwire Agent".to_string()),
    };

    let mut client = SyncClient::new(config.server.clone());

    // Surface status transitions for operators
    let mut status_rx = client.watch_status();
    tokio::spawn(async move {
        while status_rx.changed().await.is_ok() {
            let status = *status_rx.borrow_and_update();
            tracing::info!(?status, "Connection status changed");
        }
    });

    client.start(&identity, &credential);

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    tracing::info!(
        messages = client.messages().len(),
        notifications = client.notifications().len(),
        unread = client.unread_notifications(),
        "Shutting down"
    );
    client.stop().await;

    Ok(())
}

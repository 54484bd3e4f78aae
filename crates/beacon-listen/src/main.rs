//! # beacon-listen
//!
//! Connects a notification channel with the configured settings and prints
//! every received event to stdout as one JSON line. Runs until ctrl-c.

#![deny(unsafe_code)]

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use beacon_core::NotificationEvent;
use beacon_core::logging::{init_json_subscriber, init_subscriber};
use beacon_settings::BeaconSettings;
use beacon_stream::{CredentialSlot, HandlerError, NotificationChannel};
use clap::Parser;

/// Print notification events as JSON lines.
#[derive(Parser, Debug)]
#[command(name = "beacon-listen", about = "Print notification events as JSON lines")]
struct Cli {
    /// Stream endpoint (overrides settings).
    #[arg(long)]
    endpoint: Option<String>,

    /// Bearer token. Falls back to `BEACON_TOKEN`.
    #[arg(long)]
    token: Option<String>,

    /// Only print events of this kind.
    #[arg(long)]
    kind: Option<String>,

    /// Settings file to load instead of `~/.beacon/settings.json`.
    #[arg(long)]
    settings: Option<PathBuf>,
}

impl Cli {
    fn load_settings(&self) -> Result<BeaconSettings> {
        let mut settings = match &self.settings {
            Some(path) => beacon_settings::load_settings_from_path(path)
                .with_context(|| format!("Failed to load settings from {}", path.display()))?,
            None => beacon_settings::get_settings().clone(),
        };
        if let Some(endpoint) = &self.endpoint {
            settings.channel.endpoint.clone_from(endpoint);
        }
        settings.validate().context("Invalid settings")?;
        Ok(settings)
    }

    fn token(&self) -> Option<String> {
        self.token
            .clone()
            .or_else(|| std::env::var("BEACON_TOKEN").ok())
    }
}

fn print_event(event: &NotificationEvent) -> Result<(), HandlerError> {
    let line = serde_json::to_string(&event.payload)?;
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{line}")?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    let settings = args.load_settings()?;

    if settings.logging.json {
        init_json_subscriber(&settings.logging.level);
    } else {
        init_subscriber(&settings.logging.level);
    }

    let credentials = CredentialSlot::new();
    match args.token() {
        Some(token) => credentials.set(token),
        None => tracing::warn!("no token given, the channel will retry until one is set"),
    }

    let channel = NotificationChannel::from_settings(&settings.channel)
        .context("Failed to build HTTP transport")?;
    let _subscription = match &args.kind {
        Some(kind) => channel.subscribe(kind.clone(), print_event),
        None => channel.bus().subscribe_all(print_event),
    };
    channel
        .start(credentials)
        .context("Failed to start notification channel")?;
    tracing::info!(endpoint = %settings.channel.endpoint, "listening for notifications");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    channel.stop();
    let stats = channel.stats();
    tracing::info!(
        events = stats.events_published,
        attempts = stats.attempts,
        dropped = stats.frames_dropped,
        "listener stopped"
    );
    Ok(())
}

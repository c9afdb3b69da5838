//! Rotary Radio Application
//!
//! Watches the selector lines, keeps the player on the selected station and
//! restarts itself from scratch on any fatal fault.

use anyhow::{Context, Result};
use clap::Parser;
use crossbeam_channel::{bounded, unbounded};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rotary_radio::{
    api::ApiServer,
    config::{AppConfig, InputBackend},
    status::StatusBoard,
    supervisor::{Backends, Supervisor},
};

#[derive(Debug, Parser)]
#[command(name = "rotary-radio")]
#[command(about = "Selector-switch internet radio")]
struct Cli {
    /// Configuration file (defaults to the per-user config file)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Use simulated input lines instead of GPIO
    #[arg(long)]
    simulate: bool,

    /// Validate the configuration and exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    tracing::info!("Starting radio service");

    let mut config = AppConfig::load_or_default(cli.config.as_deref())
        .context("failed to load configuration")?;
    if cli.simulate {
        config.input.backend = InputBackend::Simulated;
    }

    if cli.check {
        config.validate().context("invalid configuration")?;
        println!("Configuration OK: {} channels, default {}", config.channels.len(), config.default_channel);
        for (index, channel) in config.channels.iter().enumerate() {
            println!("  #{} {} (pin {}) -> {}", index + 1, channel.name, channel.pin, channel.url);
        }
        return Ok(());
    }

    tracing::info!(
        "Device {} with {} channels, assistant {}",
        config.device.model_id,
        config.channels.len(),
        if config.assistant.enabled { "enabled" } else { "disabled" }
    );

    let config = Arc::new(config);
    let status = StatusBoard::new();

    let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
    let (assistant_tx, assistant_rx) = if config.assistant.enabled {
        let (tx, rx) = unbounded();
        (Some(tx), Some(rx))
    } else {
        (None, None)
    };

    // Start the local API
    let (api_stop_tx, api_stop_rx) = oneshot::channel::<()>();
    let api_handle = if config.api.enabled {
        let server = ApiServer::new(config.api.clone(), status.clone(), assistant_tx.clone());
        Some(tokio::spawn(async move {
            let stop = async move {
                let _ = api_stop_rx.await;
            };
            if let Err(e) = server.serve(stop).await {
                tracing::error!("API server failed: {}", e);
            }
        }))
    } else {
        None
    };

    // The supervisor owns all hardware access and runs on its own thread
    let mut supervisor = Supervisor::new(
        config.clone(),
        Backends::from_config(&config),
        status.clone(),
        shutdown_rx,
    );
    if let Some(events) = assistant_rx {
        supervisor = supervisor.with_assistant_events(events);
    }
    let (done_tx, mut done_rx) = oneshot::channel();
    std::thread::Builder::new()
        .name("supervisor".to_string())
        .spawn(move || {
            let state = supervisor.run();
            let _ = done_tx.send(state);
        })
        .context("failed to start supervisor thread")?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown requested");
            let _ = shutdown_tx.send(());
            match tokio::time::timeout(Duration::from_secs(10), &mut done_rx).await {
                Ok(Ok(state)) => tracing::info!("Supervisor finished in state {}", state),
                Ok(Err(_)) => tracing::error!("Supervisor thread exited abnormally"),
                Err(_) => tracing::warn!("Supervisor did not stop in time"),
            }
        }
        result = &mut done_rx => {
            let state = result.context("supervisor thread exited abnormally")?;
            tracing::info!("Supervisor finished in state {}", state);
        }
    }

    let _ = api_stop_tx.send(());
    drop(assistant_tx);
    if let Some(handle) = api_handle {
        if let Err(e) = handle.await {
            tracing::warn!("API task failed: {}", e);
        }
    }

    tracing::info!("Radio service stopped");
    Ok(())
}

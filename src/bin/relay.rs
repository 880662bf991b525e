//! Audio Relay Server
//!
//! Accepts one producer on `/uplink` and serves the stream on `/listen.mp3`.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use audio_relay::{
    config::AppConfig,
    network::StatusReporter,
    relay::Hub,
    ui::WebServer,
};

#[derive(Parser, Debug)]
#[command(name = "audio-relay", version, about = "Live audio relay server")]
struct Args {
    /// Configuration file (defaults to the platform config directory)
    #[arg(short, long, env = "AUDIO_RELAY_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind
    #[arg(long, env = "AUDIO_RELAY_HOST")]
    host: Option<String>,

    /// HTTP port
    #[arg(short, long, env = "AUDIO_RELAY_PORT")]
    port: Option<u16>,

    /// Frames buffered per listener
    #[arg(long)]
    queue_capacity: Option<usize>,
}

fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = match args.config.clone().or_else(AppConfig::default_path) {
        Some(path) => AppConfig::load(&path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => AppConfig::default(),
    };

    if let Some(host) = &args.host {
        config.server.bind_address = host.clone();
    }
    if let Some(port) = args.port {
        config.server.http_port = port;
    }
    if let Some(capacity) = args.queue_capacity {
        config.relay.queue_capacity = capacity;
    }
    Ok(config)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
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

    let args = Args::parse();
    let config = load_config(&args)?;

    tracing::info!("Starting Audio Relay");
    tracing::info!(
        queue_capacity = config.relay.queue_capacity,
        stats_interval_ms = config.relay.stats_interval_ms,
        "Relay configured"
    );

    let hub = Arc::new(Hub::with_config(&config.relay));
    let cancel = CancellationToken::new();
    let tracker = TaskTracker::new();

    StatusReporter::new(Arc::clone(&hub), config.relay.stats_interval()).spawn(&tracker, cancel.clone());

    let shutdown_timeout = config.relay.shutdown_timeout();
    let server = WebServer::new(config, Arc::clone(&hub), cancel.clone());
    let listener = server.bind().await?;
    let mut server_task = tracker.spawn(server.serve(listener));
    tracker.close();

    tokio::select! {
        _ = shutdown_signal() => {
            tracing::info!("Received shutdown signal");
        }
        result = &mut server_task => {
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::error!("Server error: {}", e),
                Err(e) => tracing::error!("Server task failed: {}", e),
            }
        }
    }
    cancel.cancel();

    if tokio::time::timeout(shutdown_timeout, tracker.wait()).await.is_err() {
        tracing::warn!("Shutdown timed out after {:?}", shutdown_timeout);
    }

    let stats = hub.snapshot();
    tracing::info!(bytes_total = stats.bytes_total, "Audio Relay stopped");
    Ok(())
}

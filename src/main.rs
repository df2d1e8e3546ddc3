use std::sync::Arc;

use anyhow::{Context, Result};
use beacon_relay::{
    create_router, AppState, Config, FrameClassifier, LocalMediaStorage, Relay, ThreatLabels,
    VisionClassifier,
};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "beacon-relay", about = "WebRTC signaling relay with live dashboards")]
struct Cli {
    /// Config file path (extension optional)
    #[arg(long, default_value = "config/beacon-relay")]
    config: String,

    /// Override the HTTP port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mut cfg = Config::load(&cli.config)?;
    if let Some(port) = cli.port {
        cfg.service.http.port = port;
    }

    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));
    info!("Recordings directory: {}", cfg.storage.recordings_path);
    info!(
        "Outbound queue: {} frames, heartbeat: {:?}",
        cfg.relay.outbound_queue,
        cfg.relay.heartbeat()
    );

    let relay = Arc::new(Relay::new(cfg.relay.clone()));
    let storage =
        LocalMediaStorage::new(&cfg.storage.recordings_path, &cfg.storage.url_prefix).await?;

    let mut state = AppState::new(Arc::clone(&relay), Arc::new(storage.clone()))
        .with_service_name(cfg.service.name.clone())
        .with_labels(ThreatLabels::new(cfg.sentry.labels.clone()))
        .with_recordings(storage.url_prefix(), storage.root());

    match cfg.sentry.vision.clone() {
        Some(vision) => match VisionClassifier::from_env(vision) {
            Ok(classifier) => {
                info!("Frame classifier: {}", classifier.name());
                state = state.with_classifier(Arc::new(classifier));
            }
            Err(e) => warn!("Frame classifier disabled: {:#}", e),
        },
        None => info!("No frame classifier configured; /analyze-frame will report 503"),
    }

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("Signaling server listening on http://{}", addr);

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal(relay))
        .await
        .context("HTTP server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal(relay: Arc<Relay>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }

    info!("Shutdown requested, ending active streams");
    relay.shutdown().await;
}

//! Sauti TTS Server - HTTP API for Bark text-to-speech

use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod error;
mod settings;
mod state;

use sauti_core::audio::StreamingConfig;
use sauti_core::{AcceleratorInfo, Device, HubModelLoader, InferenceEngine, WorkerBridge};
use settings::Settings;
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sauti_server=debug,sauti_core=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Sauti TTS Server");

    let settings = Settings::load()?;
    info!("Model: {}", settings.engine.model_id);

    let bridge = Arc::new(WorkerBridge::new(&settings.engine));

    // Device is chosen once here and handed to everything that needs it
    let probe_bridge = bridge.clone();
    let accelerators = match tokio::task::spawn_blocking(move || probe_bridge.probe()).await? {
        Ok(info) => info,
        Err(e) => {
            warn!("Accelerator probe failed, assuming CPU only: {}", e);
            AcceleratorInfo::cpu_only()
        }
    };
    let device = Device::select(settings.engine.device, &accelerators)?;
    info!("Using device {}", device);

    let loader = Arc::new(HubModelLoader::new(settings.engine.clone(), bridge));
    let engine = Arc::new(InferenceEngine::new(loader, device));

    if settings.engine.preload {
        if let Err(e) = engine.preload().await {
            warn!("Preload failed, retrying on first request: {}", e);
        }
    }

    let state = AppState::new(
        engine.clone(),
        StreamingConfig {
            chunk_bytes: settings.server.stream_chunk_bytes,
        },
    );
    let app = api::create_router(state, settings.server.cors_enabled);

    let addr = settings.server.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on http://{}", addr);

    info!("Server ready. Press Ctrl+C to stop.");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    engine.shutdown().await;
    info!("Server stopped");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down...");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down...");
        },
    }
}

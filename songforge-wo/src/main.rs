//! songforge-wo - Song Workflow Orchestrator microservice
//!
//! **Module Identity:**
//! - Name: songforge-wo (Workflow Orchestrator)
//! - Default address: 127.0.0.1:5780
//!
//! Turns a passage + style request into a curated set of audio candidates
//! by driving the automation sidecar and the review service through a
//! bounded retry loop. Progress is streamed over SSE.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use songforge_common::config::RootFolderInitializer;
use songforge_common::events::EventBus;
use songforge_common::time::secs_to_duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use songforge_wo::config::{Args, ServiceConfig};
use songforge_wo::ports::{AutomationClient, ReviewClient, WorkflowPorts};
use songforge_wo::services::ArtifactStore;
use songforge_wo::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = ServiceConfig::load(&args).context("Failed to load configuration")?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting songforge-wo (Workflow Orchestrator) microservice");
    info!(
        "Version: {} ({}, {} build {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_PROFILE"),
        env!("BUILD_TIMESTAMP")
    );
    if let Some(path) = &config.config_file {
        info!("Config file: {}", path.display());
    }

    // Root folder and artifact store
    let initializer = RootFolderInitializer::new(config.root_folder.clone());
    initializer
        .ensure_directory_exists()
        .context("Failed to initialize root folder")?;
    info!("Root folder: {}", initializer.root_folder().display());

    let artifact_store = ArtifactStore::open(
        initializer.songs_path(),
        &config.workflow.default_extension,
    )
    .context("Failed to open artifact store")?;

    // Collaborator adapters
    let automation = AutomationClient::new(
        &config.automation.base_url,
        secs_to_duration(config.automation.timeout_secs),
        &config.workflow.default_extension,
    )
    .context("Failed to configure automation client")?;
    let review = ReviewClient::new(
        &config.review.base_url,
        secs_to_duration(config.review.timeout_secs),
        config.review.requests_per_minute,
    )
    .context("Failed to configure review client")?;
    info!(
        automation = %config.automation.base_url,
        review = %config.review.base_url,
        review_per_minute = config.review.requests_per_minute,
        "Collaborators configured"
    );

    let ports = WorkflowPorts::from_clients(Arc::new(automation), Arc::new(review));

    // Create event bus for SSE broadcasting
    let event_bus = EventBus::new(100);

    let state = AppState::new(
        ports,
        artifact_store,
        event_bus,
        config.workflow_settings(),
    );
    let shutdown = state.shutdown.clone();

    let app = songforge_wo::build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_address)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_address))?;
    info!("Listening on http://{}", config.bind_address);
    info!("Health check: http://{}/health", config.bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
///
/// Cancels running workflows so they stop at their next attempt boundary.
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }

    shutdown.cancel();
}

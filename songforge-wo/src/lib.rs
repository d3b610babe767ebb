//! songforge-wo library interface
//!
//! Song workflow orchestrator: drives the bounded generate → download →
//! review → decide loop and serves it over HTTP. Exposed as a library so
//! integration tests can build the router against fake ports.

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod ports;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use songforge_common::events::EventBus;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::ports::WorkflowPorts;
use crate::services::{ArtifactStore, WorkflowOrchestrator, WorkflowSettings};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<WorkflowOrchestrator>,
    /// Ports used directly by the debug pass-through endpoints
    pub ports: WorkflowPorts,
    pub artifact_store: Arc<ArtifactStore>,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    /// Parent of every running workflow's cancel token; cancelled on shutdown
    pub shutdown: CancellationToken,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last workflow error for diagnostic purposes
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(
        ports: WorkflowPorts,
        artifact_store: ArtifactStore,
        event_bus: EventBus,
        settings: WorkflowSettings,
    ) -> Self {
        let artifact_store = Arc::new(artifact_store);
        let orchestrator = Arc::new(WorkflowOrchestrator::new(
            ports.clone(),
            artifact_store.clone(),
            event_bus.clone(),
            settings,
        ));

        Self {
            orchestrator,
            ports,
            artifact_store,
            event_bus,
            shutdown: CancellationToken::new(),
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .merge(api::workflow_routes())
        .route("/workflow/events", get(api::workflow_event_stream))
        .merge(api::debug_routes())
        .merge(api::song_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

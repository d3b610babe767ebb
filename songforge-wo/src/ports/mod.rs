//! Capability interfaces to the external collaborators
//!
//! The orchestrator only sees these traits. Production adapters talk HTTP
//! to the browser-automation sidecar and the review service; tests plug in
//! deterministic fakes.
//!
//! # Example
//! ```rust,ignore
//! use songforge_wo::ports::{ReviewPort, PortError};
//!
//! struct AlwaysContinue;
//!
//! #[async_trait::async_trait]
//! impl ReviewPort for AlwaysContinue {
//!     async fn review(&self, _audio: &Path, _plan: Option<&str>) -> Result<Verdict, PortError> {
//!         Ok(Verdict::Continue)
//!     }
//! }
//! ```

pub mod automation_client;
pub mod review_client;

pub use automation_client::AutomationClient;
pub use review_client::ReviewClient;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use songforge_common::events::{CandidatePosition, Verdict};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use crate::models::WorkflowRequest;

/// Errors reported by port implementations
#[derive(Debug, Error)]
pub enum PortError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Remote error {0}: {1}")]
    Remote(u16, String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Opaque reference to one remote generation, used to address its candidates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationHandle {
    pub title: String,
    /// Remote job identifier, when the generator reports one
    pub job_id: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

/// A candidate fetched to local storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedAudio {
    pub path: PathBuf,
    /// Remote song identifier, if the download could resolve it
    pub song_id: Option<String>,
}

/// Triggers creation of exactly two candidates on the remote service
#[async_trait]
pub trait GenerationPort: Send + Sync {
    async fn generate(&self, request: &WorkflowRequest) -> Result<GenerationHandle, PortError>;
}

/// Fetches one candidate of a generation into `dest_dir`
#[async_trait]
pub trait DownloadPort: Send + Sync {
    async fn download(
        &self,
        handle: &GenerationHandle,
        position: CandidatePosition,
        dest_dir: &Path,
    ) -> Result<DownloadedAudio, PortError>;
}

/// Classifies a downloaded candidate
///
/// Implementations own upstream rate limiting: concurrent workflows share
/// one reviewer and never coordinate among themselves.
#[async_trait]
pub trait ReviewPort: Send + Sync {
    async fn review(
        &self,
        audio_path: &Path,
        planning_structure_id: Option<&str>,
    ) -> Result<Verdict, PortError>;
}

/// Deletes a song on the remote service
#[async_trait]
pub trait RemoteSongPort: Send + Sync {
    async fn delete_song(&self, song_id: &str) -> Result<(), PortError>;
}

/// The set of collaborators one orchestrator works against
#[derive(Clone)]
pub struct WorkflowPorts {
    pub generation: Arc<dyn GenerationPort>,
    pub download: Arc<dyn DownloadPort>,
    pub review: Arc<dyn ReviewPort>,
    pub remote: Arc<dyn RemoteSongPort>,
}

impl WorkflowPorts {
    /// Wire the HTTP adapters: the automation sidecar serves generation,
    /// download and remote deletion; the review service serves verdicts.
    pub fn from_clients(automation: Arc<AutomationClient>, review: Arc<ReviewClient>) -> Self {
        Self {
            generation: automation.clone(),
            download: automation.clone(),
            review,
            remote: automation,
        }
    }
}

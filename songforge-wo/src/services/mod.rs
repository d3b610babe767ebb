//! Service modules for the song workflow
//!
//! - `artifact_store`: pending/final file lifecycle and naming contract
//! - `deletion_service`: dual (local + remote) candidate deletion
//! - `workflow_orchestrator`: bounded generate/download/review/decide loop

pub mod artifact_store;
pub mod deletion_service;
pub mod workflow_orchestrator;

pub use artifact_store::{ArtifactEntry, ArtifactError, ArtifactName, ArtifactStore};
pub use deletion_service::{DeletionError, DeletionPolicy, DeletionService};
pub use workflow_orchestrator::{WorkflowOrchestrator, WorkflowSettings, MAX_ATTEMPTS};

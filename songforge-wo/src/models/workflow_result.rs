//! Terminal workflow result

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

use super::Attempt;

/// Fatal workflow error categories
///
/// Download, review and deletion failures never appear here: they degrade
/// to candidate-level `error` state and are absorbed by the decision policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WorkflowErrorKind {
    /// Remote generation failed on the final attempt
    GenerationFailure,
    /// A re-roll candidate could not be deleted remotely (no identifier)
    #[serde(rename = "MissingIdentifierError")]
    MissingIdentifier,
    /// Stop requested between attempts
    Cancelled,
    /// Nothing from the deciding attempt reached final storage
    ArtifactFailure,
}

/// Error that ended a workflow with `success=false`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind:?}: {message}")]
pub struct WorkflowError {
    pub kind: WorkflowErrorKind,
    pub message: String,
}

impl WorkflowError {
    pub fn new(kind: WorkflowErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Terminal record of one workflow run
#[derive(Debug, Clone)]
pub struct WorkflowResult {
    pub workflow_id: Uuid,
    pub success: bool,
    /// Human-readable summary of how the run ended
    pub message: String,
    /// Attempts entered, including ones whose generation failed
    pub total_attempts: u32,
    /// `continue` candidates moved to final storage
    pub kept_count: usize,
    /// Candidates that received a `re-roll` verdict, across all attempts
    pub re_rolled_count: usize,
    /// Candidates moved to final storage without a `continue` verdict
    pub preserved_count: usize,
    /// Every file this run placed in final storage
    pub final_artifacts: Vec<PathBuf>,
    pub error: Option<WorkflowError>,
    pub attempts: Vec<Attempt>,
}

impl WorkflowResult {
    pub fn final_artifact_count(&self) -> usize {
        self.final_artifacts.len()
    }

    pub fn error_kind(&self) -> Option<WorkflowErrorKind> {
        self.error.as_ref().map(|e| e.kind)
    }

    /// Number of candidates ever created (two per successful generation)
    pub fn candidates_created(&self) -> usize {
        self.attempts.iter().map(|a| a.candidates.len()).sum()
    }
}

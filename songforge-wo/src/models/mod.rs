//! Data models for songforge-wo (workflow orchestrator)
//!
//! - Workflow request (immutable once accepted)
//! - Attempt/Candidate records owned by the orchestrator for one run
//! - Terminal workflow result

pub mod candidate;
pub mod workflow_request;
pub mod workflow_result;

pub use candidate::{Attempt, Candidate, CandidateStage, DeletionOutcome, GenerationStatus};
pub use workflow_request::{RequestValidationError, VerseRange, WorkflowRequest};
pub use workflow_result::{WorkflowError, WorkflowErrorKind, WorkflowResult};

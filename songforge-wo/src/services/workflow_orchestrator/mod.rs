//! Song workflow orchestrator
//!
//! Drives the bounded generate → download → review → decide loop for one
//! [`WorkflowRequest`].
//!
//! # State Progression
//! START → GENERATING → DOWNLOADING → REVIEWING → DECIDING →
//! {RETRYING → GENERATING | FINALIZING → DONE}
//!
//! # Architecture
//! The loop is an explicit [`Step`] enum advanced by `run` until it reaches
//! `Finalizing`; there is no recursion and at most [`MAX_ATTEMPTS`] attempts
//! are entered. Each state is handled by a `phase_*` method in its own
//! module:
//!
//! - **GENERATING** (`phase_generating`): one GenerationPort call
//! - **DOWNLOADING** (`phase_downloading`): wait, then fetch position 1 and 2
//! - **REVIEWING** (`phase_reviewing`): one verdict per downloaded candidate
//! - **DECIDING** (`phase_deciding`): keep, delete, retry or preserve
//!
//! Every port call is awaited before the next step starts. Concurrent
//! workflows share only the port adapters and the artifact store.
//!
//! A stop request is only honored between attempts: an attempt that has
//! started always runs through Deciding with its normal rules.

use chrono::Utc;
use songforge_common::events::{EventBus, SongforgeEvent, Verdict};
use std::mem;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::models::{
    Attempt, CandidateStage, GenerationStatus, WorkflowError, WorkflowErrorKind, WorkflowRequest,
    WorkflowResult,
};
use crate::ports::{GenerationHandle, WorkflowPorts};
use crate::services::{ArtifactStore, DeletionService};

mod phase_deciding;
mod phase_downloading;
mod phase_generating;
mod phase_reviewing;

/// Upper bound on attempts per workflow
pub const MAX_ATTEMPTS: u32 = 3;

/// Orchestrator tunables
#[derive(Debug, Clone)]
pub struct WorkflowSettings {
    /// Delay between a successful generation and the first download
    pub generation_wait: Duration,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            generation_wait: Duration::from_secs(45),
        }
    }
}

/// Loop states
#[derive(Debug)]
enum Step {
    Generating,
    Downloading(GenerationHandle),
    Reviewing,
    Deciding,
    Retrying,
    Finalizing(Outcome),
}

/// How the loop ended
#[derive(Debug)]
enum Outcome {
    /// An attempt produced at least one `continue`
    Succeeded,
    /// All candidates rejected on the last attempt; remaining candidates
    /// were moved to final storage
    Preserved,
    Fatal(WorkflowError),
}

/// Per-run state, owned by `run` for the duration of one request
struct WorkflowRun<'a> {
    workflow_id: Uuid,
    request: &'a WorkflowRequest,
    slug: String,
    /// Attempt currently in flight
    attempt: Attempt,
    /// Attempts that have been retried away
    history: Vec<Attempt>,
    final_artifacts: Vec<PathBuf>,
}

impl<'a> WorkflowRun<'a> {
    fn new(request: &'a WorkflowRequest) -> Self {
        Self {
            workflow_id: Uuid::new_v4(),
            request,
            slug: request.slug(),
            attempt: Attempt::new(1),
            history: Vec::new(),
            final_artifacts: Vec::new(),
        }
    }

    fn is_final_attempt(&self) -> bool {
        self.attempt.ordinal >= MAX_ATTEMPTS
    }

    fn advance_attempt(&mut self) {
        let next = Attempt::new(self.attempt.ordinal + 1);
        self.history.push(mem::replace(&mut self.attempt, next));
    }

    /// All attempts that were entered, in order
    fn into_attempts(self) -> Vec<Attempt> {
        let mut attempts = self.history;
        if self.attempt.generation != GenerationStatus::Pending {
            attempts.push(self.attempt);
        }
        attempts
    }
}

/// Workflow orchestrator service
pub struct WorkflowOrchestrator {
    ports: WorkflowPorts,
    artifact_store: Arc<ArtifactStore>,
    deletion: DeletionService,
    event_bus: EventBus,
    settings: WorkflowSettings,
}

impl WorkflowOrchestrator {
    pub fn new(
        ports: WorkflowPorts,
        artifact_store: Arc<ArtifactStore>,
        event_bus: EventBus,
        settings: WorkflowSettings,
    ) -> Self {
        let deletion = DeletionService::new(ports.remote.clone());
        Self {
            ports,
            artifact_store,
            deletion,
            event_bus,
            settings,
        }
    }

    /// Execute one workflow to completion
    ///
    /// `request` must already be validated. The cancel token is only
    /// consulted at attempt boundaries.
    pub async fn run(&self, request: &WorkflowRequest, cancel: &CancellationToken) -> WorkflowResult {
        let mut run = WorkflowRun::new(request);

        tracing::info!(
            workflow_id = %run.workflow_id,
            title = %request.title,
            passage = %request.passage_label(),
            "Starting song workflow"
        );

        self.event_bus.emit_lossy(SongforgeEvent::WorkflowStarted {
            workflow_id: run.workflow_id,
            title: request.title.clone(),
            timestamp: Utc::now(),
        });

        let mut step = if cancel.is_cancelled() {
            Step::Finalizing(Outcome::Fatal(WorkflowError::new(
                WorkflowErrorKind::Cancelled,
                "Stop requested before generation started",
            )))
        } else {
            Step::Generating
        };

        loop {
            step = match step {
                Step::Generating => self.phase_generating(&mut run, cancel).await,
                Step::Downloading(handle) => self.phase_downloading(&mut run, &handle).await,
                Step::Reviewing => self.phase_reviewing(&mut run).await,
                Step::Deciding => self.phase_deciding(&mut run).await,
                Step::Retrying if cancel.is_cancelled() => {
                    tracing::info!(
                        workflow_id = %run.workflow_id,
                        attempt = run.attempt.ordinal,
                        "Stop requested, not retrying"
                    );
                    Step::Finalizing(Outcome::Fatal(WorkflowError::new(
                        WorkflowErrorKind::Cancelled,
                        format!(
                            "Stop requested after attempt {}; its rejected candidates were deleted",
                            run.attempt.ordinal
                        ),
                    )))
                }
                Step::Retrying => {
                    tracing::info!(
                        workflow_id = %run.workflow_id,
                        attempt = run.attempt.ordinal,
                        "All candidates rejected, retrying"
                    );
                    run.advance_attempt();
                    Step::Generating
                }
                Step::Finalizing(outcome) => return self.finalize(run, outcome),
            };
        }
    }

    fn finalize(&self, run: WorkflowRun<'_>, outcome: Outcome) -> WorkflowResult {
        let workflow_id = run.workflow_id;
        let final_artifacts = run.final_artifacts.clone();
        let attempts = run.into_attempts();
        let total_attempts = attempts.len() as u32;

        let count_stage = |stage: CandidateStage| -> usize {
            attempts.iter().map(|a| a.count_stage(stage)).sum()
        };
        let kept_count = count_stage(CandidateStage::Kept);
        let preserved_count = count_stage(CandidateStage::PreservedFailSafe);
        let re_rolled_count: usize = attempts
            .iter()
            .map(|a| a.count_verdict(Verdict::ReRoll))
            .sum();
        let stranded = attempts
            .iter()
            .flat_map(|a| a.candidates.iter())
            .filter(|c| c.pending_file().is_some())
            .count();

        // A candidate left in pending storage by a failed move does not count
        // as an outcome: with nothing in final storage the run has failed.
        let outcome = match outcome {
            Outcome::Succeeded if kept_count == 0 => Outcome::Fatal(WorkflowError::new(
                WorkflowErrorKind::ArtifactFailure,
                format!(
                    "No kept candidate reached final storage; {} left in pending storage",
                    stranded
                ),
            )),
            Outcome::Preserved if final_artifacts.is_empty() && stranded > 0 => {
                Outcome::Fatal(WorkflowError::new(
                    WorkflowErrorKind::ArtifactFailure,
                    format!(
                        "No fallback artifact reached final storage; {} left in pending storage",
                        stranded
                    ),
                ))
            }
            other => other,
        };

        let (success, message, error) = match outcome {
            Outcome::Succeeded if total_attempts <= 1 => {
                (true, "Workflow succeeded cleanly".to_string(), None)
            }
            Outcome::Succeeded => (
                true,
                format!("Workflow succeeded after {} attempts", total_attempts),
                None,
            ),
            Outcome::Preserved => (
                false,
                format!(
                    "Exhausted {} attempts; preserved {} fallback artifacts",
                    total_attempts, preserved_count
                ),
                None,
            ),
            Outcome::Fatal(error) => (false, error.message.clone(), Some(error)),
        };

        if success {
            tracing::info!(
                workflow_id = %workflow_id,
                total_attempts,
                kept_count,
                re_rolled_count,
                final_artifacts = final_artifacts.len(),
                "{}",
                message
            );
        } else {
            tracing::warn!(
                workflow_id = %workflow_id,
                total_attempts,
                preserved_count,
                re_rolled_count,
                final_artifacts = final_artifacts.len(),
                error = ?error.as_ref().map(|e| e.kind),
                "{}",
                message
            );
        }

        self.event_bus.emit_lossy(SongforgeEvent::WorkflowCompleted {
            workflow_id,
            success,
            total_attempts,
            kept_count,
            re_rolled_count,
            final_artifact_count: final_artifacts.len(),
            error: error.as_ref().map(|e| e.to_string()),
            timestamp: Utc::now(),
        });

        WorkflowResult {
            workflow_id,
            success,
            message,
            total_attempts,
            kept_count,
            re_rolled_count,
            preserved_count,
            final_artifacts,
            error,
            attempts,
        }
    }
}

//! Phase: GENERATING
//!
//! One GenerationPort call per attempt. A failure consumes the attempt;
//! on the last attempt it ends the workflow with `GenerationFailure`.

use super::{Outcome, Step, WorkflowOrchestrator, WorkflowRun, MAX_ATTEMPTS};
use crate::models::{WorkflowError, WorkflowErrorKind};
use crate::ports::GenerationPort;
use chrono::Utc;
use songforge_common::events::SongforgeEvent;
use tokio_util::sync::CancellationToken;

impl WorkflowOrchestrator {
    pub(super) async fn phase_generating(
        &self,
        run: &mut WorkflowRun<'_>,
        cancel: &CancellationToken,
    ) -> Step {
        let attempt = run.attempt.ordinal;

        tracing::info!(
            workflow_id = %run.workflow_id,
            attempt,
            max_attempts = MAX_ATTEMPTS,
            "Attempt started: generating"
        );
        self.event_bus.emit_lossy(SongforgeEvent::AttemptStarted {
            workflow_id: run.workflow_id,
            attempt,
            timestamp: Utc::now(),
        });

        match self.ports.generation.generate(run.request).await {
            Ok(handle) => {
                tracing::debug!(
                    workflow_id = %run.workflow_id,
                    attempt,
                    job_id = ?handle.job_id,
                    "Generation submitted"
                );
                run.attempt.record_generation_success();
                Step::Downloading(handle)
            }
            Err(e) => {
                let message = e.to_string();
                tracing::warn!(
                    workflow_id = %run.workflow_id,
                    attempt,
                    error = %message,
                    "Generation failed"
                );
                run.attempt.record_generation_failure(message.clone());
                self.event_bus.emit_lossy(SongforgeEvent::GenerationFailed {
                    workflow_id: run.workflow_id,
                    attempt,
                    message: message.clone(),
                    timestamp: Utc::now(),
                });

                if run.is_final_attempt() {
                    Step::Finalizing(Outcome::Fatal(WorkflowError::new(
                        WorkflowErrorKind::GenerationFailure,
                        format!("Generation failed on final attempt {}: {}", attempt, message),
                    )))
                } else if cancel.is_cancelled() {
                    Step::Finalizing(Outcome::Fatal(WorkflowError::new(
                        WorkflowErrorKind::Cancelled,
                        format!("Stop requested after generation failure on attempt {}", attempt),
                    )))
                } else {
                    Step::Retrying
                }
            }
        }
    }
}

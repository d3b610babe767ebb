//! Phase: REVIEWING
//!
//! Sequential review of every downloaded candidate. Reviewer failures
//! become `error` verdicts.

use super::{Step, WorkflowOrchestrator, WorkflowRun};
use crate::models::CandidateStage;
use crate::ports::ReviewPort;
use chrono::Utc;
use songforge_common::events::SongforgeEvent;

impl WorkflowOrchestrator {
    pub(super) async fn phase_reviewing(&self, run: &mut WorkflowRun<'_>) -> Step {
        let attempt = run.attempt.ordinal;
        let planning_structure_id = run.request.planning_structure_id.as_deref();

        for candidate in run.attempt.candidates.iter_mut() {
            if candidate.stage != CandidateStage::Downloaded {
                continue;
            }
            let Some(path) = candidate.local_path.clone() else {
                continue;
            };
            let position = candidate.position;

            match self.ports.review.review(&path, planning_structure_id).await {
                Ok(verdict) => candidate.record_verdict(verdict),
                Err(e) => {
                    tracing::warn!(
                        workflow_id = %run.workflow_id,
                        attempt,
                        %position,
                        error = %e,
                        "Review failed, treating as error verdict"
                    );
                    candidate.record_review_failure(e.to_string());
                }
            }

            let verdict = candidate.effective_verdict();
            tracing::info!(
                workflow_id = %run.workflow_id,
                attempt,
                %position,
                %verdict,
                "Candidate reviewed"
            );
            self.event_bus.emit_lossy(SongforgeEvent::CandidateReviewed {
                workflow_id: run.workflow_id,
                attempt,
                position,
                verdict,
                timestamp: Utc::now(),
            });
        }

        Step::Deciding
    }
}

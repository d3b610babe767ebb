//! Phase: DECIDING
//!
//! - Any `continue`: keep `continue` candidates, delete `re-roll` ones,
//!   preserve unreviewed `error` files, finish successfully.
//! - All rejected with attempts left: delete everything, retry.
//! - All rejected on the last attempt: delete nothing, move every
//!   remaining file to final storage.
//!
//! A pending stop request does not change any of this; it is checked once
//! the attempt is decided.
//!
//! Before any deletion, every `re-roll` candidate of the attempt must carry
//! a remote identifier. If one does not, nothing is deleted and the run
//! ends with `MissingIdentifierError`.

use super::{Outcome, Step, WorkflowOrchestrator, WorkflowRun};
use crate::models::{Attempt, Candidate, WorkflowError, WorkflowErrorKind};
use crate::services::{DeletionError, DeletionPolicy};
use chrono::Utc;
use songforge_common::events::{SongforgeEvent, Verdict};
use std::path::PathBuf;
use uuid::Uuid;

impl WorkflowOrchestrator {
    pub(super) async fn phase_deciding(&self, run: &mut WorkflowRun<'_>) -> Step {
        let workflow_id = run.workflow_id;
        let attempt = run.attempt.ordinal;

        tracing::info!(
            workflow_id = %workflow_id,
            attempt,
            continue_count = run.attempt.count_verdict(Verdict::Continue),
            re_roll_count = run.attempt.count_verdict(Verdict::ReRoll),
            error_count = run.attempt.count_verdict(Verdict::Error),
            "Deciding"
        );

        if run.attempt.has_continue() {
            if let Err(e) = self.check_mandatory_deletions(&run.attempt) {
                return self.abort_missing_identifier(run, e).await;
            }

            for candidate in run.attempt.candidates.iter_mut() {
                if candidate.pending_file().is_none() {
                    continue;
                }
                match candidate.effective_verdict() {
                    Verdict::Continue => {
                        if let Some(path) = self
                            .move_candidate_to_final(workflow_id, attempt, candidate, false)
                            .await
                        {
                            run.final_artifacts.push(path);
                        }
                    }
                    Verdict::ReRoll => {
                        self.delete_candidate(workflow_id, attempt, candidate, DeletionPolicy::Mandatory)
                            .await;
                    }
                    Verdict::Error => {
                        if let Some(path) = self
                            .move_candidate_to_final(workflow_id, attempt, candidate, true)
                            .await
                        {
                            run.final_artifacts.push(path);
                        }
                    }
                }
            }

            return Step::Finalizing(Outcome::Succeeded);
        }

        if run.is_final_attempt() {
            self.preserve_remaining(run).await;
            return Step::Finalizing(Outcome::Preserved);
        }

        if let Err(e) = self.check_mandatory_deletions(&run.attempt) {
            return self.abort_missing_identifier(run, e).await;
        }

        for candidate in run.attempt.candidates.iter_mut() {
            if candidate.pending_file().is_none() {
                continue;
            }
            let policy = match candidate.effective_verdict() {
                Verdict::ReRoll => DeletionPolicy::Mandatory,
                _ => DeletionPolicy::BestEffort,
            };
            self.delete_candidate(workflow_id, attempt, candidate, policy)
                .await;
        }

        Step::Retrying
    }

    /// Every `re-roll` candidate holding a file must be remotely deletable
    fn check_mandatory_deletions(&self, attempt: &Attempt) -> Result<(), DeletionError> {
        attempt
            .candidates
            .iter()
            .filter(|c| c.pending_file().is_some() && c.effective_verdict() == Verdict::ReRoll)
            .try_for_each(|c| self.deletion.ensure_deletable(c, DeletionPolicy::Mandatory))
    }

    async fn abort_missing_identifier(&self, run: &mut WorkflowRun<'_>, error: DeletionError) -> Step {
        tracing::error!(
            workflow_id = %run.workflow_id,
            attempt = run.attempt.ordinal,
            error = %error,
            "Mandatory remote deletion impossible, aborting without deleting"
        );
        self.preserve_remaining(run).await;
        Step::Finalizing(Outcome::Fatal(WorkflowError::new(
            WorkflowErrorKind::MissingIdentifier,
            error.to_string(),
        )))
    }

    /// Move every file still in pending storage to final storage
    async fn preserve_remaining(&self, run: &mut WorkflowRun<'_>) {
        let workflow_id = run.workflow_id;
        let attempt = run.attempt.ordinal;

        for candidate in run.attempt.candidates.iter_mut() {
            if candidate.pending_file().is_none() {
                continue;
            }
            let fail_safe = candidate.effective_verdict() != Verdict::Continue;
            if let Some(path) = self
                .move_candidate_to_final(workflow_id, attempt, candidate, fail_safe)
                .await
            {
                run.final_artifacts.push(path);
            }
        }
    }

    /// Returns the final path, or `None` if the move failed (the file then
    /// stays in pending storage)
    async fn move_candidate_to_final(
        &self,
        workflow_id: Uuid,
        attempt: u32,
        candidate: &mut Candidate,
        fail_safe: bool,
    ) -> Option<PathBuf> {
        let position = candidate.position;

        let path = match self.artifact_store.move_to_final(candidate).await {
            Ok(path) => path,
            Err(e) => {
                tracing::error!(
                    workflow_id = %workflow_id,
                    attempt,
                    %position,
                    error = %e,
                    "Failed to move candidate to final storage"
                );
                candidate.record_artifact_failure(e.to_string());
                return None;
            }
        };

        if fail_safe {
            candidate.record_preserved(path.clone());
        } else {
            candidate.record_kept(path.clone());
        }

        let file_name = candidate.file_name().unwrap_or_default();
        tracing::info!(
            workflow_id = %workflow_id,
            attempt,
            %position,
            file = %file_name,
            fail_safe,
            "Candidate moved to final storage"
        );
        self.event_bus.emit_lossy(SongforgeEvent::CandidateFinalized {
            workflow_id,
            attempt,
            position,
            file_name,
            fail_safe,
            timestamp: Utc::now(),
        });

        Some(path)
    }

    async fn delete_candidate(
        &self,
        workflow_id: Uuid,
        attempt: u32,
        candidate: &mut Candidate,
        policy: DeletionPolicy,
    ) {
        let position = candidate.position;

        let outcome = match self.deletion.delete(candidate, policy).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(
                    workflow_id = %workflow_id,
                    attempt,
                    %position,
                    error = %e,
                    "Candidate not deleted"
                );
                return;
            }
        };

        if !outcome.is_successful() {
            tracing::warn!(
                workflow_id = %workflow_id,
                attempt,
                %position,
                errors = ?outcome.errors,
                "Candidate deletion failed on both sides"
            );
        }

        self.event_bus.emit_lossy(SongforgeEvent::CandidateDeleted {
            workflow_id,
            attempt,
            position,
            local_deleted: outcome.local_deleted,
            remote_deleted: outcome.remote_deleted,
            timestamp: Utc::now(),
        });
        candidate.record_deletion(outcome);
    }
}

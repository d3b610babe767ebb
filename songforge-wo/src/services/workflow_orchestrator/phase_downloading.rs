//! Phase: DOWNLOADING
//!
//! Waits for the remote service to finish rendering, then fetches
//! position 1 and position 2 in that order. A failed download marks its
//! candidate `error` and the other position is still fetched.

use super::{Step, WorkflowOrchestrator, WorkflowRun};
use crate::ports::{DownloadPort, GenerationHandle};
use chrono::Utc;
use songforge_common::events::SongforgeEvent;

impl WorkflowOrchestrator {
    pub(super) async fn phase_downloading(
        &self,
        run: &mut WorkflowRun<'_>,
        handle: &GenerationHandle,
    ) -> Step {
        let attempt = run.attempt.ordinal;

        if !self.settings.generation_wait.is_zero() {
            tracing::debug!(
                workflow_id = %run.workflow_id,
                attempt,
                wait_secs = self.settings.generation_wait.as_secs(),
                "Waiting for generation to complete"
            );
            tokio::time::sleep(self.settings.generation_wait).await;
        }

        let pending_dir = self.artifact_store.pending_dir();

        for candidate in run.attempt.candidates.iter_mut() {
            let position = candidate.position;

            match self.ports.download.download(handle, position, pending_dir).await {
                Ok(audio) => {
                    candidate.record_download(audio.path, audio.song_id);

                    match self
                        .artifact_store
                        .adopt_download(&run.slug, candidate, Utc::now())
                        .await
                    {
                        Ok(path) => candidate.relocate(path),
                        Err(e) => {
                            // Still inside pending storage under its raw name
                            tracing::warn!(
                                workflow_id = %run.workflow_id,
                                attempt,
                                %position,
                                error = %e,
                                "Could not rename download into the naming contract"
                            );
                        }
                    }

                    tracing::info!(
                        workflow_id = %run.workflow_id,
                        attempt,
                        %position,
                        song_id = ?candidate.song_id,
                        file = ?candidate.file_name(),
                        "Candidate downloaded"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        workflow_id = %run.workflow_id,
                        attempt,
                        %position,
                        error = %e,
                        "Candidate download failed"
                    );
                    candidate.record_download_failure(e.to_string());
                }
            }

            self.event_bus.emit_lossy(SongforgeEvent::CandidateDownloaded {
                workflow_id: run.workflow_id,
                attempt,
                position,
                song_id: candidate.song_id.clone(),
                success: candidate.pending_file().is_some(),
                timestamp: Utc::now(),
            });
        }

        Step::Reviewing
    }
}

//! Candidate deletion
//!
//! Removes the local file and asks the remote service to delete the song,
//! each exactly once per candidate. Failures on either half are logged and
//! recorded in the returned [`DeletionOutcome`]; they never abort the
//! workflow on their own.

use songforge_common::events::CandidatePosition;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::models::{Candidate, DeletionOutcome};
use crate::ports::RemoteSongPort;

/// How strictly a deletion needs the remote identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionPolicy {
    /// Re-roll candidates: the remote copy must go, so a missing identifier
    /// is fatal
    Mandatory,
    /// Error candidates: remove what can be removed
    BestEffort,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeletionError {
    #[error("Candidate {position} has no remote song identifier; remote deletion impossible")]
    MissingIdentifier { position: CandidatePosition },
}

/// Deletes candidates locally and remotely
#[derive(Clone)]
pub struct DeletionService {
    remote: Arc<dyn RemoteSongPort>,
}

impl DeletionService {
    pub fn new(remote: Arc<dyn RemoteSongPort>) -> Self {
        Self { remote }
    }

    /// Precondition check, run before anything is deleted
    pub fn ensure_deletable(
        &self,
        candidate: &Candidate,
        policy: DeletionPolicy,
    ) -> Result<(), DeletionError> {
        if policy == DeletionPolicy::Mandatory && candidate.song_id.is_none() {
            return Err(DeletionError::MissingIdentifier {
                position: candidate.position,
            });
        }
        Ok(())
    }

    /// Delete one candidate
    ///
    /// Under [`DeletionPolicy::Mandatory`] a missing identifier returns an
    /// error without touching the local file. Otherwise the local file (if
    /// any) is removed, then the remote song (if identified) is deleted with
    /// a single call.
    pub async fn delete(
        &self,
        candidate: &Candidate,
        policy: DeletionPolicy,
    ) -> Result<DeletionOutcome, DeletionError> {
        self.ensure_deletable(candidate, policy)?;

        let position = candidate.position;
        let mut outcome = DeletionOutcome::default();

        if let Some(path) = candidate.local_path.as_deref() {
            match tokio::fs::remove_file(path).await {
                Ok(()) => outcome.local_deleted = true,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    warn!(%position, path = %path.display(), "Local file already gone");
                    outcome.errors.push(format!("local file missing: {}", path.display()));
                }
                Err(e) => {
                    warn!(%position, path = %path.display(), error = %e, "Local deletion failed");
                    outcome.errors.push(format!("local deletion failed: {}", e));
                }
            }
        }

        match candidate.song_id.as_deref() {
            Some(song_id) => {
                outcome.remote_attempted = true;
                match self.remote.delete_song(song_id).await {
                    Ok(()) => outcome.remote_deleted = true,
                    Err(e) => {
                        warn!(%position, song_id, error = %e, "Remote deletion failed");
                        outcome.errors.push(format!("remote deletion failed: {}", e));
                    }
                }
            }
            None => {
                warn!(%position, "No remote song identifier, skipping remote deletion");
            }
        }

        info!(
            %position,
            local_deleted = outcome.local_deleted,
            remote_deleted = outcome.remote_deleted,
            "Candidate deleted"
        );

        Ok(outcome)
    }
}

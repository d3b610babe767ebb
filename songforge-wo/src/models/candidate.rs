//! Attempt and Candidate records
//!
//! A Candidate moves through
//! `Generated → Downloaded → Reviewed → (Kept | Deleted | PreservedFailSafe)`.
//! A failed download ends it in `DownloadFailed` with verdict `error`.
//! Records are owned by the orchestrator for the duration of one run.

use serde::Serialize;
use songforge_common::events::{CandidatePosition, Verdict};
use std::path::{Path, PathBuf};

/// Lifecycle stage of a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CandidateStage {
    Generated,
    Downloaded,
    DownloadFailed,
    Reviewed,
    Kept,
    Deleted,
    PreservedFailSafe,
}

impl CandidateStage {
    /// No further transitions are allowed from a terminal stage
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CandidateStage::DownloadFailed
                | CandidateStage::Kept
                | CandidateStage::Deleted
                | CandidateStage::PreservedFailSafe
        )
    }
}

/// Result of deleting one candidate
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletionOutcome {
    pub local_deleted: bool,
    pub remote_deleted: bool,
    /// True when the remote deletion call was made
    pub remote_attempted: bool,
    pub errors: Vec<String>,
}

impl DeletionOutcome {
    /// Either half succeeding counts, so a partial failure never blocks the loop
    pub fn is_successful(&self) -> bool {
        self.local_deleted || self.remote_deleted
    }
}

/// One of the two audio outputs of a generation
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub position: CandidatePosition,
    pub stage: CandidateStage,
    /// Current location of the audio file (pending, then final)
    pub local_path: Option<PathBuf>,
    /// Remote song identifier, when the download resolved one
    pub song_id: Option<String>,
    pub verdict: Option<Verdict>,
    pub deletion: Option<DeletionOutcome>,
    /// Download, review or final-storage failure message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl Candidate {
    pub fn generated(position: CandidatePosition) -> Self {
        Self {
            position,
            stage: CandidateStage::Generated,
            local_path: None,
            song_id: None,
            verdict: None,
            deletion: None,
            failure: None,
        }
    }

    pub fn record_download(&mut self, local_path: PathBuf, song_id: Option<String>) {
        debug_assert_eq!(self.stage, CandidateStage::Generated);
        self.local_path = Some(local_path);
        self.song_id = song_id.filter(|id| !id.trim().is_empty());
        self.stage = CandidateStage::Downloaded;
    }

    pub fn record_download_failure(&mut self, message: String) {
        debug_assert_eq!(self.stage, CandidateStage::Generated);
        self.failure = Some(message);
        self.verdict = Some(Verdict::Error);
        self.stage = CandidateStage::DownloadFailed;
    }

    /// Pending file was renamed under the naming contract
    pub fn relocate(&mut self, local_path: PathBuf) {
        debug_assert!(!self.stage.is_terminal());
        self.local_path = Some(local_path);
    }

    pub fn record_verdict(&mut self, verdict: Verdict) {
        debug_assert_eq!(self.stage, CandidateStage::Downloaded);
        self.verdict = Some(verdict);
        self.stage = CandidateStage::Reviewed;
    }

    pub fn record_review_failure(&mut self, message: String) {
        self.failure = Some(message);
        self.record_verdict(Verdict::Error);
    }

    /// The move into final storage failed; the file stays pending
    pub fn record_artifact_failure(&mut self, message: String) {
        self.failure = Some(message);
    }

    pub fn record_kept(&mut self, final_path: PathBuf) {
        debug_assert!(!self.stage.is_terminal());
        self.local_path = Some(final_path);
        self.stage = CandidateStage::Kept;
    }

    pub fn record_preserved(&mut self, final_path: PathBuf) {
        debug_assert!(!self.stage.is_terminal());
        self.local_path = Some(final_path);
        self.stage = CandidateStage::PreservedFailSafe;
    }

    pub fn record_deletion(&mut self, outcome: DeletionOutcome) {
        debug_assert!(!self.stage.is_terminal());
        if outcome.local_deleted {
            self.local_path = None;
        }
        self.deletion = Some(outcome);
        self.stage = CandidateStage::Deleted;
    }

    /// Verdict for decision purposes: unset counts as `error`
    pub fn effective_verdict(&self) -> Verdict {
        self.verdict.unwrap_or(Verdict::Error)
    }

    /// A downloaded file still waiting in pending storage
    pub fn pending_file(&self) -> Option<&Path> {
        match self.stage {
            CandidateStage::Downloaded | CandidateStage::Reviewed => self.local_path.as_deref(),
            _ => None,
        }
    }

    /// File name of the current location, for events and reports
    pub fn file_name(&self) -> Option<String> {
        self.local_path
            .as_deref()
            .and_then(Path::file_name)
            .map(|name| name.to_string_lossy().into_owned())
    }
}

/// Outcome of the GenerationPort call that opened an attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "status", content = "message")]
pub enum GenerationStatus {
    Pending,
    Succeeded,
    Failed(String),
}

/// One generate → download → review → decide cycle
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Attempt {
    /// 1-based ordinal
    pub ordinal: u32,
    pub generation: GenerationStatus,
    pub candidates: Vec<Candidate>,
}

impl Attempt {
    pub fn new(ordinal: u32) -> Self {
        Self {
            ordinal,
            generation: GenerationStatus::Pending,
            candidates: Vec::new(),
        }
    }

    /// A successful generation always creates exactly two candidates
    pub fn record_generation_success(&mut self) {
        debug_assert_eq!(self.generation, GenerationStatus::Pending);
        self.generation = GenerationStatus::Succeeded;
        self.candidates = CandidatePosition::ALL
            .iter()
            .map(|position| Candidate::generated(*position))
            .collect();
    }

    pub fn record_generation_failure(&mut self, message: String) {
        debug_assert_eq!(self.generation, GenerationStatus::Pending);
        self.generation = GenerationStatus::Failed(message);
    }

    pub fn has_continue(&self) -> bool {
        self.count_verdict(Verdict::Continue) > 0
    }

    pub fn count_verdict(&self, verdict: Verdict) -> usize {
        self.candidates
            .iter()
            .filter(|c| c.effective_verdict() == verdict)
            .count()
    }

    pub fn count_stage(&self, stage: CandidateStage) -> usize {
        self.candidates.iter().filter(|c| c.stage == stage).count()
    }
}

//! Test Helper Utilities
//!
//! Deterministic port fakes and an orchestrator harness for songforge-wo
//! integration tests.
//!
//! The fake sidecar plays a per-attempt script. Each downloaded file holds
//! the review outcome scripted for it, so the fake reviewer only needs the
//! path it is handed, whatever the file has been renamed to.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use songforge_common::events::{CandidatePosition, EventBus, SongforgeEvent, Verdict};
use songforge_wo::models::WorkflowRequest;
use songforge_wo::ports::{
    DownloadPort, DownloadedAudio, GenerationHandle, GenerationPort, PortError, RemoteSongPort,
    ReviewPort, WorkflowPorts,
};
use songforge_wo::services::{ArtifactStore, WorkflowOrchestrator, WorkflowSettings};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Scripted review outcome for one candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Review {
    Continue,
    ReRoll,
    Error,
    /// Reviewer call fails
    Fail,
}

impl Review {
    fn tag(&self) -> &'static str {
        match self {
            Review::Continue => "continue",
            Review::ReRoll => "re-roll",
            Review::Error => "error",
            Review::Fail => "fail",
        }
    }
}

/// Scripted download outcome for one position
#[derive(Debug, Clone)]
pub enum Download {
    Ok {
        song_id: Option<String>,
        review: Review,
    },
    Fail,
}

/// Downloaded with a resolved remote identifier
pub fn ok(song_id: &str, review: Review) -> Download {
    Download::Ok {
        song_id: Some(song_id.to_string()),
        review,
    }
}

/// Downloaded, but the remote identifier could not be resolved
pub fn unresolved(review: Review) -> Download {
    Download::Ok {
        song_id: None,
        review,
    }
}

/// Scripted outcome of one attempt
#[derive(Debug, Clone)]
pub enum AttemptScript {
    GenerationFails,
    Generated([Download; 2]),
}

pub fn generated(first: Download, second: Download) -> AttemptScript {
    AttemptScript::Generated([first, second])
}

/// Fake automation sidecar + reviewer implementing every port
#[derive(Default)]
pub struct FakeSidecar {
    script: Mutex<VecDeque<AttemptScript>>,
    current: Mutex<Option<[Download; 2]>>,
    pub generate_calls: AtomicU32,
    pub download_calls: AtomicU32,
    pub review_calls: AtomicU32,
    deleted: Mutex<Vec<String>>,
    fail_remote_deletes: bool,
    /// Cancelled from inside `generate`, to stop a run mid-flight
    cancel_on_generate: Mutex<Option<CancellationToken>>,
}

impl FakeSidecar {
    pub fn new(script: Vec<AttemptScript>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            ..Default::default()
        })
    }

    pub fn with_failing_remote(script: Vec<AttemptScript>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            fail_remote_deletes: true,
            ..Default::default()
        })
    }

    pub fn cancel_on_generate(&self, token: CancellationToken) {
        *self.cancel_on_generate.lock().unwrap() = Some(token);
    }

    pub fn ports(self: &Arc<Self>) -> WorkflowPorts {
        WorkflowPorts {
            generation: self.clone(),
            download: self.clone(),
            review: self.clone(),
            remote: self.clone(),
        }
    }

    pub fn generations(&self) -> u32 {
        self.generate_calls.load(Ordering::SeqCst)
    }

    pub fn downloads(&self) -> u32 {
        self.download_calls.load(Ordering::SeqCst)
    }

    pub fn reviews(&self) -> u32 {
        self.review_calls.load(Ordering::SeqCst)
    }

    /// Remote delete calls, in order (including failed ones)
    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationPort for FakeSidecar {
    async fn generate(&self, request: &WorkflowRequest) -> Result<GenerationHandle, PortError> {
        let n = self.generate_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(token) = self.cancel_on_generate.lock().unwrap().as_ref() {
            token.cancel();
        }

        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(AttemptScript::Generated(downloads)) => {
                *self.current.lock().unwrap() = Some(downloads);
                Ok(GenerationHandle {
                    title: request.title.clone(),
                    job_id: Some(format!("job-{}", n)),
                    submitted_at: Utc::now(),
                })
            }
            Some(AttemptScript::GenerationFails) => {
                *self.current.lock().unwrap() = None;
                Err(PortError::Remote(500, "generation failed".to_string()))
            }
            None => Err(PortError::Remote(500, "script exhausted".to_string())),
        }
    }
}

#[async_trait]
impl DownloadPort for FakeSidecar {
    async fn download(
        &self,
        _handle: &GenerationHandle,
        position: CandidatePosition,
        dest_dir: &Path,
    ) -> Result<DownloadedAudio, PortError> {
        self.download_calls.fetch_add(1, Ordering::SeqCst);

        let scripted = self
            .current
            .lock()
            .unwrap()
            .as_ref()
            .map(|downloads| downloads[position.index() as usize - 1].clone());

        match scripted {
            Some(Download::Ok { song_id, review }) => {
                let path = dest_dir.join(format!("download-{}.mp3", Uuid::new_v4().simple()));
                tokio::fs::write(&path, review.tag()).await?;
                Ok(DownloadedAudio { path, song_id })
            }
            Some(Download::Fail) | None => {
                Err(PortError::Remote(404, format!("candidate {} not found", position)))
            }
        }
    }
}

#[async_trait]
impl ReviewPort for FakeSidecar {
    async fn review(
        &self,
        audio_path: &Path,
        _planning_structure_id: Option<&str>,
    ) -> Result<Verdict, PortError> {
        self.review_calls.fetch_add(1, Ordering::SeqCst);

        let tag = tokio::fs::read_to_string(audio_path).await?;
        if tag == "fail" {
            return Err(PortError::Network("reviewer unreachable".to_string()));
        }
        Verdict::parse(&tag).ok_or_else(|| PortError::InvalidResponse(tag))
    }
}

#[async_trait]
impl RemoteSongPort for FakeSidecar {
    async fn delete_song(&self, song_id: &str) -> Result<(), PortError> {
        self.deleted.lock().unwrap().push(song_id.to_string());
        if self.fail_remote_deletes {
            Err(PortError::Remote(500, "delete failed".to_string()))
        } else {
            Ok(())
        }
    }
}

pub fn request(title: &str) -> WorkflowRequest {
    WorkflowRequest {
        book: "Psalms".to_string(),
        chapter: 23,
        verse_range: "1-6".to_string(),
        style: "acoustic folk".to_string(),
        title: title.to_string(),
        planning_structure_id: Some("plan-1".to_string()),
    }
}

pub fn no_wait() -> WorkflowSettings {
    WorkflowSettings {
        generation_wait: Duration::ZERO,
    }
}

/// Orchestrator wired to a fake sidecar and a temporary artifact root
pub struct Harness {
    pub temp: TempDir,
    pub sidecar: Arc<FakeSidecar>,
    pub store: Arc<ArtifactStore>,
    pub event_bus: EventBus,
    pub orchestrator: WorkflowOrchestrator,
}

impl Harness {
    pub fn new(sidecar: Arc<FakeSidecar>) -> Self {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(ArtifactStore::open(temp.path().join("songs"), "mp3").unwrap());
        let event_bus = EventBus::new(256);
        let orchestrator = WorkflowOrchestrator::new(
            sidecar.ports(),
            store.clone(),
            event_bus.clone(),
            no_wait(),
        );

        Self {
            temp,
            sidecar,
            store,
            event_bus,
            orchestrator,
        }
    }

    pub fn scripted(script: Vec<AttemptScript>) -> Self {
        Self::new(FakeSidecar::new(script))
    }

    pub fn final_files(&self) -> Vec<String> {
        visible_files(self.store.final_dir())
    }

    pub fn pending_files(&self) -> Vec<String> {
        visible_files(self.store.pending_dir())
    }
}

/// Sorted file names in a directory, hidden files excluded
pub fn visible_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| !name.starts_with('.'))
        .collect();
    names.sort();
    names
}

/// Everything currently buffered on a subscription
pub fn drain(rx: &mut tokio::sync::broadcast::Receiver<SongforgeEvent>) -> Vec<SongforgeEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

pub fn file_contents(path: &PathBuf) -> String {
    std::fs::read_to_string(path).unwrap()
}

//! Event types for the Songforge event system
//!
//! Provides shared event definitions and the EventBus used to broadcast
//! workflow progress to SSE clients.

mod workflow_types;

pub use workflow_types::{CandidatePosition, Verdict};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Songforge event types
///
/// Events are broadcast via EventBus and serialized for SSE transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SongforgeEvent {
    /// Workflow request accepted and about to generate
    WorkflowStarted {
        workflow_id: Uuid,
        title: String,
        timestamp: DateTime<Utc>,
    },

    /// New attempt entered the Generating state
    AttemptStarted {
        workflow_id: Uuid,
        /// 1-based attempt ordinal
        attempt: u32,
        timestamp: DateTime<Utc>,
    },

    /// Remote generation call failed
    GenerationFailed {
        workflow_id: Uuid,
        attempt: u32,
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// Candidate download finished (successfully or not)
    CandidateDownloaded {
        workflow_id: Uuid,
        attempt: u32,
        position: CandidatePosition,
        /// Remote song identifier, when the download resolved one
        song_id: Option<String>,
        success: bool,
        timestamp: DateTime<Utc>,
    },

    /// Candidate received its verdict
    CandidateReviewed {
        workflow_id: Uuid,
        attempt: u32,
        position: CandidatePosition,
        verdict: Verdict,
        timestamp: DateTime<Utc>,
    },

    /// Candidate deletion was attempted
    CandidateDeleted {
        workflow_id: Uuid,
        attempt: u32,
        position: CandidatePosition,
        local_deleted: bool,
        remote_deleted: bool,
        timestamp: DateTime<Utc>,
    },

    /// Candidate moved into final storage
    CandidateFinalized {
        workflow_id: Uuid,
        attempt: u32,
        position: CandidatePosition,
        /// Final file name
        file_name: String,
        /// True when moved as fail-safe preservation rather than kept on merit
        fail_safe: bool,
        timestamp: DateTime<Utc>,
    },

    /// Workflow reached a terminal state
    WorkflowCompleted {
        workflow_id: Uuid,
        success: bool,
        total_attempts: u32,
        kept_count: usize,
        re_rolled_count: usize,
        final_artifact_count: usize,
        /// Error message for failed workflows
        error: Option<String>,
        timestamp: DateTime<Utc>,
    },
}

impl SongforgeEvent {
    /// Event name used as the SSE `event:` field
    pub fn event_type(&self) -> &str {
        match self {
            SongforgeEvent::WorkflowStarted { .. } => "WorkflowStarted",
            SongforgeEvent::AttemptStarted { .. } => "AttemptStarted",
            SongforgeEvent::GenerationFailed { .. } => "GenerationFailed",
            SongforgeEvent::CandidateDownloaded { .. } => "CandidateDownloaded",
            SongforgeEvent::CandidateReviewed { .. } => "CandidateReviewed",
            SongforgeEvent::CandidateDeleted { .. } => "CandidateDeleted",
            SongforgeEvent::CandidateFinalized { .. } => "CandidateFinalized",
            SongforgeEvent::WorkflowCompleted { .. } => "WorkflowCompleted",
        }
    }

    /// Workflow this event belongs to
    pub fn workflow_id(&self) -> Uuid {
        match self {
            SongforgeEvent::WorkflowStarted { workflow_id, .. }
            | SongforgeEvent::AttemptStarted { workflow_id, .. }
            | SongforgeEvent::GenerationFailed { workflow_id, .. }
            | SongforgeEvent::CandidateDownloaded { workflow_id, .. }
            | SongforgeEvent::CandidateReviewed { workflow_id, .. }
            | SongforgeEvent::CandidateDeleted { workflow_id, .. }
            | SongforgeEvent::CandidateFinalized { workflow_id, .. }
            | SongforgeEvent::WorkflowCompleted { workflow_id, .. } => *workflow_id,
        }
    }
}

/// Central event distribution bus
///
/// Cloning an EventBus yields another handle onto the same channel.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SongforgeEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Arguments
    ///
    /// * `capacity` - Number of events to buffer before slow subscribers lag
    ///
    /// # Examples
    ///
    /// ```
    /// use songforge_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(100);
    /// assert_eq!(event_bus.capacity(), 100);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<SongforgeEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists,
    /// `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: SongforgeEvent,
    ) -> Result<usize, broadcast::error::SendError<SongforgeEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    ///
    /// Workflow progress is informational: a workflow never fails because
    /// nobody is watching it.
    pub fn emit_lossy(&self, event: SongforgeEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

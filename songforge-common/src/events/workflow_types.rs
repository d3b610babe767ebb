//! Workflow type definitions
//!
//! Supporting types shared between the orchestrator, its ports and the
//! events it emits.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Quality classification of a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verdict {
    /// Acceptable; the candidate is kept
    #[serde(rename = "continue")]
    Continue,
    /// Rejected; the candidate must be deleted locally and remotely
    #[serde(rename = "re-roll")]
    ReRoll,
    /// Not classified (download or review failed). Not a rejection.
    #[serde(rename = "error")]
    Error,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Continue => "continue",
            Verdict::ReRoll => "re-roll",
            Verdict::Error => "error",
        }
    }

    /// Parse a verdict string as returned by a reviewer
    ///
    /// Accepts `re_roll` and `reroll` spellings; anything unrecognized is `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "continue" => Some(Verdict::Continue),
            "re-roll" | "re_roll" | "reroll" => Some(Verdict::ReRoll),
            "error" => Some(Verdict::Error),
            _ => None,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Position of a candidate within one generation (most recent first)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum CandidatePosition {
    First,
    Second,
}

impl CandidatePosition {
    /// Download order: position 1 is always resolved before position 2
    pub const ALL: [CandidatePosition; 2] = [CandidatePosition::First, CandidatePosition::Second];

    pub fn index(&self) -> u8 {
        match self {
            CandidatePosition::First => 1,
            CandidatePosition::Second => 2,
        }
    }
}

impl TryFrom<u8> for CandidatePosition {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(CandidatePosition::First),
            2 => Ok(CandidatePosition::Second),
            other => Err(format!("candidate position must be 1 or 2, got {}", other)),
        }
    }
}

impl From<CandidatePosition> for u8 {
    fn from(position: CandidatePosition) -> Self {
        position.index()
    }
}

impl fmt::Display for CandidatePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.index())
    }
}

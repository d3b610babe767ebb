//! Workflow request
//!
//! The request names a passage (book, chapter, verse range), the musical
//! style and the track title. It is validated once on acceptance and never
//! mutated afterwards.

use serde::{Deserialize, Serialize};
use songforge_common::slugify;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Request validation errors (reported as HTTP 400)
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestValidationError {
    #[error("{0} must not be blank")]
    Blank(&'static str),

    #[error("title must contain at least one letter or digit")]
    UnsluggableTitle,

    #[error("chapter must be at least 1")]
    InvalidChapter,

    #[error("invalid verse range '{0}': expected N or N-M with 1 <= N <= M")]
    InvalidVerseRange(String),
}

/// Inclusive verse range within one chapter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerseRange {
    pub start: u32,
    pub end: u32,
}

impl FromStr for VerseRange {
    type Err = RequestValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || RequestValidationError::InvalidVerseRange(s.to_string());
        let trimmed = s.trim();

        let (start, end) = match trimmed.split_once('-') {
            Some((start, end)) => (start.trim(), end.trim()),
            None => (trimmed, trimmed),
        };
        let start: u32 = start.parse().map_err(|_| invalid())?;
        let end: u32 = end.parse().map_err(|_| invalid())?;

        if start == 0 || start > end {
            return Err(invalid());
        }
        Ok(Self { start, end })
    }
}

impl fmt::Display for VerseRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

/// POST /workflow request body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowRequest {
    pub book: String,
    pub chapter: u32,
    pub verse_range: String,
    pub style: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub planning_structure_id: Option<String>,
}

impl WorkflowRequest {
    /// Check the request before any port is called
    pub fn validate(&self) -> Result<(), RequestValidationError> {
        if self.book.trim().is_empty() {
            return Err(RequestValidationError::Blank("book"));
        }
        if self.style.trim().is_empty() {
            return Err(RequestValidationError::Blank("style"));
        }
        if self.title.trim().is_empty() {
            return Err(RequestValidationError::Blank("title"));
        }
        if self.slug().is_empty() {
            return Err(RequestValidationError::UnsluggableTitle);
        }
        if self.chapter == 0 {
            return Err(RequestValidationError::InvalidChapter);
        }
        self.verse_range.parse::<VerseRange>()?;
        Ok(())
    }

    /// Title slug used as the artifact filename prefix
    pub fn slug(&self) -> String {
        slugify(&self.title)
    }

    /// Human-readable passage reference, e.g. `Psalms 23:1-6`
    pub fn passage_label(&self) -> String {
        format!("{} {}:{}", self.book.trim(), self.chapter, self.verse_range.trim())
    }
}

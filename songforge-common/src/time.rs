//! Timestamp utilities

use chrono::{DateTime, Utc};

/// Fixed-width UTC timestamp format embedded in artifact filenames.
///
/// Lexical order of formatted values equals chronological order.
pub const ARTIFACT_TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S%3f";

/// Length of a formatted artifact timestamp (e.g. `20261016T143015123`)
pub const ARTIFACT_TIMESTAMP_LEN: usize = 18;

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Format a timestamp for use in an artifact filename
pub fn artifact_timestamp(at: DateTime<Utc>) -> String {
    at.format(ARTIFACT_TIMESTAMP_FORMAT).to_string()
}

/// Check whether a filename segment is a well-formed artifact timestamp
pub fn is_artifact_timestamp(segment: &str) -> bool {
    segment.len() == ARTIFACT_TIMESTAMP_LEN
        && segment.char_indices().all(|(i, c)| {
            if i == 8 {
                c == 'T'
            } else {
                c.is_ascii_digit()
            }
        })
}

/// Convert seconds to duration
pub fn secs_to_duration(secs: u64) -> std::time::Duration {
    std::time::Duration::from_secs(secs)
}

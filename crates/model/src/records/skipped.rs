use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Per-record write failures the service reports but that do not abort a batch.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DropReason {
    /// The insert collided with an existing row.
    DuplicateInsert,

    /// The update targeted a row that no longer exists.
    MissingUpdateTarget,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::DuplicateInsert => write!(f, "duplicate insert"),
            DropReason::MissingUpdateTarget => write!(f, "missing update target"),
        }
    }
}

/// A record that was written to the service but intentionally not retried.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SkippedRecord {
    pub request_id: String,
    pub table: String,
    pub reason: DropReason,
    pub status_code: u16,
    pub message: String,
    pub detail: Option<String>,
    pub skipped_at: DateTime<Utc>,
}

impl SkippedRecord {
    pub fn new(
        request_id: String,
        table: String,
        reason: DropReason,
        status_code: u16,
        message: String,
    ) -> Self {
        Self {
            request_id,
            table,
            reason,
            status_code,
            message,
            detail: None,
            skipped_at: Utc::now(),
        }
    }

    pub fn with_detail(mut self, detail: Option<String>) -> Self {
        self.detail = detail;
        self
    }
}

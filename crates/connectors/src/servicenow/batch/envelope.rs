use crate::servicenow::codec::WriteEnvelope;
use model::records::skipped::SkippedRecord;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Body of one call to the batch endpoint. Built fresh for every round.
#[derive(Debug, Clone, Serialize)]
pub struct BatchEnvelope {
    pub batch_request_id: String,
    pub rest_requests: Vec<WriteEnvelope>,
}

impl BatchEnvelope {
    pub fn new(rest_requests: Vec<WriteEnvelope>) -> Self {
        BatchEnvelope {
            batch_request_id: Uuid::new_v4().to_string(),
            rest_requests,
        }
    }

    pub fn request_ids(&self) -> impl Iterator<Item = &str> {
        self.rest_requests.iter().map(|r| r.id.as_str())
    }

    pub fn len(&self) -> usize {
        self.rest_requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rest_requests.is_empty()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServicedRequest {
    pub id: String,
    pub status_code: u16,
    /// Base64-encoded sub-response body; absent or `null` when the service
    /// suppressed it.
    #[serde(default)]
    pub body: Option<String>,
}

/// What the batch endpoint did within its time budget.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BatchOutcome {
    #[serde(default)]
    pub batch_request_id: Option<String>,
    #[serde(default)]
    pub serviced_requests: Vec<ServicedRequest>,
    #[serde(default)]
    pub unserviced_requests: Vec<String>,
}

/// Result of a fully serviced coordinator call.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub table: String,
    /// Rounds submitted across every attempt.
    pub rounds: usize,
    /// Whole-call attempts, counting the successful one.
    pub attempts: usize,
    pub resolved: Vec<String>,
    pub skipped: Vec<SkippedRecord>,
}

impl BatchReport {
    pub fn written(&self) -> usize {
        self.resolved.len()
    }
}

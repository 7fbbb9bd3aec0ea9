//! Drives the multi-round batched write protocol.
//!
//! `pending` is the only record of which sub-requests are still undecided. It
//! shrinks on confirmed outcomes only, so a failed round never forgets work
//! that already succeeded, and an outer retry resumes exactly where the
//! previous attempt stopped.

use crate::{
    http::HttpRequest,
    retry::RetryPolicy,
    servicenow::{
        batch::envelope::{BatchEnvelope, BatchOutcome, BatchReport},
        classifier::{Classification, classify_write},
        client::ServiceClient,
        codec::{WriteEnvelope, decode_text},
        error::BatchError,
    },
};
use model::records::skipped::SkippedRecord;
use std::collections::{HashMap, HashSet};
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Rounds allowed per call unless configured otherwise.
pub const DEFAULT_MAX_ROUNDS: usize = 10;

pub struct BatchWriteCoordinator {
    client: ServiceClient,
    table: String,
    retry: RetryPolicy,
    max_rounds: usize,
    /// Submission order of every id ever handed to this coordinator.
    order: Vec<String>,
    pending: HashMap<String, WriteEnvelope>,
    resolved: Vec<String>,
    skipped: Vec<SkippedRecord>,
    rounds: usize,
}

impl BatchWriteCoordinator {
    pub fn new(
        client: ServiceClient,
        table: &str,
        envelopes: Vec<WriteEnvelope>,
    ) -> Result<Self, BatchError> {
        let mut order = Vec::with_capacity(envelopes.len());
        let mut pending = HashMap::with_capacity(envelopes.len());

        for envelope in envelopes {
            if pending.contains_key(&envelope.id) {
                return Err(BatchError::DuplicateRequestId(envelope.id));
            }
            order.push(envelope.id.clone());
            pending.insert(envelope.id.clone(), envelope);
        }

        Ok(BatchWriteCoordinator {
            client,
            table: table.to_string(),
            retry: RetryPolicy::for_batch(),
            max_rounds: DEFAULT_MAX_ROUNDS,
            order,
            pending,
            resolved: Vec::new(),
            skipped: Vec::new(),
            rounds: 0,
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds.max(1);
        self
    }

    /// Ids still awaiting an outcome, in submission order.
    pub fn pending_ids(&self) -> Vec<String> {
        self.order
            .iter()
            .filter(|id| self.pending.contains_key(*id))
            .cloned()
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.pending.is_empty()
    }

    /// Runs rounds until every pending sub-request is resolved or dropped.
    ///
    /// A retryable error leaves `pending` intact; any other error aborts the
    /// call and discards everything, including outcomes gathered so far.
    pub async fn submit_batch(&mut self) -> Result<BatchReport, BatchError> {
        let mut round_ids = self.pending_ids();
        let mut rounds = 0;

        while !round_ids.is_empty() {
            if rounds == self.max_rounds {
                let err = BatchError::RoundsExhausted {
                    table: self.table.clone(),
                    rounds,
                    pending: round_ids.len(),
                };
                self.abort();
                return Err(err);
            }
            rounds += 1;
            self.rounds += 1;

            let next = self.run_round(&round_ids).await;
            round_ids = match next {
                Ok(next) => next,
                Err(err) => {
                    if !err.is_retryable() {
                        self.abort();
                    }
                    return Err(err);
                }
            };
        }

        let report = BatchReport {
            table: self.table.clone(),
            rounds: self.rounds,
            attempts: 1,
            resolved: std::mem::take(&mut self.resolved),
            skipped: std::mem::take(&mut self.skipped),
        };

        info!(
            "Batch write to '{}' complete: {} written, {} skipped in {} rounds",
            self.table,
            report.resolved.len(),
            report.skipped.len(),
            report.rounds
        );
        Ok(report)
    }

    /// Retries whole calls on retryable failures, resuming from `pending`.
    pub async fn submit_batch_with_retry(&mut self) -> Result<BatchReport, BatchError> {
        let mut attempt = 0;

        loop {
            match self.submit_batch().await {
                Ok(mut report) => {
                    report.attempts = attempt + 1;
                    return Ok(report);
                }
                Err(err) if err.is_retryable() => {
                    if !self.retry.allows_retry(attempt) {
                        self.abort();
                        return Err(BatchError::RetriesExhausted {
                            table: self.table.clone(),
                            attempts: attempt + 1,
                            last: Box::new(err),
                        });
                    }

                    let delay = self.retry.backoff_delay(attempt);
                    warn!(
                        "Batch write to '{}' failed (attempt {} of {}): {}. {} requests pending, retrying in {:?}",
                        self.table,
                        attempt + 1,
                        self.retry.max_attempts,
                        err,
                        self.pending.len(),
                        delay
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Submits one round and returns the ids that need another.
    async fn run_round(&mut self, ids: &[String]) -> Result<Vec<String>, BatchError> {
        let envelope = BatchEnvelope::new(
            ids.iter()
                .filter_map(|id| self.pending.get(id).cloned())
                .collect(),
        );

        debug!(
            "Submitting batch {} to '{}' with {} requests (round {})",
            envelope.batch_request_id,
            self.table,
            envelope.len(),
            self.rounds
        );

        let outcome = self.post(&envelope).await?;
        let mut retry: HashSet<String> = HashSet::new();

        for serviced in outcome.serviced_requests {
            if !self.pending.contains_key(&serviced.id) {
                warn!(
                    "Batch {} reported unknown request id {}",
                    envelope.batch_request_id, serviced.id
                );
                continue;
            }

            let body = match serviced.body.as_deref() {
                Some(encoded) => decode_text(encoded).unwrap_or_else(|e| {
                    warn!("Undecodable body for request {}: {}", serviced.id, e);
                    String::new()
                }),
                None => String::new(),
            };

            match classify_write(serviced.status_code, &body) {
                Classification::Success => {
                    self.pending.remove(&serviced.id);
                    self.resolved.push(serviced.id);
                }
                Classification::RecordDropped(reason, failure) => {
                    warn!(
                        "Dropping request {} on '{}' ({}): {}",
                        serviced.id,
                        self.table,
                        reason,
                        failure.describe(serviced.status_code)
                    );
                    self.pending.remove(&serviced.id);
                    self.skipped.push(
                        SkippedRecord::new(
                            serviced.id,
                            self.table.clone(),
                            reason,
                            serviced.status_code,
                            failure.message().to_string(),
                        )
                        .with_detail(failure.detail),
                    );
                }
                Classification::Retryable(failure) => {
                    debug!(
                        "Request {} ran out of execution time: {}",
                        serviced.id,
                        failure.describe(serviced.status_code)
                    );
                    retry.insert(serviced.id);
                }
                Classification::Terminal { kind, detail } => {
                    return Err(BatchError::Terminal {
                        table: self.table.clone(),
                        request_id: serviced.id,
                        status: serviced.status_code,
                        kind,
                        detail,
                    });
                }
            }
        }

        for id in outcome.unserviced_requests {
            if self.pending.contains_key(&id) {
                retry.insert(id);
            }
        }

        for id in ids {
            if self.pending.contains_key(id) && !retry.contains(id) {
                warn!(
                    "Batch {} did not report request {}; resubmitting",
                    envelope.batch_request_id, id
                );
                retry.insert(id.clone());
            }
        }

        Ok(self
            .order
            .iter()
            .filter(|id| retry.contains(*id))
            .cloned()
            .collect())
    }

    async fn post(&self, envelope: &BatchEnvelope) -> Result<BatchOutcome, BatchError> {
        let batch_id = envelope.batch_request_id.clone();
        let body = serde_json::to_value(envelope).map_err(|e| BatchError::InvalidResponse {
            batch_id: batch_id.clone(),
            message: format!("failed to encode batch: {e}"),
        })?;

        let request = HttpRequest::post_json(self.client.endpoint().batch_url(), body);
        let request = self.client.authorize(request).await?;

        let response = self
            .client
            .send(request)
            .await
            .map_err(|e| BatchError::Retryable {
                batch_id: batch_id.clone(),
                message: e.to_string(),
            })?;

        if !response.is_success() {
            return Err(BatchError::Retryable {
                batch_id,
                message: format!("batch endpoint returned HTTP {}", response.status),
            });
        }

        serde_json::from_str(&response.body).map_err(|e| BatchError::InvalidResponse {
            batch_id,
            message: e.to_string(),
        })
    }

    fn abort(&mut self) {
        self.pending.clear();
        self.order.clear();
        self.resolved.clear();
        self.skipped.clear();
    }
}

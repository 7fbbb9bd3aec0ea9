use crate::{context::exec::ServiceContext, error::EngineError};
use connectors::servicenow::{
    codec::{RequestCodec, WriteEnvelope, WriteMode},
    schema::{ProbePurpose, TableSchema},
};
use model::records::{row::RowData, skipped::SkippedRecord};
use serde::Serialize;
use std::collections::HashSet;
use tracing::{error, info, warn};

/// What a writer accomplished over its lifetime.
#[derive(Debug, Clone, Default, Serialize)]
pub struct WriteSummary {
    pub table: String,
    pub written: usize,
    /// Records the service rejected with a known, non-fatal signature.
    pub skipped: Vec<SkippedRecord>,
    pub batches: usize,
    pub rounds: usize,
}

/// Buffers encoded records and flushes them through a batch coordinator
/// whenever the configured batch size is reached.
pub struct BatchedWriter {
    ctx: ServiceContext,
    codec: RequestCodec,
    batch_size: usize,
    buffer: Vec<WriteEnvelope>,
    schema: Option<TableSchema>,
    unknown_columns: HashSet<String>,
    summary: WriteSummary,
    aborted: bool,
}

impl BatchedWriter {
    pub fn new(ctx: ServiceContext, table: &str, mode: WriteMode) -> Self {
        let batch_size = ctx.settings().batch_size.max(1);
        BatchedWriter {
            ctx,
            codec: RequestCodec::new(table, mode),
            batch_size,
            buffer: Vec::with_capacity(batch_size),
            schema: None,
            unknown_columns: HashSet::new(),
            summary: WriteSummary {
                table: table.to_string(),
                ..WriteSummary::default()
            },
            aborted: false,
        }
    }

    pub fn table(&self) -> &str {
        self.codec.table()
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Loads the target table's columns so records can be checked against them.
    pub async fn prepare(&mut self) -> Result<&TableSchema, EngineError> {
        let schema = self
            .ctx
            .fetcher()
            .fetch_schema_probe(self.codec.table(), ProbePurpose::Write)
            .await?;
        Ok(&*self.schema.insert(schema))
    }

    pub async fn write(&mut self, record: &RowData) -> Result<(), EngineError> {
        if self.aborted {
            return Err(EngineError::WriterAborted(self.table().to_string()));
        }

        self.check_columns(record);
        self.buffer.push(self.codec.encode(record)?);

        if self.buffer.len() >= self.batch_size {
            self.flush().await?;
        }
        Ok(())
    }

    pub async fn write_all(&mut self, records: &[RowData]) -> Result<(), EngineError> {
        for record in records {
            self.write(record).await?;
        }
        Ok(())
    }

    /// Submits everything buffered as one coordinated batch call.
    ///
    /// A failure marks the writer aborted; the failed batch contributes
    /// nothing to the summary.
    pub async fn flush(&mut self) -> Result<(), EngineError> {
        if self.aborted {
            return Err(EngineError::WriterAborted(self.table().to_string()));
        }
        if self.buffer.is_empty() {
            return Ok(());
        }

        let envelopes = std::mem::take(&mut self.buffer);
        let count = envelopes.len();
        let metrics = self.ctx.metrics().clone();

        let result = match self.ctx.coordinator(self.codec.table(), envelopes) {
            Ok(mut coordinator) => coordinator.submit_batch_with_retry().await,
            Err(e) => Err(e),
        };

        let report = match result {
            Ok(report) => report,
            Err(e) => {
                self.aborted = true;
                metrics.increment_failures(1);
                error!(
                    table = %self.summary.table,
                    records = count,
                    error = %e,
                    "Batch write failed"
                );
                return Err(e.into());
            }
        };

        metrics.increment_batches(1);
        metrics.increment_rounds(report.rounds as u64);
        metrics.increment_retries(report.attempts.saturating_sub(1) as u64);
        metrics.increment_records_written(report.written() as u64);
        metrics.increment_records_skipped(report.skipped.len() as u64);

        info!(
            table = %self.summary.table,
            written = report.written(),
            skipped = report.skipped.len(),
            rounds = report.rounds,
            "Batch flushed"
        );

        self.summary.written += report.written();
        self.summary.batches += 1;
        self.summary.rounds += report.rounds;
        self.summary.skipped.extend(report.skipped);
        Ok(())
    }

    /// Flushes the tail of the buffer and returns the final summary.
    pub async fn close(mut self) -> Result<WriteSummary, EngineError> {
        self.flush().await?;

        if !self.summary.skipped.is_empty() {
            warn!(
                table = %self.summary.table,
                skipped = self.summary.skipped.len(),
                "Some records were not written"
            );
        }
        info!(
            table = %self.summary.table,
            written = self.summary.written,
            batches = self.summary.batches,
            "Writer closed"
        );
        Ok(self.summary)
    }

    fn check_columns(&mut self, record: &RowData) {
        let Some(schema) = &self.schema else {
            return;
        };
        for name in record.column_names() {
            if schema.column(name).is_none() && self.unknown_columns.insert(name.to_string()) {
                warn!(
                    table = %self.summary.table,
                    column = name,
                    "Record carries a column the table does not define"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MetricsSnapshot;
    use connectors::{
        http::{HttpRequest, HttpResponse, RequestBody, mock::MockTransport},
        servicenow::codec::encode_body,
    };
    use engine_config::settings::{ServiceSettings, retry::RetrySettings};
    use serde_json::{Value, json};
    use std::sync::Arc;
    use tracing_test::traced_test;

    fn context(transport: Arc<MockTransport>, batch_size: usize) -> ServiceContext {
        let settings = ServiceSettings {
            endpoint: "https://dev12345.service-now.com".to_string(),
            client_id: "client".to_string(),
            client_secret: "s3cret".to_string(),
            username: "integration".to_string(),
            password: "hunter2".to_string(),
            batch_size,
            retry: RetrySettings::immediate(),
            ..ServiceSettings::default()
        };
        ServiceContext::with_transport(Arc::new(settings), transport).unwrap()
    }

    fn record(name: &str) -> RowData {
        let mut row = RowData::default();
        row.insert("short_description", json!(name));
        row
    }

    fn request_ids(request: &HttpRequest) -> Vec<String> {
        match &request.body {
            RequestBody::Json(body) => body["rest_requests"]
                .as_array()
                .unwrap()
                .iter()
                .map(|r| r["id"].as_str().unwrap().to_string())
                .collect(),
            other => panic!("unexpected body: {other:?}"),
        }
    }

    fn serviced(id: &str, status: u16, body: &Value) -> Value {
        json!({ "id": id, "status_code": status, "body": encode_body(body).unwrap() })
    }

    /// Answers the next batch call with 201 for every sub-request except the
    /// one at the `failing` position.
    fn respond(transport: &MockTransport, failing: Option<(usize, u16, Value)>) {
        transport.push_handler(move |request| {
            let serviced: Vec<Value> = request_ids(request)
                .iter()
                .enumerate()
                .map(|(i, id)| match &failing {
                    Some((at, status, body)) if *at == i => serviced(id, *status, body),
                    _ => serviced(id, 201, &json!({ "result": {} })),
                })
                .collect();
            let body = json!({ "serviced_requests": serviced, "unserviced_requests": [] });
            Ok(HttpResponse::new(200, body.to_string()))
        });
    }

    #[tokio::test]
    async fn test_flushes_at_batch_size_and_on_close() {
        let transport = Arc::new(MockTransport::new());
        respond(&transport, None);
        respond(&transport, None);

        let ctx = context(transport.clone(), 2);
        let mut writer = ctx.writer("incident", WriteMode::Insert);
        writer
            .write_all(&[record("a"), record("b"), record("c")])
            .await
            .unwrap();

        assert_eq!(writer.buffered(), 1);
        assert_eq!(transport.service_requests().len(), 1);

        let summary = writer.close().await.unwrap();
        assert_eq!(summary.written, 3);
        assert_eq!(summary.batches, 2);
        assert!(summary.skipped.is_empty());

        let requests = transport.service_requests();
        assert_eq!(request_ids(&requests[0]).len(), 2);
        assert_eq!(request_ids(&requests[1]).len(), 1);

        assert_eq!(
            ctx.metrics().snapshot(),
            MetricsSnapshot {
                records_written: 3,
                batches_submitted: 2,
                batch_rounds: 2,
                ..MetricsSnapshot::default()
            }
        );
    }

    #[traced_test]
    #[tokio::test]
    async fn test_skipped_records_are_returned() {
        let transport = Arc::new(MockTransport::new());
        respond(
            &transport,
            Some((
                0,
                404,
                json!({ "status": "failure", "error": { "message": "No Record found", "detail": "Record doesn't exist or ACL restricts the record retrieval" } }),
            )),
        );

        let ctx = context(transport, 10);
        let mut writer = ctx.writer("incident", WriteMode::Insert);
        writer.write(&record("a")).await.unwrap();
        writer.write(&record("b")).await.unwrap();

        let summary = writer.close().await.unwrap();
        assert_eq!(summary.written, 1);
        assert_eq!(summary.skipped.len(), 1);
        assert_eq!(ctx.metrics().snapshot().records_skipped, 1);
        assert!(logs_contain("Some records were not written"));
    }

    #[tokio::test]
    async fn test_terminal_failure_aborts_writer() {
        let transport = Arc::new(MockTransport::new());
        respond(
            &transport,
            Some((
                1,
                403,
                json!({ "status": "failure", "error": { "message": "Operation Failed", "detail": "ACL Exception Insert Failed due to security constraints" } }),
            )),
        );

        let ctx = context(transport.clone(), 3);
        let mut writer = ctx.writer("incident", WriteMode::Insert);
        writer.write(&record("a")).await.unwrap();
        writer.write(&record("b")).await.unwrap();

        let err = writer.write(&record("c")).await.unwrap_err();
        assert!(err.to_string().contains("ACL Exception"));

        assert!(matches!(
            writer.write(&record("d")).await,
            Err(EngineError::WriterAborted(_))
        ));
        assert!(writer.close().await.is_err());
        assert_eq!(transport.service_requests().len(), 1);
        assert_eq!(ctx.metrics().snapshot().records_written, 0);
    }

    #[tokio::test]
    async fn test_update_without_identifier_is_rejected_before_buffering() {
        let transport = Arc::new(MockTransport::new());
        let ctx = context(transport.clone(), 10);
        let mut writer = ctx.writer("incident", WriteMode::Update);

        assert!(writer.write(&record("a")).await.is_err());
        assert_eq!(writer.buffered(), 0);
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_prepare_loads_write_schema() {
        let transport = Arc::new(MockTransport::new());
        transport
            .push_json(200, json!({ "result": [{ "sys_id": "1", "short_description": "x" }] }))
            .push_json(
                200,
                json!({ "result": [
                    { "name": "short_description", "internal_type": "string" },
                    { "name": "priority", "internal_type": "integer" }
                ] }),
            );

        let ctx = context(transport, 10);
        let mut writer = ctx.writer("incident", WriteMode::Insert);
        let schema = writer.prepare().await.unwrap();

        assert!(schema.column("priority").is_some());
        assert!(schema.column("sys_id").is_some());
    }
}

use crate::{
    http::HttpRequest,
    retry::{RetryDisposition, RetryError, RetryPolicy},
    servicenow::{
        TOTAL_COUNT_HEADER,
        classifier::{Classification, classify_read},
        client::ServiceClient,
        error::FetchError,
        query::{DisplayValue, table_read_url},
        schema::{MetadataColumn, MetadataResponse, ProbePurpose, TableSchema},
    },
};
use model::{
    pagination::{
        page::FetchResult,
        window::{DateRange, FetchWindow},
    },
    records::row::RowData,
};
use serde::Deserialize;
use serde_json::Value;
use std::time::Instant;
use tracing::{debug, info, warn};

/// `result` is required: a body without it is not an empty page.
#[derive(Deserialize)]
struct TableResponse {
    result: Vec<Value>,
}

/// One successful read: the rows plus the total-count header when present.
struct PageResponse {
    rows: Vec<RowData>,
    total_count: Option<usize>,
}

/// Paginated, retry-aware reads against the table API.
#[derive(Clone)]
pub struct PageFetcher {
    client: ServiceClient,
    display_value: DisplayValue,
    retry: RetryPolicy,
}

impl PageFetcher {
    pub fn new(client: ServiceClient, display_value: DisplayValue) -> Self {
        PageFetcher {
            client,
            display_value,
            retry: RetryPolicy::for_page_fetch(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Reads one page. An empty page is a valid result.
    pub async fn fetch_page(&self, window: &FetchWindow) -> Result<FetchResult, FetchError> {
        let start = Instant::now();
        let page = self.read(window).await?;
        Ok(FetchResult::new(
            page.rows,
            window.offset,
            window.limit,
            start.elapsed().as_millis(),
        ))
    }

    /// Reads one page, retrying only service-signalled or transport failures.
    pub async fn fetch_page_with_retry(
        &self,
        window: &FetchWindow,
    ) -> Result<FetchResult, FetchError> {
        let result = self
            .retry
            .run(|| self.fetch_page(window), retry_disposition)
            .await;
        unwrap_retry(result, window)
    }

    /// Total number of rows matching the table and optional date window.
    pub async fn fetch_record_count(
        &self,
        table: &str,
        range: Option<DateRange>,
    ) -> Result<usize, FetchError> {
        let window = FetchWindow::new(table, 0, 1).with_range(range);
        let page = self.read_with_retry(&window).await?;

        let count = page.total_count.ok_or_else(|| FetchError::NonRetryable {
            table: table.to_string(),
            offset: 0,
            status: 200,
            detail: format!("response carries no {TOTAL_COUNT_HEADER} header"),
        })?;

        info!("Table '{}' holds {} matching records", table, count);
        Ok(count)
    }

    /// Infers column names and kinds from a one-row read. For the write path the
    /// table's metadata is merged in so columns absent from the sample are known.
    pub async fn fetch_schema_probe(
        &self,
        table: &str,
        purpose: ProbePurpose,
    ) -> Result<TableSchema, FetchError> {
        let window = FetchWindow::new(table, 0, 1);
        let page = self.read_with_retry(&window).await?;

        if page.rows.is_empty() {
            warn!("Schema probe of '{}' returned no rows", table);
        }
        let mut schema = TableSchema::from_probe(table, page.rows.first());

        if purpose == ProbePurpose::Write {
            let result = self
                .retry
                .run(|| self.read_metadata(table), retry_disposition)
                .await;
            let columns = unwrap_retry(result, &window)?;
            schema.merge_metadata(columns);
        }

        debug!(
            "Schema of '{}': {} columns ({:?})",
            table,
            schema.columns.len(),
            schema.column_names()
        );
        Ok(schema)
    }

    async fn read_with_retry(&self, window: &FetchWindow) -> Result<PageResponse, FetchError> {
        let result = self
            .retry
            .run(|| self.read(window), retry_disposition)
            .await;
        unwrap_retry(result, window)
    }

    async fn read(&self, window: &FetchWindow) -> Result<PageResponse, FetchError> {
        window.validate()?;

        let url = table_read_url(self.client.endpoint(), window, self.display_value);
        let request = self.client.authorize(HttpRequest::get(url)).await?;

        debug!(
            "Fetching '{}' rows [{}, {})",
            window.table,
            window.offset,
            window.end()
        );

        let response = self
            .client
            .send(request)
            .await
            .map_err(|e| FetchError::Retryable {
                table: window.table.clone(),
                offset: window.offset,
                message: e.to_string(),
            })?;

        check_read(&window.table, window.offset, response.status, &response.body)?;

        let non_retryable = |detail: String| FetchError::NonRetryable {
            table: window.table.clone(),
            offset: window.offset,
            status: response.status,
            detail,
        };

        let parsed: TableResponse = serde_json::from_str(&response.body)
            .map_err(|e| non_retryable(format!("invalid response body: {e}")))?;

        let rows = parsed
            .result
            .into_iter()
            .map(|value| match value {
                Value::Object(fields) => Ok(RowData::new(&window.table, fields)),
                other => Err(non_retryable(format!("expected a row object, got {other}"))),
            })
            .collect::<Result<Vec<_>, _>>()?;

        let total_count = response
            .header(TOTAL_COUNT_HEADER)
            .and_then(|v| v.trim().parse::<usize>().ok());

        Ok(PageResponse { rows, total_count })
    }

    async fn read_metadata(&self, table: &str) -> Result<Vec<MetadataColumn>, FetchError> {
        let url = self.client.endpoint().table_schema_url(table);
        let request = self.client.authorize(HttpRequest::get(url)).await?;
        let response = self
            .client
            .send(request)
            .await
            .map_err(|e| FetchError::Retryable {
                table: table.to_string(),
                offset: 0,
                message: e.to_string(),
            })?;

        check_read(table, 0, response.status, &response.body)?;

        let fail = |detail: String| FetchError::NonRetryable {
            table: table.to_string(),
            offset: 0,
            status: response.status,
            detail,
        };

        let parsed: MetadataResponse = serde_json::from_str(&response.body)
            .map_err(|e| fail(format!("invalid metadata response: {e}")))?;
        Ok(parsed.result)
    }
}

/// Maps the read policy onto fetch errors; the record-drop outcome only applies
/// to writes and is treated like any other failure here.
fn check_read(table: &str, offset: usize, status: u16, body: &str) -> Result<(), FetchError> {
    match classify_read(status, body) {
        Classification::Success => Ok(()),
        Classification::Retryable(failure) => Err(FetchError::Retryable {
            table: table.to_string(),
            offset,
            message: failure.describe(status),
        }),
        Classification::RecordDropped(_, failure) => Err(FetchError::NonRetryable {
            table: table.to_string(),
            offset,
            status,
            detail: failure.describe(status),
        }),
        Classification::Terminal { detail, .. } => Err(FetchError::NonRetryable {
            table: table.to_string(),
            offset,
            status,
            detail,
        }),
    }
}

fn retry_disposition(err: &FetchError) -> RetryDisposition {
    if err.is_retryable() {
        RetryDisposition::Retry
    } else {
        RetryDisposition::Stop
    }
}

fn unwrap_retry<T>(
    result: Result<T, RetryError<FetchError>>,
    window: &FetchWindow,
) -> Result<T, FetchError> {
    match result {
        Ok(value) => Ok(value),
        Err(RetryError::Fatal(err)) => Err(err),
        Err(RetryError::AttemptsExceeded { attempts, last }) => Err(FetchError::Exhausted {
            table: window.table.clone(),
            start: window.offset,
            end: window.end(),
            attempts,
            last: Box::new(last),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        http::{
            HttpResponse, TransportError,
            mock::{MOCK_TOKEN, MockTransport},
        },
        servicenow::{ServiceEndpoint, auth::Credentials, schema::ColumnKind},
    };
    use serde_json::json;
    use std::{sync::Arc, time::Duration};

    const BASE: &str = "https://dev.service-now.com";

    fn fetcher(transport: Arc<MockTransport>) -> PageFetcher {
        let credentials = Credentials {
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
            username: "admin".to_string(),
            password: "pw".to_string(),
        };
        let client = ServiceClient::new(
            ServiceEndpoint::new(BASE),
            credentials,
            transport,
            RetryPolicy::fixed(5, Duration::ZERO),
        );
        PageFetcher::new(client, DisplayValue::Actual)
            .with_retry(RetryPolicy::fixed(5, Duration::ZERO))
    }

    fn budget_overrun() -> serde_json::Value {
        json!({
            "status": "failure",
            "error": {
                "message": "Transaction cancelled: maximum execution time exceeded",
                "detail": "Transaction cancelled"
            }
        })
    }

    #[tokio::test]
    async fn test_fetch_page_returns_rows_in_order() {
        let transport = Arc::new(MockTransport::new());
        transport.push_json(
            200,
            json!({ "result": [{ "sys_id": "a", "name": "one" }, { "sys_id": "b", "name": "two" }] }),
        );

        let page = fetcher(transport.clone())
            .fetch_page(&FetchWindow::new("sys_user", 5000, 5000))
            .await
            .unwrap();

        assert_eq!(page.row_count, 2);
        assert_eq!(page.offset, 5000);
        assert!(page.reached_end);
        assert_eq!(page.rows[0].get_str("name"), Some("one"));
        assert_eq!(page.rows[1].entity, "sys_user");

        let request = &transport.service_requests()[0];
        assert!(request.url.contains("sysparm_offset=5000&sysparm_limit=5000"));
        assert!(request.url.contains("sysparm_exclude_reference_link=true"));
        assert_eq!(request.bearer.as_deref(), Some(MOCK_TOKEN));
    }

    #[tokio::test]
    async fn test_empty_result_is_not_an_error() {
        let transport = Arc::new(MockTransport::new());
        transport.push_json(200, json!({ "result": [] }));

        let page = fetcher(transport)
            .fetch_page(&FetchWindow::new("incident", 0, 100))
            .await
            .unwrap();
        assert!(page.is_empty());
    }

    #[tokio::test]
    async fn test_budget_overrun_with_null_message_is_retryable() {
        let transport = Arc::new(MockTransport::new());
        transport.push_json(
            200,
            json!({
                "status": "failure",
                "error": {
                    "message": null,
                    "detail": "Transaction cancelled: maximum execution time exceeded"
                }
            }),
        );

        let err = fetcher(transport)
            .fetch_page(&FetchWindow::new("incident", 0, 100))
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_body_without_result_is_not_an_empty_page() {
        let transport = Arc::new(MockTransport::new());
        transport
            .push_json(200, json!({ "error": "boom" }))
            .push_json(200, json!({ "records": [] }));
        let fetcher = fetcher(transport.clone());
        let window = FetchWindow::new("incident", 0, 100);

        let err = fetcher.fetch_page_with_retry(&window).await.unwrap_err();
        assert!(matches!(err, FetchError::NonRetryable { status: 200, .. }));
        assert!(err.to_string().contains("boom"));

        let err = fetcher.fetch_page(&window).await.unwrap_err();
        match err {
            FetchError::NonRetryable { detail, .. } => {
                assert!(detail.contains("invalid response body"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(transport.service_requests().len(), 2);
    }

    #[tokio::test]
    async fn test_budget_overrun_on_200_is_retryable() {
        let transport = Arc::new(MockTransport::new());
        transport.push_json(200, budget_overrun());

        let err = fetcher(transport)
            .fetch_page(&FetchWindow::new("incident", 0, 100))
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_retry_recovers_from_budget_overrun() {
        let transport = Arc::new(MockTransport::new());
        transport
            .push_json(200, budget_overrun())
            .push_reply(Err(TransportError::Connection("reset".to_string())))
            .push_json(200, json!({ "result": [{ "sys_id": "a" }] }));

        let page = fetcher(transport.clone())
            .fetch_page_with_retry(&FetchWindow::new("incident", 0, 100))
            .await
            .unwrap();

        assert_eq!(page.row_count, 1);
        assert_eq!(transport.service_requests().len(), 3);
        // one token per attempt
        assert_eq!(transport.token_requests(), 3);
    }

    #[tokio::test]
    async fn test_retry_exhaustion_names_offset_range() {
        let transport = Arc::new(MockTransport::new());
        for _ in 0..5 {
            transport.push_json(200, budget_overrun());
        }

        let err = fetcher(transport.clone())
            .fetch_page_with_retry(&FetchWindow::new("incident", 10000, 5000))
            .await
            .unwrap_err();

        match &err {
            FetchError::Exhausted {
                table,
                start,
                end,
                attempts,
                ..
            } => {
                assert_eq!(table, "incident");
                assert_eq!((*start, *end, *attempts), (10000, 15000, 5));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().contains("[10000, 15000)"));
        assert_eq!(transport.service_requests().len(), 5);
    }

    #[tokio::test]
    async fn test_non_retryable_failure_is_not_retried() {
        let transport = Arc::new(MockTransport::new());
        transport.push_json(
            400,
            json!({ "status": "failure", "error": { "message": "Invalid table nope", "detail": null } }),
        );

        let err = fetcher(transport.clone())
            .fetch_page_with_retry(&FetchWindow::new("nope", 0, 100))
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::NonRetryable { status: 400, .. }));
        assert_eq!(transport.service_requests().len(), 1);
    }

    #[tokio::test]
    async fn test_oversized_page_is_rejected_before_any_request() {
        let transport = Arc::new(MockTransport::new());
        let err = fetcher(transport.clone())
            .fetch_page_with_retry(&FetchWindow::new("incident", 0, 5001))
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::InvalidWindow(_)));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_record_count_reads_total_header() {
        let transport = Arc::new(MockTransport::new());
        let body = json!({ "result": [{ "sys_id": "a" }] }).to_string();
        transport.push_reply(Ok(
            HttpResponse::new(200, body).with_header("X-Total-Count", "12000")
        ));

        let count = fetcher(transport.clone())
            .fetch_record_count("sys_user", None)
            .await
            .unwrap();

        assert_eq!(count, 12000);
        assert!(transport.service_requests()[0].url.contains("sysparm_limit=1"));
    }

    #[tokio::test]
    async fn test_record_count_without_header_fails() {
        let transport = Arc::new(MockTransport::new());
        transport.push_json(200, json!({ "result": [] }));

        let err = fetcher(transport)
            .fetch_record_count("sys_user", None)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::NonRetryable { .. }));
    }

    #[tokio::test]
    async fn test_write_probe_merges_table_metadata() {
        let transport = Arc::new(MockTransport::new());
        transport
            .push_json(200, json!({ "result": [{ "sys_id": "a", "active": "true" }] }))
            .push_json(
                200,
                json!({ "result": [
                    { "name": "active", "internal_type": "boolean" },
                    { "name": "short_description", "internal_type": "string" }
                ] }),
            );

        let schema = fetcher(transport.clone())
            .fetch_schema_probe("incident", ProbePurpose::Write)
            .await
            .unwrap();

        assert_eq!(
            schema.column_names(),
            vec!["sys_id", "active", "short_description"]
        );
        assert_eq!(schema.column("active").unwrap().kind, ColumnKind::Boolean);

        let requests = transport.service_requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].url.contains("sysparm_limit=1"));
        assert_eq!(
            requests[1].url,
            format!("{BASE}/api/now/doc/table/schema/incident")
        );
    }

    #[tokio::test]
    async fn test_read_probe_skips_metadata_lookup() {
        let transport = Arc::new(MockTransport::new());
        transport.push_json(200, json!({ "result": [{ "sys_id": "a" }] }));

        let schema = fetcher(transport.clone())
            .fetch_schema_probe("incident", ProbePurpose::Read)
            .await
            .unwrap();

        assert_eq!(schema.column_names(), vec!["sys_id"]);
        assert_eq!(transport.service_requests().len(), 1);
    }
}

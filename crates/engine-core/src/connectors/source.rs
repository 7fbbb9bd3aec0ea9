use crate::{
    error::EngineError,
    metrics::Metrics,
    plan::split::{TableSplit, plan_splits},
};
use connectors::servicenow::{
    fetcher::PageFetcher,
    schema::{ProbePurpose, TableSchema},
};
use model::{
    pagination::{page::FetchResult, window::DateRange},
    records::row::RowData,
};
use tracing::{debug, info, warn};

/// Reads one table split by split.
///
/// Clones share nothing mutable except the metrics counters, so a prepared
/// reader can be cloned once per split and each clone driven independently.
#[derive(Clone)]
pub struct TableReader {
    fetcher: PageFetcher,
    table: String,
    range: Option<DateRange>,
    page_size: usize,
    metrics: Metrics,
    schema: Option<TableSchema>,
    splits: Vec<TableSplit>,
}

impl TableReader {
    pub fn new(
        fetcher: PageFetcher,
        table: &str,
        range: Option<DateRange>,
        page_size: usize,
        metrics: Metrics,
    ) -> Self {
        TableReader {
            fetcher,
            table: table.to_string(),
            range,
            page_size,
            metrics,
            schema: None,
            splits: Vec::new(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn schema(&self) -> Option<&TableSchema> {
        self.schema.as_ref()
    }

    pub fn splits(&self) -> &[TableSplit] {
        &self.splits
    }

    /// Probes the schema, counts matching rows and plans the splits.
    pub async fn prepare(&mut self) -> Result<&[TableSplit], EngineError> {
        let schema = self
            .fetcher
            .fetch_schema_probe(&self.table, ProbePurpose::Read)
            .await?;
        let record_count = self
            .fetcher
            .fetch_record_count(&self.table, self.range)
            .await?;

        let splits: Vec<TableSplit> = plan_splits(&self.table, record_count, self.page_size)?
            .into_iter()
            .map(|split| split.with_range(self.range))
            .collect();

        info!(
            table = %self.table,
            records = record_count,
            columns = schema.columns.len(),
            splits = splits.len(),
            page_size = self.page_size,
            "Planned table read"
        );

        self.schema = Some(schema);
        self.splits = splits;
        Ok(self.splits.as_slice())
    }

    pub async fn read_split(&self, split: &TableSplit) -> Result<FetchResult, EngineError> {
        let result = match self.fetcher.fetch_page_with_retry(&split.window()).await {
            Ok(result) => result,
            Err(e) => {
                self.metrics.increment_failures(1);
                return Err(e.into());
            }
        };

        self.metrics.increment_pages(1);
        self.metrics.increment_records_read(result.row_count as u64);

        if result.row_count != split.expected_rows {
            warn!(
                table = %self.table,
                offset = split.offset,
                expected = split.expected_rows,
                actual = result.row_count,
                "Split row count differs from plan; table changed during read"
            );
        }

        debug!(
            table = %self.table,
            split = split.index,
            offset = split.offset,
            rows = result.row_count,
            took_ms = result.took_ms,
            "Split read"
        );
        Ok(result)
    }

    /// Reads every split in offset order, preparing first if needed.
    pub async fn read_all(&mut self) -> Result<Vec<RowData>, EngineError> {
        if self.schema.is_none() {
            self.prepare().await?;
        }

        let mut rows = Vec::new();
        for split in &self.splits {
            let page = self.read_split(split).await?;
            rows.extend(page.rows);
        }
        Ok(rows)
    }
}

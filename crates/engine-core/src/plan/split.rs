use model::pagination::window::{DateRange, FetchWindow, WindowError, validate_page_size};
use serde::Serialize;

/// One page-sized slice of a table read, independent of every other split.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSplit {
    pub table: String,
    pub index: usize,
    pub offset: usize,
    pub limit: usize,
    /// Rows the split should return if the table does not change mid-read.
    pub expected_rows: usize,
    pub range: Option<DateRange>,
}

impl TableSplit {
    pub fn with_range(mut self, range: Option<DateRange>) -> Self {
        self.range = range;
        self
    }

    pub fn window(&self) -> FetchWindow {
        FetchWindow::new(&self.table, self.offset, self.limit).with_range(self.range)
    }
}

/// Splits `record_count` rows into `ceil(record_count / page_size)` reads at
/// offsets `0, page_size, 2 * page_size, ...`.
pub fn plan_splits(
    table: &str,
    record_count: usize,
    page_size: usize,
) -> Result<Vec<TableSplit>, WindowError> {
    validate_page_size(page_size)?;

    let count = record_count.div_ceil(page_size);
    Ok((0..count)
        .map(|index| {
            let offset = index * page_size;
            TableSplit {
                table: table.to_string(),
                index,
                offset,
                limit: page_size,
                expected_rows: page_size.min(record_count - offset),
                range: None,
            }
        })
        .collect())
}

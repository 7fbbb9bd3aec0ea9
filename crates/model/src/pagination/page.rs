use crate::records::row::RowData;

/// Rows returned by one page read, together with where that page started.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub rows: Vec<RowData>,
    pub offset: usize,
    pub row_count: usize,
    /// True when the page came back shorter than requested.
    pub reached_end: bool,
    pub took_ms: u128,
}

impl FetchResult {
    pub fn new(rows: Vec<RowData>, offset: usize, limit: usize, took_ms: u128) -> Self {
        let row_count = rows.len();
        FetchResult {
            rows,
            offset,
            row_count,
            reached_end: row_count < limit,
            took_ms,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

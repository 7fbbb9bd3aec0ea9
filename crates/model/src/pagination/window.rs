use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Largest page the table API accepts in one read.
pub const MAX_PAGE_SIZE: usize = 5000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WindowError {
    #[error("Invalid date range: start {start} must be before end {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("Invalid page size {limit}: must be between 1 and {max}")]
    InvalidPageSize { limit: usize, max: usize },
}

/// Half-open `[start, end)` date filter matched against both the creation and
/// the last-update timestamp of a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, WindowError> {
        if start >= end {
            return Err(WindowError::InvalidRange { start, end });
        }
        Ok(DateRange { start, end })
    }
}

/// One bounded read against a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchWindow {
    pub table: String,
    pub range: Option<DateRange>,
    pub offset: usize,
    pub limit: usize,
}

impl FetchWindow {
    pub fn new(table: &str, offset: usize, limit: usize) -> Self {
        FetchWindow {
            table: table.to_string(),
            range: None,
            offset,
            limit,
        }
    }

    pub fn with_range(mut self, range: Option<DateRange>) -> Self {
        self.range = range;
        self
    }

    /// Exclusive end offset of the window.
    pub fn end(&self) -> usize {
        self.offset + self.limit
    }

    pub fn validate(&self) -> Result<(), WindowError> {
        validate_page_size(self.limit)
    }
}

pub fn validate_page_size(limit: usize) -> Result<(), WindowError> {
    if limit == 0 || limit > MAX_PAGE_SIZE {
        return Err(WindowError::InvalidPageSize {
            limit,
            max: MAX_PAGE_SIZE,
        });
    }
    Ok(())
}

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

#[derive(Debug, Default)]
struct InnerMetrics {
    records_read: AtomicU64,
    records_written: AtomicU64,
    records_skipped: AtomicU64,
    pages_fetched: AtomicU64,
    batches_submitted: AtomicU64,
    batch_rounds: AtomicU64,
    batch_retries: AtomicU64,
    failure_count: AtomicU64,
}

/// Counters shared by every reader and writer built from one context.
#[derive(Debug, Clone)]
pub struct Metrics {
    inner: Arc<InnerMetrics>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub records_read: u64,
    pub records_written: u64,
    pub records_skipped: u64,
    pub pages_fetched: u64,
    pub batches_submitted: u64,
    pub batch_rounds: u64,
    pub batch_retries: u64,
    pub failure_count: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Metrics {
            inner: Arc::new(InnerMetrics::default()),
        }
    }

    pub fn increment_records_read(&self, count: u64) {
        self.inner.records_read.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_records_written(&self, count: u64) {
        self.inner
            .records_written
            .fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_records_skipped(&self, count: u64) {
        self.inner
            .records_skipped
            .fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_pages(&self, count: u64) {
        self.inner.pages_fetched.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_batches(&self, count: u64) {
        self.inner
            .batches_submitted
            .fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_rounds(&self, count: u64) {
        self.inner.batch_rounds.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_retries(&self, count: u64) {
        self.inner.batch_retries.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_failures(&self, count: u64) {
        self.inner.failure_count.fetch_add(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            records_read: self.inner.records_read.load(Ordering::Relaxed),
            records_written: self.inner.records_written.load(Ordering::Relaxed),
            records_skipped: self.inner.records_skipped.load(Ordering::Relaxed),
            pages_fetched: self.inner.pages_fetched.load(Ordering::Relaxed),
            batches_submitted: self.inner.batches_submitted.load(Ordering::Relaxed),
            batch_rounds: self.inner.batch_rounds.load(Ordering::Relaxed),
            batch_retries: self.inner.batch_retries.load(Ordering::Relaxed),
            failure_count: self.inner.failure_count.load(Ordering::Relaxed),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing upload and query activity.
#[derive(Default)]
pub struct ServiceMetrics {
    documents_uploaded: AtomicU64,
    chunks_stored: AtomicU64,
    queries_completed: AtomicU64,
    queries_failed: AtomicU64,
    queries_cancelled: AtomicU64,
}

impl ServiceMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an ingested document and the number of chunks stored for it.
    pub fn record_upload(&self, chunk_count: u64) {
        self.documents_uploaded.fetch_add(1, Ordering::Relaxed);
        self.chunks_stored.fetch_add(chunk_count, Ordering::Relaxed);
    }

    /// Record the outcome of one query run.
    pub fn record_query(&self, succeeded: bool) {
        let counter = if succeeded {
            &self.queries_completed
        } else {
            &self.queries_failed
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a streaming run abandoned by its caller before the final event.
    pub fn record_cancelled_query(&self) {
        self.queries_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            documents_uploaded: self.documents_uploaded.load(Ordering::Relaxed),
            chunks_stored: self.chunks_stored.load(Ordering::Relaxed),
            queries_completed: self.queries_completed.load(Ordering::Relaxed),
            queries_failed: self.queries_failed.load(Ordering::Relaxed),
            queries_cancelled: self.queries_cancelled.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of service counters used for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Number of documents ingested since startup.
    pub documents_uploaded: u64,
    /// Total chunk count stored across all ingested documents.
    pub chunks_stored: u64,
    /// Query runs that produced a report.
    pub queries_completed: u64,
    /// Query runs that ended in an error.
    pub queries_failed: u64,
    /// Streaming runs dropped by the caller before completing or failing.
    pub queries_cancelled: u64,
}

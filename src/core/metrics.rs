//! Pipeline metrics for observability
//!
//! Counters for events moving through the pipeline: admission, hand-off,
//! delivery and the byte-level work done by output managers.

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics for logger observability
///
/// # Example
///
/// ```
/// use rust_async_logger::LoggerMetrics;
///
/// let metrics = LoggerMetrics::new();
///
/// metrics.record_published();
/// metrics.record_delivered();
/// metrics.record_filtered();
///
/// assert_eq!(metrics.published(), 1);
/// assert_eq!(metrics.delivered(), 1);
/// assert_eq!(metrics.filtered(), 1);
/// ```
#[derive(Debug)]
pub struct LoggerMetrics {
    /// Events handed to the ring buffer (or the sync path)
    published: AtomicU64,

    /// Events every appender accepted
    delivered: AtomicU64,

    /// Events at least one appender failed on
    delivery_failures: AtomicU64,

    /// Events discarded by the filter chain or neutral policy
    filtered: AtomicU64,

    /// Events offered after shutdown began
    rejected: AtomicU64,

    /// Times a producer had to wait for a free slot
    producer_waits: AtomicU64,

    /// Events dispatched with the end-of-batch flag set
    end_of_batch: AtomicU64,
}

impl LoggerMetrics {
    pub const fn new() -> Self {
        Self {
            published: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
            delivery_failures: AtomicU64::new(0),
            filtered: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            producer_waits: AtomicU64::new(0),
            end_of_batch: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn delivery_failures(&self) -> u64 {
        self.delivery_failures.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn filtered(&self) -> u64 {
        self.filtered.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn producer_waits(&self) -> u64 {
        self.producer_waits.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn end_of_batch_count(&self) -> u64 {
        self.end_of_batch.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn record_published(&self) -> u64 {
        self.published.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_delivered(&self) -> u64 {
        self.delivered.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_delivery_failure(&self) -> u64 {
        self.delivery_failures.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_filtered(&self) -> u64 {
        self.filtered.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_rejected(&self) -> u64 {
        self.rejected.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_producer_wait(&self) -> u64 {
        self.producer_waits.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_end_of_batch(&self) -> u64 {
        self.end_of_batch.fetch_add(1, Ordering::Relaxed)
    }

    /// Share of processed events that failed delivery, as a percentage.
    ///
    /// Returns 0.0 if nothing has been processed.
    pub fn failure_rate(&self) -> f64 {
        let failed = self.delivery_failures() as f64;
        let total = self.delivered() as f64 + failed;
        if total == 0.0 {
            0.0
        } else {
            (failed / total) * 100.0
        }
    }

    /// Reset all metrics to zero
    pub fn reset(&self) {
        self.published.store(0, Ordering::Relaxed);
        self.delivered.store(0, Ordering::Relaxed);
        self.delivery_failures.store(0, Ordering::Relaxed);
        self.filtered.store(0, Ordering::Relaxed);
        self.rejected.store(0, Ordering::Relaxed);
        self.producer_waits.store(0, Ordering::Relaxed);
        self.end_of_batch.store(0, Ordering::Relaxed);
    }
}

impl Default for LoggerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for LoggerMetrics {
    /// Create a snapshot of the current metrics values
    fn clone(&self) -> Self {
        Self {
            published: AtomicU64::new(self.published()),
            delivered: AtomicU64::new(self.delivered()),
            delivery_failures: AtomicU64::new(self.delivery_failures()),
            filtered: AtomicU64::new(self.filtered()),
            rejected: AtomicU64::new(self.rejected()),
            producer_waits: AtomicU64::new(self.producer_waits()),
            end_of_batch: AtomicU64::new(self.end_of_batch_count()),
        }
    }
}

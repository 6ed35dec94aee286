//! Processor metrics for observability
//!
//! Every counter is kept twice: in process-local atomics readable through
//! [`ProcessorMetrics::snapshot`], and on the `metrics` facade so an installed
//! recorder (e.g. the Prometheus exporter) sees the same events.

use metrics::counter;
use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics for a single processor
#[derive(Debug, Default)]
pub struct ProcessorMetrics {
    /// Total values accepted by `enqueue`
    enqueued: AtomicU64,
    /// Total values dropped because their channel was full
    evicted: AtomicU64,
    /// Total values handed to a consumer
    delivered: AtomicU64,
    /// Total completed dispatch passes
    passes: AtomicU64,
    /// Total consumer calls that panicked
    consumer_panics: AtomicU64,
}

impl ProcessorMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Get total enqueued count
    pub fn enqueued(&self) -> u64 {
        self.enqueued.load(Ordering::Relaxed)
    }

    /// Increment enqueued count
    pub fn inc_enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
        counter!("mqp_values_enqueued_total").increment(1);
    }

    /// Get total evicted count
    pub fn evicted(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }

    /// Increment evicted count
    pub fn inc_evicted(&self) {
        self.evicted.fetch_add(1, Ordering::Relaxed);
        counter!("mqp_values_evicted_total").increment(1);
    }

    /// Get total delivered count
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    /// Add to delivered count
    pub fn add_delivered(&self, n: u64) {
        if n > 0 {
            self.delivered.fetch_add(n, Ordering::Relaxed);
            counter!("mqp_values_delivered_total").increment(n);
        }
    }

    /// Get completed pass count
    pub fn passes(&self) -> u64 {
        self.passes.load(Ordering::Relaxed)
    }

    /// Increment pass count
    pub fn inc_passes(&self) {
        self.passes.fetch_add(1, Ordering::Relaxed);
        counter!("mqp_dispatch_passes_total").increment(1);
    }

    /// Get consumer panic count
    pub fn consumer_panics(&self) -> u64 {
        self.consumer_panics.load(Ordering::Relaxed)
    }

    /// Increment consumer panic count
    pub fn inc_consumer_panics(&self) {
        self.consumer_panics.fetch_add(1, Ordering::Relaxed);
        counter!("mqp_consumer_panics_total").increment(1);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            enqueued: self.enqueued(),
            evicted: self.evicted(),
            delivered: self.delivered(),
            passes: self.passes(),
            consumer_panics: self.consumer_panics(),
        }
    }
}

/// Snapshot of processor metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub enqueued: u64,
    pub evicted: u64,
    pub delivered: u64,
    pub passes: u64,
    pub consumer_panics: u64,
}

impl MetricsSnapshot {
    /// Values neither delivered nor evicted yet
    ///
    /// Includes values lost to consumer panics.
    pub fn in_flight(&self) -> u64 {
        self.enqueued
            .saturating_sub(self.evicted)
            .saturating_sub(self.delivered)
    }

    /// Share of enqueued values that were evicted, in percent
    pub fn eviction_rate(&self) -> f64 {
        if self.enqueued > 0 {
            self.evicted as f64 / self.enqueued as f64 * 100.0
        } else {
            0.0
        }
    }
}

//! Pipeline statistics and metrics.

use std::time::Duration;

use contracts::{ConsumerKind, StreamKey};
use dispatcher::MetricsSnapshot;
use observability::MetricsSummary;

/// Statistics from a pipeline run
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Total duration of the run
    pub duration: Duration,

    /// Processor counters at shutdown
    pub processor: MetricsSnapshot,

    /// Delivery statistics observed by consumers
    pub delivery: MetricsSummary,

    /// Per-stream producer/consumer counts
    pub streams: Vec<StreamStats>,
}

/// Per-stream part of [`PipelineStats`]
#[derive(Debug, Clone)]
pub struct StreamStats {
    pub key: StreamKey,
    pub consumer: ConsumerKind,
    /// Values enqueued by the producer
    pub produced: u64,
    /// Values the stock consumer handled
    pub consumed: u64,
    /// Values still queued when the processor stopped
    pub pending: usize,
}

impl PipelineStats {
    /// Delivered values per second
    pub fn throughput(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.processor.delivered as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n=== Processor Statistics ===\n");

        println!("Overview");
        println!("  Duration: {:.2}s", self.duration.as_secs_f64());
        println!("  Enqueued: {}", self.processor.enqueued);
        println!(
            "  Evicted: {} ({:.2}%)",
            self.processor.evicted,
            self.processor.eviction_rate()
        );
        println!("  Delivered: {}", self.processor.delivered);
        println!("  Dispatch passes: {}", self.processor.passes);
        println!("  Consumer panics: {}", self.processor.consumer_panics);
        println!("  Throughput: {:.2} values/s", self.throughput());

        println!("\nStreams");
        for stream in &self.streams {
            println!(
                "  {} ({:?}): produced={} consumed={} pending={}",
                stream.key, stream.consumer, stream.produced, stream.consumed, stream.pending
            );
        }

        println!("\n{}", self.delivery);
    }
}

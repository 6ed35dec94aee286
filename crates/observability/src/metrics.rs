//! Delivery metrics
//!
//! Facade recorders for producer/consumer events, and an in-memory aggregator
//! that checks per-stream sequence numbers as values arrive.

use std::collections::{BTreeMap, HashMap};

use metrics::{counter, gauge, histogram};

/// Record a value produced for `key`
pub fn record_value_produced(key: &str) {
    counter!("mqp_stream_produced_total", "key" => key.to_string()).increment(1);
}

/// Record a value received by the consumer of `key`
pub fn record_value_delivered(key: &str) {
    counter!("mqp_stream_delivered_total", "key" => key.to_string()).increment(1);
}

/// Record enqueue-to-consume latency
pub fn record_delivery_latency_ms(key: &str, latency_ms: f64) {
    histogram!("mqp_delivery_latency_ms", "key" => key.to_string()).record(latency_ms);
}

/// Record the pending depth of a channel
pub fn record_channel_depth(key: &str, depth: usize) {
    gauge!("mqp_channel_depth", "key" => key.to_string()).set(depth as f64);
}

/// Per-stream delivery aggregator
///
/// Fed with `(key, seq, latency)` for every delivered value, where `seq` is the
/// producer's per-key sequence number starting at 0. A jump in `seq` means
/// values were evicted before delivery; a step backwards is an ordering
/// violation and should never happen.
#[derive(Debug, Clone, Default)]
pub struct DeliveryAggregator {
    streams: HashMap<String, StreamState>,
}

#[derive(Debug, Clone, Default)]
struct StreamState {
    delivered: u64,
    next_seq: u64,
    skipped: u64,
    out_of_order: u64,
    latency: RunningStats,
}

impl DeliveryAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account one delivered value
    pub fn update(&mut self, key: &str, seq: u64, latency_ms: f64) {
        let state = self.streams.entry(key.to_string()).or_default();
        state.delivered += 1;
        state.latency.push(latency_ms);

        if seq < state.next_seq {
            state.out_of_order += 1;
        } else {
            state.skipped += seq - state.next_seq;
            state.next_seq = seq + 1;
        }
    }

    /// Total values delivered across streams
    pub fn total_delivered(&self) -> u64 {
        self.streams.values().map(|s| s.delivered).sum()
    }

    /// Build a summary report
    pub fn summary(&self) -> MetricsSummary {
        let mut overall = RunningStats::default();
        let streams: BTreeMap<String, StreamSummary> = self
            .streams
            .iter()
            .map(|(key, state)| {
                overall.merge(&state.latency);
                (
                    key.clone(),
                    StreamSummary {
                        delivered: state.delivered,
                        skipped: state.skipped,
                        out_of_order: state.out_of_order,
                        latency_ms: StatsSummary::from(&state.latency),
                    },
                )
            })
            .collect();

        MetricsSummary {
            total_delivered: streams.values().map(|s| s.delivered).sum(),
            total_skipped: streams.values().map(|s| s.skipped).sum(),
            total_out_of_order: streams.values().map(|s| s.out_of_order).sum(),
            latency_ms: StatsSummary::from(&overall),
            streams,
        }
    }
}

/// Per-stream part of [`MetricsSummary`]
#[derive(Debug, Clone, Default)]
pub struct StreamSummary {
    pub delivered: u64,
    /// Sequence numbers never seen by the consumer (evicted)
    pub skipped: u64,
    pub out_of_order: u64,
    pub latency_ms: StatsSummary,
}

/// Delivery summary
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub total_delivered: u64,
    pub total_skipped: u64,
    pub total_out_of_order: u64,
    pub latency_ms: StatsSummary,
    pub streams: BTreeMap<String, StreamSummary>,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Delivery Summary ===")?;
        writeln!(f, "Delivered: {}", self.total_delivered)?;
        writeln!(f, "Skipped (evicted): {}", self.total_skipped)?;
        writeln!(f, "Out of order: {}", self.total_out_of_order)?;
        writeln!(f, "Latency (ms): {}", self.latency_ms)?;

        for (key, stream) in &self.streams {
            writeln!(
                f,
                "  {}: delivered={} skipped={} latency_ms: {}",
                key, stream.delivered, stream.skipped, stream.latency_ms
            )?;
        }

        Ok(())
    }
}

/// Statistics summary
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online statistics (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// Add a sample
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    /// Number of samples
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Mean
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    /// Standard deviation
    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// Minimum
    pub fn min(&self) -> f64 {
        self.min
    }

    /// Maximum
    pub fn max(&self) -> f64 {
        self.max
    }

    /// Fold another accumulator into this one
    pub fn merge(&mut self, other: &RunningStats) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            *self = other.clone();
            return;
        }

        let count = self.count + other.count;
        let delta = other.mean - self.mean;
        self.m2 += other.m2 + delta * delta * (self.count * other.count) as f64 / count as f64;
        self.mean += delta * other.count as f64 / count as f64;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        self.count = count;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::default();
        for v in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] {
            stats.push(v);
        }

        assert_eq!(stats.count(), 8);
        assert!((stats.mean() - 5.0).abs() < 1e-9);
        assert_eq!(stats.min(), 2.0);
        assert_eq!(stats.max(), 9.0);
        assert!((stats.variance() - 32.0 / 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_merge_matches_single_pass() {
        let values = [1.0, 3.0, 8.0, 2.5, 10.0, 4.0];
        let mut whole = RunningStats::default();
        let mut left = RunningStats::default();
        let mut right = RunningStats::default();
        for (i, v) in values.iter().enumerate() {
            whole.push(*v);
            if i < 2 {
                left.push(*v);
            } else {
                right.push(*v);
            }
        }

        left.merge(&right);
        assert_eq!(left.count(), whole.count());
        assert!((left.mean() - whole.mean()).abs() < 1e-9);
        assert!((left.variance() - whole.variance()).abs() < 1e-9);
        assert_eq!(left.min(), 1.0);
        assert_eq!(left.max(), 10.0);
    }

    #[test]
    fn test_empty_summary_displays_na() {
        let summary = StatsSummary::from(&RunningStats::default());
        assert_eq!(summary.to_string(), "N/A");
    }

    #[test]
    fn test_aggregator_counts_gaps() {
        let mut agg = DeliveryAggregator::new();
        // seq 1 and 2 were evicted
        for seq in [0, 3, 4] {
            agg.update("a", seq, 1.0);
        }
        agg.update("b", 0, 2.0);

        let summary = agg.summary();
        assert_eq!(summary.total_delivered, 4);
        assert_eq!(summary.total_skipped, 2);
        assert_eq!(summary.total_out_of_order, 0);
        assert_eq!(summary.streams["a"].skipped, 2);
        assert_eq!(summary.streams["b"].delivered, 1);
        assert_eq!(summary.latency_ms.count, 4);
    }

    #[test]
    fn test_aggregator_flags_reordering() {
        let mut agg = DeliveryAggregator::new();
        agg.update("a", 5, 0.0);
        agg.update("a", 4, 0.0);

        let summary = agg.summary();
        assert_eq!(summary.total_out_of_order, 1);
        assert_eq!(agg.total_delivered(), 2);
    }
}

//! Synthetic values and the consumer wrapper that measures them.

use std::sync::Arc;
use std::time::Instant;

use contracts::{Consumer, StreamKey};
use dispatcher::ConsumerRef;
use observability::DeliveryAggregator;
use parking_lot::Mutex;
use serde::Serialize;

/// Value produced by the synthetic load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Sample {
    /// Per-key sequence number, starting at 0
    pub seq: u64,
    /// Production time in microseconds since the run epoch
    pub produced_at_us: u64,
}

/// Records delivery statistics, then hands the value to the stock consumer
pub struct TrackingConsumer {
    inner: ConsumerRef<StreamKey, Sample>,
    aggregator: Arc<Mutex<DeliveryAggregator>>,
    epoch: Instant,
}

impl TrackingConsumer {
    pub fn new(
        inner: ConsumerRef<StreamKey, Sample>,
        aggregator: Arc<Mutex<DeliveryAggregator>>,
        epoch: Instant,
    ) -> Self {
        Self {
            inner,
            aggregator,
            epoch,
        }
    }
}

impl Consumer<StreamKey, Sample> for TrackingConsumer {
    fn consume(&self, key: &StreamKey, value: Sample) {
        let now_us = self.epoch.elapsed().as_micros() as u64;
        let latency_ms = now_us.saturating_sub(value.produced_at_us) as f64 / 1000.0;

        self.aggregator.lock().update(key, value.seq, latency_ms);
        observability::record_value_delivered(key);
        observability::record_delivery_latency_ms(key, latency_ms);

        self.inner.consume(key, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dispatcher::CollectingConsumer;

    #[test]
    fn test_tracking_forwards_and_counts() {
        let collect = Arc::new(CollectingConsumer::<StreamKey, Sample>::new());
        let aggregator = Arc::new(Mutex::new(DeliveryAggregator::new()));
        let tracking = TrackingConsumer::new(collect.clone(), aggregator.clone(), Instant::now());

        let key = StreamKey::from("a");
        for seq in [0, 1, 3] {
            tracking.consume(
                &key,
                Sample {
                    seq,
                    produced_at_us: 0,
                },
            );
        }

        assert_eq!(collect.len(), 3);
        let summary = aggregator.lock().summary();
        assert_eq!(summary.total_delivered, 3);
        assert_eq!(summary.total_skipped, 1);
    }
}

//! # Integration Tests
//!
//! Cross-crate tests for the multi-queue processor.
//!
//! Covers:
//! - Configuration files driving a live processor
//! - Channel properties (ordering, bounds, eviction, key isolation)
//! - Subscription lifecycle and delivery liveness

#[cfg(test)]
mod support {
    use std::time::{Duration, Instant};

    /// Poll `condition` until it holds or `timeout` passes
    pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        condition()
    }

    pub const TIMEOUT: Duration = Duration::from_secs(5);
}

#[cfg(test)]
mod contract_tests {
    #[test]
    fn test_default_blueprint_is_valid() {
        let blueprint = config_loader::ConfigLoader::new()
            .load_str("", config_loader::ConfigFormat::Toml)
            .unwrap();
        assert_eq!(blueprint.version, contracts::ConfigVersion::V1);
        assert_eq!(
            blueprint.processor.max_channel_size,
            contracts::DEFAULT_MAX_CHANNEL_SIZE
        );
        assert!(blueprint.streams.is_empty());
    }
}

#[cfg(test)]
mod property_tests {
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use dispatcher::{CollectingConsumer, MultiQueueProcessor};

    use crate::support::{wait_until, TIMEOUT};

    type Collector = Arc<CollectingConsumer<&'static str, u64>>;

    fn collector() -> Collector {
        Arc::new(CollectingConsumer::new())
    }

    #[test]
    fn test_fifo_per_key() {
        let processor = MultiQueueProcessor::<&str, u64>::new(1000).unwrap();
        for i in 0..500 {
            processor.enqueue("a", i);
        }

        let sink = collector();
        processor.subscribe("a", sink.clone());

        assert!(wait_until(TIMEOUT, || sink.len() == 500));
        assert_eq!(sink.values(), (0..500).collect::<Vec<_>>());
    }

    #[test]
    fn test_fifo_with_concurrent_producer() {
        let processor = Arc::new(MultiQueueProcessor::<&str, u64>::new(1000).unwrap());
        let sink = collector();
        processor.subscribe("a", sink.clone());

        let producer = {
            let processor = Arc::clone(&processor);
            thread::spawn(move || {
                for i in 0..2000 {
                    processor.enqueue("a", i);
                }
            })
        };
        producer.join().unwrap();

        assert!(wait_until(TIMEOUT, || sink.values().last() == Some(&1999)));
        let values = sink.values();
        // evictions may drop values but never reorder them
        assert!(values.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(processor.channel_len(&"a"), 0);
    }

    #[test]
    fn test_bounded_memory() {
        let processor = MultiQueueProcessor::<&str, u64>::new(16).unwrap();
        for i in 0..10_000 {
            processor.enqueue("idle", i);
        }

        assert_eq!(processor.channel_len(&"idle"), 16);
        assert_eq!(processor.pending(), 16);
        assert_eq!(processor.metrics().snapshot().evicted, 10_000 - 16);
        assert_eq!(
            processor.channel_snapshot(&"idle"),
            (10_000 - 16..10_000).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_overwrite_oldest() {
        let processor = MultiQueueProcessor::<&str, u64>::new(3).unwrap();
        assert_eq!(processor.enqueue("a", 1), None);
        assert_eq!(processor.enqueue("a", 2), None);
        assert_eq!(processor.enqueue("a", 3), None);
        assert_eq!(processor.enqueue("a", 4), Some(1));
        assert_eq!(processor.enqueue("a", 5), Some(2));

        assert_eq!(processor.channel_snapshot(&"a"), vec![3, 4, 5]);
    }

    #[test]
    fn test_independent_keys() {
        let processor = MultiQueueProcessor::<&str, u64>::new(2).unwrap();
        processor.enqueue("b", 100);
        for i in 0..10 {
            processor.enqueue("a", i);
        }

        assert_eq!(processor.channel_snapshot(&"a"), vec![8, 9]);
        assert_eq!(processor.channel_snapshot(&"b"), vec![100]);

        let sink_b = collector();
        processor.subscribe("b", sink_b.clone());
        assert!(wait_until(TIMEOUT, || sink_b.len() == 1));
        // "a" has no consumer and keeps its values
        assert_eq!(processor.channel_len(&"a"), 2);
        assert!(sink_b.items().iter().all(|(key, _)| *key == "b"));
    }

    #[test]
    fn test_late_subscribe_receives_backlog() {
        let processor = MultiQueueProcessor::<&str, u64>::new(10).unwrap();
        for i in 0..5 {
            processor.enqueue("late", i);
        }
        thread::sleep(Duration::from_millis(20));
        assert_eq!(processor.channel_len(&"late"), 5);

        let sink = collector();
        processor.subscribe("late", sink.clone());
        processor.enqueue("late", 5);

        assert!(wait_until(TIMEOUT, || sink.len() == 6));
        assert_eq!(sink.values(), (0..6).collect::<Vec<_>>());
    }

    #[test]
    fn test_unsubscribe_then_resubscribe() {
        let processor = MultiQueueProcessor::<&str, u64>::new(10).unwrap();
        let first = collector();
        processor.subscribe("a", first.clone());
        processor.enqueue("a", 1);
        assert!(wait_until(TIMEOUT, || first.len() == 1));

        assert!(processor.unsubscribe(&"a").is_some());
        processor.enqueue("a", 2);
        processor.enqueue("a", 3);
        thread::sleep(Duration::from_millis(20));

        assert_eq!(first.values(), vec![1]);
        assert_eq!(processor.channel_snapshot(&"a"), vec![2, 3]);

        let second = collector();
        processor.subscribe("a", second.clone());
        assert!(wait_until(TIMEOUT, || second.len() == 2));
        assert_eq!(second.values(), vec![2, 3]);
        assert_eq!(first.len(), 1);
    }

    #[test]
    fn test_no_delivery_after_unsubscribe_returns() {
        use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

        let processor = MultiQueueProcessor::<&str, u64>::new(4).unwrap();
        let late = Arc::new(AtomicU64::new(0));

        for round in 0..2000 {
            let unsubscribed = Arc::new(AtomicBool::new(false));
            let consumer = {
                let unsubscribed = Arc::clone(&unsubscribed);
                let late = Arc::clone(&late);
                move |_: &&str, _: u64| {
                    if unsubscribed.load(Ordering::SeqCst) {
                        late.fetch_add(1, Ordering::SeqCst);
                    }
                }
            };

            processor.subscribe("a", Arc::new(consumer));
            processor.enqueue("a", round);
            processor.unsubscribe(&"a");
            unsubscribed.store(true, Ordering::SeqCst);
        }

        // Let any pass still running finish before checking.
        thread::sleep(Duration::from_millis(20));
        assert_eq!(late.load(Ordering::SeqCst), 0);
        processor.shutdown();
    }

    #[test]
    fn test_no_cross_key_starvation() {
        let processor = Arc::new(MultiQueueProcessor::<&str, u64>::new(64).unwrap());
        let hot = collector();
        let cold = collector();
        processor.subscribe("hot", hot.clone());
        processor.subscribe("cold", cold.clone());

        let flooding = Arc::new(std::sync::atomic::AtomicBool::new(true));
        let producer = {
            let processor = Arc::clone(&processor);
            let flooding = Arc::clone(&flooding);
            thread::spawn(move || {
                let mut i = 0;
                while flooding.load(std::sync::atomic::Ordering::Relaxed) {
                    processor.enqueue("hot", i);
                    i += 1;
                }
            })
        };

        assert!(wait_until(TIMEOUT, || hot.len() > 100));
        processor.enqueue("cold", 7);
        let delivered = wait_until(TIMEOUT, || cold.len() == 1);

        flooding.store(false, std::sync::atomic::Ordering::Relaxed);
        producer.join().unwrap();

        assert!(delivered);
        assert_eq!(cold.values(), vec![7]);
    }

    #[test]
    fn test_capacity_two_scenario() {
        let processor = MultiQueueProcessor::<&str, u64>::new(2).unwrap();
        processor.enqueue("k", 1);
        processor.enqueue("k", 2);
        processor.enqueue("k", 3);
        assert_eq!(processor.channel_snapshot(&"k"), vec![2, 3]);

        let sink = collector();
        processor.subscribe("k", sink.clone());
        assert!(wait_until(TIMEOUT, || sink.len() == 2));
        assert_eq!(sink.values(), vec![2, 3]);

        let snapshot = processor.shutdown();
        assert_eq!(snapshot.enqueued, 3);
        assert_eq!(snapshot.evicted, 1);
        assert_eq!(snapshot.delivered, 2);
        assert_eq!(snapshot.in_flight(), 0);
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::io::Write;
    use std::sync::Arc;

    use contracts::{ConsumerKind, StreamKey};
    use dispatcher::{JsonLinesConsumer, MultiQueueProcessor};
    use observability::DeliveryAggregator;
    use parking_lot::Mutex;

    use crate::support::{wait_until, TIMEOUT};

    const CONFIG: &str = r#"
[processor]
max_channel_size = 4

[processor.idle]
mode = "park"
timeout_ms = 5

[[streams]]
key = "gps"
rate_hz = 10.0
consumer = "json_lines"
"#;

    #[test]
    fn test_config_file_drives_json_lines_stream() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("gps.jsonl");

        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "{CONFIG}params = {{ path = {:?} }}", output.display().to_string()).unwrap();

        let blueprint = config_loader::ConfigLoader::new().load(file.path()).unwrap();
        let stream = blueprint.stream("gps").unwrap();
        assert_eq!(stream.consumer, ConsumerKind::JsonLines);
        assert!(blueprint.processor.idle.park_timeout().is_some());

        let processor =
            MultiQueueProcessor::<StreamKey, u64>::with_config(blueprint.processor.clone())
                .unwrap();
        let consumer = Arc::new(JsonLinesConsumer::from_params("gps", &stream.params).unwrap());
        processor.subscribe(stream.key.clone(), consumer.clone());

        for i in 0..20 {
            processor.enqueue(stream.key.clone(), i);
        }
        assert!(wait_until(TIMEOUT, || processor.pending() == 0));
        processor.shutdown();
        consumer.flush().unwrap();

        let content = std::fs::read_to_string(&output).unwrap();
        let seqs: Vec<u64> = content
            .lines()
            .map(|line| {
                let value: serde_json::Value = serde_json::from_str(line).unwrap();
                assert_eq!(value["key"], "gps");
                value["value"].as_u64().unwrap()
            })
            .collect();

        assert_eq!(seqs.len() as u64, consumer.written());
        assert!(seqs.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(seqs.last(), Some(&19));
    }

    #[test]
    fn test_gaps_seen_by_consumer_match_evictions() {
        let processor = MultiQueueProcessor::<StreamKey, u64>::new(3).unwrap();
        let key = StreamKey::from("imu");
        for seq in 0..10 {
            processor.enqueue(key.clone(), seq);
        }

        let aggregator = Arc::new(Mutex::new(DeliveryAggregator::new()));
        let seen = Arc::clone(&aggregator);
        processor.subscribe(
            key.clone(),
            Arc::new(move |key: &StreamKey, seq: u64| seen.lock().update(key, seq, 0.0)),
        );

        assert!(wait_until(TIMEOUT, || aggregator.lock().total_delivered() == 3));
        let snapshot = processor.shutdown();

        let summary = aggregator.lock().summary();
        assert_eq!(summary.total_skipped, snapshot.evicted);
        assert_eq!(summary.total_out_of_order, 0);
        assert_eq!(summary.streams["imu"].delivered, 3);
    }

    #[test]
    fn test_invalid_config_never_starts_processor() {
        let err = config_loader::ConfigLoader::new()
            .load_str(
                "[processor]\nmax_channel_size = 0\n",
                config_loader::ConfigFormat::Toml,
            )
            .unwrap_err();
        assert!(err.to_string().contains("max_channel_size"));

        let config = contracts::ProcessorConfig::with_max_channel_size(0);
        assert!(MultiQueueProcessor::<StreamKey, u64>::with_config(config).is_err());
    }
}

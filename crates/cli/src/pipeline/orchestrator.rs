//! Pipeline orchestrator - wires producers, processor and consumers.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use contracts::{ConsumerKind, ProcessorBlueprint, StreamConfig, StreamKey};
use dispatcher::{
    CollectingConsumer, ConsumerRef, JsonLinesConsumer, LogConsumer, MultiQueueProcessor,
};
use observability::DeliveryAggregator;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::{PipelineStats, Sample, StreamStats, TrackingConsumer};
use crate::error::CliError;

/// Upper bound on a producer tick period
const MAX_TICK_PERIOD: Duration = Duration::from_secs(3600);

type Processor = MultiQueueProcessor<StreamKey, Sample>;

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// The processor blueprint
    pub blueprint: ProcessorBlueprint,

    /// Run duration (None = until the shutdown future resolves)
    pub duration: Option<Duration>,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,

    /// How long to wait for queued values after producers stop
    pub drain_timeout: Duration,
}

impl PipelineConfig {
    pub fn new(blueprint: ProcessorBlueprint) -> Self {
        Self {
            blueprint,
            duration: None,
            metrics_port: None,
            drain_timeout: Duration::from_secs(1),
        }
    }
}

/// Stock consumer behind a stream, kept for its counters
enum StockConsumer {
    Log(Arc<LogConsumer>),
    Collect(Arc<CollectingConsumer<StreamKey, Sample>>),
    JsonLines(Arc<JsonLinesConsumer>),
}

impl StockConsumer {
    fn build(stream: &StreamConfig) -> crate::error::Result<Self> {
        let name = format!("{}-consumer", stream.key);
        Ok(match stream.consumer {
            ConsumerKind::Log => Self::Log(Arc::new(LogConsumer::new(name))),
            ConsumerKind::Collect => Self::Collect(Arc::new(CollectingConsumer::new())),
            ConsumerKind::JsonLines => Self::JsonLines(Arc::new(JsonLinesConsumer::from_params(
                name,
                &stream.params,
            )?)),
        })
    }

    fn handle(&self) -> ConsumerRef<StreamKey, Sample> {
        match self {
            Self::Log(c) => c.clone(),
            Self::Collect(c) => c.clone(),
            Self::JsonLines(c) => c.clone(),
        }
    }

    fn consumed(&self) -> u64 {
        match self {
            Self::Log(c) => c.seen(),
            Self::Collect(c) => c.len() as u64,
            Self::JsonLines(c) => c.written(),
        }
    }

    fn finish(&self) {
        if let Self::JsonLines(c) = self {
            if let Err(e) = c.flush() {
                warn!(path = %c.path().display(), error = %e, "Failed to flush JSON lines output");
            }
        }
    }
}

struct StreamRun {
    key: StreamKey,
    kind: ConsumerKind,
    consumer: StockConsumer,
    producer: JoinHandle<u64>,
}

/// Main pipeline orchestrator
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a new pipeline with the given configuration
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run until the configured duration elapses or `shutdown` resolves,
    /// then drain and stop the processor
    pub async fn run<F>(self, shutdown: F) -> Result<PipelineStats>
    where
        F: Future<Output = ()>,
    {
        let start_time = Instant::now();
        let blueprint = &self.config.blueprint;

        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        let processor = Arc::new(
            Processor::with_config(blueprint.processor.clone())
                .context("Failed to start processor")?,
        );
        let aggregator = Arc::new(Mutex::new(DeliveryAggregator::new()));
        let (stop_tx, stop_rx) = watch::channel(false);
        let epoch = Instant::now();

        let mut streams = Vec::with_capacity(blueprint.streams.len());
        let mut subscribers = Vec::new();

        for stream in &blueprint.streams {
            let consumer = StockConsumer::build(stream)?;
            let tracked: ConsumerRef<StreamKey, Sample> = Arc::new(TrackingConsumer::new(
                consumer.handle(),
                Arc::clone(&aggregator),
                epoch,
            ));

            if stream.subscribe_delay_ms == 0 {
                processor.subscribe(stream.key.clone(), tracked);
            } else {
                subscribers.push(tokio::spawn(subscribe_later(
                    Arc::clone(&processor),
                    stream.key.clone(),
                    tracked,
                    Duration::from_millis(stream.subscribe_delay_ms),
                    stop_rx.clone(),
                )));
            }

            let producer = tokio::spawn(produce(
                Arc::clone(&processor),
                stream.clone(),
                epoch,
                stop_rx.clone(),
            ));

            streams.push(StreamRun {
                key: stream.key.clone(),
                kind: stream.consumer,
                consumer,
                producer,
            });
        }

        info!(
            streams = streams.len(),
            offered_load = format!("{:.1}", blueprint.offered_load()),
            duration = ?self.config.duration,
            "Pipeline running"
        );

        tokio::pin!(shutdown);
        let reason = match self.config.duration {
            Some(duration) => tokio::select! {
                _ = tokio::time::sleep(duration) => "duration elapsed",
                _ = &mut shutdown => "shutdown signal",
            },
            None => {
                (&mut shutdown).await;
                "shutdown signal"
            }
        };
        info!(reason, "Stopping producers");

        let _ = stop_tx.send(true);

        let mut produced = Vec::with_capacity(streams.len());
        for stream in &mut streams {
            let count = (&mut stream.producer)
                .await
                .map_err(|e| CliError::pipeline_execution(format!("producer task failed: {e}")))?;
            produced.push(count);
        }
        for subscriber in subscribers {
            if let Err(e) = subscriber.await {
                warn!(error = %e, "Subscriber task failed");
            }
        }

        let drain_deadline = Instant::now() + self.config.drain_timeout;
        while processor.pending() > 0 && Instant::now() < drain_deadline {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let pending: Vec<usize> = streams
            .iter()
            .map(|s| processor.channel_len(&s.key))
            .collect();

        let snapshot = match Arc::try_unwrap(processor) {
            Ok(processor) => processor.shutdown(),
            Err(shared) => {
                warn!("Processor still shared at shutdown; stopping on drop");
                shared.metrics().snapshot()
            }
        };

        let stream_stats = streams
            .iter()
            .zip(produced)
            .zip(pending)
            .map(|((stream, produced), pending)| {
                stream.consumer.finish();
                StreamStats {
                    key: stream.key.clone(),
                    consumer: stream.kind,
                    produced,
                    consumed: stream.consumer.consumed(),
                    pending,
                }
            })
            .collect();

        let stats = PipelineStats {
            duration: start_time.elapsed(),
            processor: snapshot,
            delivery: aggregator.lock().summary(),
            streams: stream_stats,
        };

        info!(
            duration_secs = stats.duration.as_secs_f64(),
            throughput = format!("{:.2}", stats.throughput()),
            "Pipeline shutdown complete"
        );

        Ok(stats)
    }
}

/// Subscribe `consumer` after `delay`, unless the run stops first
async fn subscribe_later(
    processor: Arc<Processor>,
    key: StreamKey,
    consumer: ConsumerRef<StreamKey, Sample>,
    delay: Duration,
    mut stop: watch::Receiver<bool>,
) {
    tokio::select! {
        _ = tokio::time::sleep(delay) => {
            debug!(key = %key, queued = processor.channel_len(&key), "Late subscribe");
            processor.subscribe(key, consumer);
        }
        _ = stop.changed() => {
            debug!(key = %key, "Run stopped before subscribe");
        }
    }
}

/// Enqueue `burst` values per tick until stopped; returns the number produced
async fn produce(
    processor: Arc<Processor>,
    stream: StreamConfig,
    epoch: Instant,
    mut stop: watch::Receiver<bool>,
) -> u64 {
    let period = Duration::try_from_secs_f64(1.0 / stream.rate_hz)
        .unwrap_or(MAX_TICK_PERIOD)
        .min(MAX_TICK_PERIOD);
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut seq = 0u64;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                for _ in 0..stream.burst {
                    let sample = Sample {
                        seq,
                        produced_at_us: epoch.elapsed().as_micros() as u64,
                    };
                    seq += 1;
                    processor.enqueue(stream.key.clone(), sample);
                    observability::record_value_produced(&stream.key);
                }
                observability::record_channel_depth(&stream.key, processor.channel_len(&stream.key));
            }
            _ = stop.changed() => break,
        }
    }

    debug!(key = %stream.key, produced = seq, "Producer stopped");
    seq
}

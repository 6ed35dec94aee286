//! MultiQueueProcessor - keyed bounded queues drained by one dispatch thread
//!
//! ```text
//!  enqueue(k, v) ──► ChannelStore ─┐          ┌─► consumer[k1].consume(k1, v)
//!                   (channel lock) │ dispatch │
//!  subscribe(k, c) ─► Registry ────┤  thread  ├─► consumer[k2].consume(k2, v)
//!                   (registry lock)┘  (pass)  └─► ...
//! ```
//!
//! ## Locking
//! - Registry lock: taken by subscribe/unsubscribe and held by the dispatch
//!   thread for a whole pass, so a pass sees one consistent consumer set.
//! - Channel lock: taken by enqueue and by the dispatch thread once per key,
//!   only around the pop. Delivery runs outside it.
//! - The channel lock is never taken twice in a row without release, and the
//!   registry lock is never taken while the channel lock is held. No lock
//!   order cycle exists.
//!
//! ## Pass
//! Each pass delivers at most one value per registered key. A key with a
//! backlog gets one value per pass, the same as every other key.

use std::hash::Hash;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, error, info, instrument, trace};
use validator::Validate;

use contracts::{ContractError, IdleStrategy, ProcessorConfig};

use crate::channel::ChannelStore;
use crate::error::DispatcherError;
use crate::metrics::{MetricsSnapshot, ProcessorMetrics};
use crate::registry::{ConsumerRef, Registry};

/// State shared between the processor handle and its dispatch thread
struct Shared<K, V> {
    registry: Mutex<Registry<K, V>>,
    channels: Mutex<ChannelStore<K, V>>,
    running: AtomicBool,
    metrics: Arc<ProcessorMetrics>,
    idle: IdleStrategy,
}

/// Keyed multi-queue processor
///
/// Producers call [`enqueue`](Self::enqueue) from any thread; a background
/// dispatch thread hands queued values to the consumer subscribed for their
/// key. The thread starts in the constructor and is stopped and joined by
/// [`shutdown`](Self::shutdown) or on drop.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use std::sync::mpsc;
/// use dispatcher::MultiQueueProcessor;
///
/// let processor = MultiQueueProcessor::<String, u32>::new(16).unwrap();
/// let (tx, rx) = mpsc::channel();
/// let tx = std::sync::Mutex::new(tx);
/// processor.subscribe(
///     "a".to_string(),
///     Arc::new(move |_: &String, value: u32| {
///         let _ = tx.lock().unwrap().send(value);
///     }),
/// );
/// processor.enqueue("a".to_string(), 1);
/// assert_eq!(rx.recv().unwrap(), 1);
/// ```
pub struct MultiQueueProcessor<K, V> {
    shared: Arc<Shared<K, V>>,
    worker: Option<JoinHandle<()>>,
    max_channel_size: usize,
}

impl<K, V> MultiQueueProcessor<K, V>
where
    K: Eq + Hash + Send + 'static,
    V: Send + 'static,
{
    /// Create a processor with `max_channel_size` and default settings, and
    /// start its dispatch thread
    pub fn new(max_channel_size: usize) -> Result<Self, DispatcherError> {
        Self::with_config(ProcessorConfig::with_max_channel_size(max_channel_size))
    }

    /// Create a processor from a full configuration and start its dispatch thread
    ///
    /// # Errors
    /// - `InvalidConfig` when the configuration fails validation
    /// - `Spawn` when the OS refuses to start the thread
    #[instrument(
        name = "processor_start",
        skip(config),
        fields(max_channel_size = config.max_channel_size, thread = %config.thread_name)
    )]
    pub fn with_config(config: ProcessorConfig) -> Result<Self, DispatcherError> {
        config.validate().map_err(ContractError::from)?;

        let shared = Arc::new(Shared {
            registry: Mutex::new(Registry::new()),
            channels: Mutex::new(ChannelStore::new(config.max_channel_size)),
            running: AtomicBool::new(true),
            metrics: Arc::new(ProcessorMetrics::new()),
            idle: config.idle,
        });

        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || dispatch_loop(worker_shared))
            .map_err(|source| DispatcherError::Spawn {
                thread_name: config.thread_name.clone(),
                source,
            })?;

        info!(
            max_channel_size = config.max_channel_size,
            idle = ?config.idle,
            "Processor started"
        );

        Ok(Self {
            shared,
            worker: Some(worker),
            max_channel_size: config.max_channel_size,
        })
    }

    /// Register `consumer` for `key`, replacing any previous consumer
    ///
    /// Takes effect from the next dispatch pass. Returns the replaced consumer.
    pub fn subscribe(&self, key: K, consumer: ConsumerRef<K, V>) -> Option<ConsumerRef<K, V>> {
        let replaced = self.shared.registry.lock().insert(key, consumer);
        debug!(replaced = replaced.is_some(), "Consumer subscribed");
        self.wake();
        replaced
    }

    /// Remove the consumer for `key`; no-op when none is registered
    ///
    /// Once this returns the removed consumer receives nothing more. The
    /// key's channel keeps its values for a later subscriber.
    pub fn unsubscribe(&self, key: &K) -> Option<ConsumerRef<K, V>> {
        let removed = self.shared.registry.lock().remove(key);
        debug!(removed = removed.is_some(), "Consumer unsubscribed");
        removed
    }

    /// Append `value` to `key`'s channel
    ///
    /// When the channel is full its oldest value is dropped to make room and
    /// returned; callers that do not care can ignore the result.
    pub fn enqueue(&self, key: K, value: V) -> Option<V> {
        let outcome = self.shared.channels.lock().push(key, value);

        self.shared.metrics.inc_enqueued();
        if outcome.created {
            debug!("Channel created");
        }
        if outcome.evicted.is_some() {
            self.shared.metrics.inc_evicted();
            trace!(
                max_channel_size = self.max_channel_size,
                "Channel full, oldest value evicted"
            );
        }

        self.wake();
        outcome.evicted
    }

    /// A consumer is registered for `key`
    pub fn is_subscribed(&self, key: &K) -> bool {
        self.shared.registry.lock().contains(key)
    }

    /// Number of registered consumers
    pub fn subscriber_count(&self) -> usize {
        self.shared.registry.lock().len()
    }

    /// Pending values for `key`
    pub fn channel_len(&self, key: &K) -> usize {
        self.shared.channels.lock().len_of(key)
    }

    /// Number of channels created so far
    pub fn channel_count(&self) -> usize {
        self.shared.channels.lock().channel_count()
    }

    /// Pending values across every channel
    pub fn pending(&self) -> usize {
        self.shared.channels.lock().total_len()
    }

    /// Per-key channel capacity
    pub fn max_channel_size(&self) -> usize {
        self.max_channel_size
    }

    /// Shared metrics
    pub fn metrics(&self) -> &Arc<ProcessorMetrics> {
        &self.shared.metrics
    }

    /// The dispatch thread has not been asked to stop
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Stop the dispatch thread, wait for its current pass, and return final metrics
    #[instrument(name = "processor_shutdown", skip(self))]
    pub fn shutdown(mut self) -> MetricsSnapshot {
        self.stop();
        self.shared.metrics.snapshot()
    }

    fn wake(&self) {
        if matches!(self.shared.idle, IdleStrategy::Park { .. }) {
            if let Some(worker) = &self.worker {
                worker.thread().unpark();
            }
        }
    }
}

impl<K, V> MultiQueueProcessor<K, V>
where
    K: Eq + Hash + Send + 'static,
    V: Clone + Send + 'static,
{
    /// Copy of `key`'s pending values, head first
    pub fn channel_snapshot(&self, key: &K) -> Vec<V> {
        self.shared
            .channels
            .lock()
            .get(key)
            .map(|channel| channel.iter().cloned().collect())
            .unwrap_or_default()
    }
}

impl<K, V> MultiQueueProcessor<K, V> {
    fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };

        self.shared.running.store(false, Ordering::Release);
        worker.thread().unpark();

        if let Err(e) = worker.join() {
            error!(error = ?e, "Dispatch thread panicked");
        }

        let snapshot = self.shared.metrics.snapshot();
        info!(
            enqueued = snapshot.enqueued,
            delivered = snapshot.delivered,
            evicted = snapshot.evicted,
            passes = snapshot.passes,
            "Processor stopped"
        );
    }
}

impl<K, V> Drop for MultiQueueProcessor<K, V> {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Dispatch thread body
fn dispatch_loop<K, V>(shared: Arc<Shared<K, V>>)
where
    K: Eq + Hash,
{
    debug!("Dispatch loop started");

    let park_timeout = shared.idle.park_timeout();
    let mut popped_last_pass = 0usize;

    while shared.running.load(Ordering::Acquire) {
        idle(park_timeout, popped_last_pass);
        popped_last_pass = run_pass(&shared);
    }

    debug!(passes = shared.metrics.passes(), "Dispatch loop stopped");
}

fn idle(park_timeout: Option<Duration>, popped_last_pass: usize) {
    match park_timeout {
        Some(timeout) if popped_last_pass == 0 => thread::park_timeout(timeout),
        _ => thread::yield_now(),
    }
}

/// One pass over every registered consumer, delivering at most one value each
///
/// Returns how many values left their channels, panicked deliveries included.
fn run_pass<K, V>(shared: &Shared<K, V>) -> usize
where
    K: Eq + Hash,
{
    let registry = shared.registry.lock();
    let mut popped = 0usize;
    let mut delivered = 0u64;

    for (key, consumer) in registry.iter() {
        // The channel guard is a temporary and is released before delivery.
        let Some(value) = shared.channels.lock().pop(key) else {
            continue;
        };

        popped += 1;
        match panic::catch_unwind(AssertUnwindSafe(|| consumer.consume(key, value))) {
            Ok(()) => delivered += 1,
            Err(_) => {
                shared.metrics.inc_consumer_panics();
                error!(
                    subscribers = registry.len(),
                    "Consumer panicked, value lost; dispatch continues"
                );
            }
        }
    }

    drop(registry);

    shared.metrics.add_delivered(delivered);
    shared.metrics.inc_passes();
    popped
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Instant;

    const WAIT: Duration = Duration::from_secs(5);

    fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + WAIT;
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(1));
        }
        cond()
    }

    fn channel_consumer<K: Clone + Send + 'static, V: Send + 'static>(
    ) -> (ConsumerRef<K, V>, mpsc::Receiver<(K, V)>) {
        let (tx, rx) = mpsc::channel();
        let tx = Mutex::new(tx);
        let consumer: ConsumerRef<K, V> = Arc::new(move |key: &K, value: V| {
            let _ = tx.lock().send((key.clone(), value));
        });
        (consumer, rx)
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let result = MultiQueueProcessor::<u32, u32>::new(0);
        assert!(matches!(result, Err(DispatcherError::InvalidConfig(_))));
    }

    #[test]
    fn test_default_capacity() {
        let processor =
            MultiQueueProcessor::<u32, u32>::with_config(ProcessorConfig::default()).unwrap();
        assert_eq!(processor.max_channel_size(), 1000);
        assert!(processor.is_running());
    }

    #[test]
    fn test_delivers_in_fifo_order() {
        let processor = MultiQueueProcessor::<u32, u32>::new(100).unwrap();
        let (consumer, rx) = channel_consumer();
        processor.subscribe(7, consumer);

        for i in 0..50 {
            processor.enqueue(7, i);
        }

        let received: Vec<u32> = (0..50)
            .map(|_| rx.recv_timeout(WAIT).unwrap().1)
            .collect();
        assert_eq!(received, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_capacity_two_scenario() {
        let processor = MultiQueueProcessor::<&'static str, u32>::new(2).unwrap();
        assert_eq!(processor.enqueue("k", 1), None);
        assert_eq!(processor.enqueue("k", 2), None);
        assert_eq!(processor.enqueue("k", 3), Some(1));
        assert_eq!(processor.channel_snapshot(&"k"), vec![2, 3]);

        let (consumer, rx) = channel_consumer();
        processor.subscribe("k", consumer);
        assert_eq!(rx.recv_timeout(WAIT).unwrap(), ("k", 2));
        assert_eq!(rx.recv_timeout(WAIT).unwrap(), ("k", 3));
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());

        let snap = processor.shutdown();
        assert_eq!(snap.enqueued, 3);
        assert_eq!(snap.evicted, 1);
        assert_eq!(snap.delivered, 2);
    }

    #[test]
    fn test_unsubscribed_channel_keeps_values() {
        let processor = MultiQueueProcessor::<u32, u32>::new(10).unwrap();
        let (consumer, rx) = channel_consumer();
        processor.subscribe(1, consumer);
        processor.unsubscribe(&1);
        assert!(!processor.is_subscribed(&1));

        processor.enqueue(1, 42);
        thread::sleep(Duration::from_millis(20));
        assert_eq!(processor.channel_len(&1), 1);
        assert!(rx.try_recv().is_err());

        let (consumer, rx) = channel_consumer();
        processor.subscribe(1, consumer);
        assert_eq!(rx.recv_timeout(WAIT).unwrap(), (1, 42));
        assert!(wait_until(|| processor.channel_len(&1) == 0));
        assert_eq!(processor.channel_count(), 1);
    }

    #[test]
    fn test_unsubscribe_missing_is_noop() {
        let processor = MultiQueueProcessor::<u32, u32>::new(10).unwrap();
        assert!(processor.unsubscribe(&99).is_none());
        assert_eq!(processor.subscriber_count(), 0);
    }

    #[test]
    fn test_subscribe_replaces_consumer() {
        let processor = MultiQueueProcessor::<u32, u32>::new(10).unwrap();
        let (first, first_rx) = channel_consumer();
        let (second, second_rx) = channel_consumer();

        assert!(processor.subscribe(1, first).is_none());
        assert!(processor.subscribe(1, second).is_some());
        assert_eq!(processor.subscriber_count(), 1);

        processor.enqueue(1, 5);
        assert_eq!(second_rx.recv_timeout(WAIT).unwrap(), (1, 5));
        assert!(first_rx.try_recv().is_err());
    }

    #[test]
    fn test_one_value_per_key_per_pass() {
        let processor = MultiQueueProcessor::<u32, u32>::new(10).unwrap();
        for i in 0..3 {
            processor.enqueue(1, i);
        }

        let metrics = Arc::clone(processor.metrics());
        let (tx, rx) = mpsc::channel();
        let tx = Mutex::new(tx);
        processor.subscribe(
            1,
            Arc::new(move |_: &u32, value: u32| {
                let _ = tx.lock().send((value, metrics.passes()));
            }),
        );

        let passes: Vec<u64> = (0..3).map(|_| rx.recv_timeout(WAIT).unwrap().1).collect();
        // Pass counter is bumped after each pass, so consecutive values of one
        // key are seen under strictly increasing pass numbers.
        assert!(passes.windows(2).all(|w| w[0] < w[1]), "{passes:?}");
    }

    #[test]
    fn test_consumer_panic_does_not_stop_dispatch() {
        let processor = MultiQueueProcessor::<u32, u32>::new(10).unwrap();
        processor.subscribe(
            1,
            Arc::new(|_: &u32, value: u32| {
                if value == 0 {
                    panic!("boom");
                }
            }),
        );
        let (consumer, rx) = channel_consumer();
        processor.subscribe(2, consumer);

        processor.enqueue(1, 0);
        assert!(wait_until(|| processor.metrics().consumer_panics() == 1));

        processor.enqueue(2, 9);
        assert_eq!(rx.recv_timeout(WAIT).unwrap(), (2, 9));
    }

    #[test]
    fn test_park_strategy_wakes_on_enqueue() {
        let config = ProcessorConfig::with_max_channel_size(8)
            .idle(IdleStrategy::park(Duration::from_secs(60)));
        let processor = MultiQueueProcessor::<u32, u32>::with_config(config).unwrap();
        let (consumer, rx) = channel_consumer();
        processor.subscribe(3, consumer);

        // Give the loop time to fall asleep on an empty pass.
        thread::sleep(Duration::from_millis(20));
        processor.enqueue(3, 1);
        processor.enqueue(3, 2);
        assert_eq!(rx.recv_timeout(WAIT).unwrap(), (3, 1));
        assert_eq!(rx.recv_timeout(WAIT).unwrap(), (3, 2));
    }

    #[test]
    fn test_shutdown_stops_delivery() {
        let processor = MultiQueueProcessor::<u32, u32>::new(10).unwrap();
        let (consumer, rx) = channel_consumer();
        processor.subscribe(1, consumer);
        processor.enqueue(1, 1);
        rx.recv_timeout(WAIT).unwrap();

        let snap = processor.shutdown();
        assert_eq!(snap.delivered, 1);
        assert!(snap.passes >= 1);
        // Sender side lived in the consumer, which was dropped with the processor.
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
    }
}

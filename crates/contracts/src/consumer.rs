//! Consumer trait - Dispatcher output interface
//!
//! Defines the capability a processor delivers values to.

/// Value consumer bound to a key
///
/// The dispatch loop calls [`Consumer::consume`] once per delivered value, on the
/// dispatch thread, while a pass is in progress.
///
/// # Contract
/// - Must not panic. Failures are the consumer's own business; log or count them.
/// - Should return quickly. A consumer that blocks stalls delivery for every key.
/// - Must not call any processor method that reads the registry from inside
///   `consume` (`subscribe`, `unsubscribe`, `is_subscribed`,
///   `subscriber_count`). The registry lock is held for the whole pass and is
///   not reentrant, so the call deadlocks. Channel methods such as `enqueue`
///   are fine.
///
/// Any `Fn(&K, V)` closure that is `Send + Sync` is a consumer.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use contracts::Consumer;
///
/// let consumer: Arc<dyn Consumer<String, u32>> = Arc::new(|key: &String, value: u32| {
///     println!("{key} -> {value}");
/// });
/// consumer.consume(&"a".to_string(), 7);
/// ```
pub trait Consumer<K, V>: Send + Sync {
    /// Handle one value that was queued for `key`
    fn consume(&self, key: &K, value: V);
}

impl<K, V, F> Consumer<K, V> for F
where
    F: Fn(&K, V) + Send + Sync,
{
    #[inline]
    fn consume(&self, key: &K, value: V) {
        self(key, value)
    }
}

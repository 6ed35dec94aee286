//! LogConsumer - logs every delivered value via tracing

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};

use contracts::Consumer;
use tracing::info;

/// Consumer that logs values for debugging
#[derive(Debug)]
pub struct LogConsumer {
    name: String,
    seen: AtomicU64,
}

impl LogConsumer {
    /// Create a new LogConsumer with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            seen: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Values logged so far
    pub fn seen(&self) -> u64 {
        self.seen.load(Ordering::Relaxed)
    }
}

impl<K: Debug, V: Debug> Consumer<K, V> for LogConsumer {
    fn consume(&self, key: &K, value: V) {
        let seq = self.seen.fetch_add(1, Ordering::Relaxed) + 1;
        info!(
            consumer = %self.name,
            key = ?key,
            value = ?value,
            seq,
            "Value received"
        );
    }
}

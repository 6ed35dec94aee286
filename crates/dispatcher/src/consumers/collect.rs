//! CollectingConsumer - keeps delivered values in memory

use parking_lot::Mutex;

use contracts::Consumer;

/// Consumer that records every `(key, value)` pair in delivery order
#[derive(Debug)]
pub struct CollectingConsumer<K, V> {
    items: Mutex<Vec<(K, V)>>,
}

impl<K, V> CollectingConsumer<K, V> {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(Vec::new()),
        }
    }

    /// Number of values received
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// Take everything received so far
    pub fn drain(&self) -> Vec<(K, V)> {
        std::mem::take(&mut *self.items.lock())
    }
}

impl<K: Clone, V: Clone> CollectingConsumer<K, V> {
    /// Copy of everything received so far
    pub fn items(&self) -> Vec<(K, V)> {
        self.items.lock().clone()
    }

    /// Values received so far, without keys
    pub fn values(&self) -> Vec<V> {
        self.items.lock().iter().map(|(_, v)| v.clone()).collect()
    }
}

impl<K, V> Default for CollectingConsumer<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Consumer<K, V> for CollectingConsumer<K, V>
where
    K: Clone + Send,
    V: Send,
{
    fn consume(&self, key: &K, value: V) {
        self.items.lock().push((key.clone(), value));
    }
}

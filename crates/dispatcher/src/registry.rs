//! Consumer registry: key -> consumer mapping.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use contracts::Consumer;

/// Shared handle to a consumer
pub type ConsumerRef<K, V> = Arc<dyn Consumer<K, V>>;

/// Mapping from key to the consumer subscribed for it
///
/// Iteration order is the map's order and carries no priority.
pub struct Registry<K, V> {
    consumers: HashMap<K, ConsumerRef<K, V>>,
}

impl<K: Eq + Hash, V> Registry<K, V> {
    pub fn new() -> Self {
        Self {
            consumers: HashMap::new(),
        }
    }

    /// Insert or replace the consumer for `key`, returning the previous one
    pub fn insert(&mut self, key: K, consumer: ConsumerRef<K, V>) -> Option<ConsumerRef<K, V>> {
        self.consumers.insert(key, consumer)
    }

    /// Remove the consumer for `key`, if any
    pub fn remove(&mut self, key: &K) -> Option<ConsumerRef<K, V>> {
        self.consumers.remove(key)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.consumers.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.consumers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.consumers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &ConsumerRef<K, V>)> {
        self.consumers.iter()
    }
}

impl<K: Eq + Hash, V> Default for Registry<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

//! Per-key bounded channels.
//!
//! Each channel is a `HeapRb` sized to the processor's `max_channel_size`.
//! Pushing into a full channel overwrites the oldest value, so a channel never
//! holds more than its capacity and always keeps the newest value.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use ringbuf::traits::{Consumer as _, Observer as _, RingBuffer as _};
use ringbuf::HeapRb;

/// Bounded FIFO of pending values for one key
pub struct Channel<V> {
    ring: HeapRb<V>,
}

impl<V> fmt::Debug for Channel<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("len", &self.ring.occupied_len())
            .field("capacity", &self.ring.capacity())
            .finish()
    }
}

impl<V> Channel<V> {
    /// Create an empty channel. `capacity` must be non-zero.
    #[inline]
    pub fn new(capacity: usize) -> Self {
        Self {
            ring: HeapRb::new(capacity),
        }
    }

    /// Append `value` at the tail
    ///
    /// If the channel is full the head is evicted first and returned.
    #[inline]
    pub fn push(&mut self, value: V) -> Option<V> {
        self.ring.push_overwrite(value)
    }

    /// Remove and return the head
    #[inline]
    pub fn pop(&mut self) -> Option<V> {
        self.ring.try_pop()
    }

    /// Iterate from head to tail without removing
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &V> {
        self.ring.iter()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.ring.occupied_len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.ring.capacity().get()
    }
}

/// All channels of a processor, keyed by stream key
///
/// Channels are created lazily on the first push for a key and are never
/// removed, even when they drain or their key is unsubscribed.
pub struct ChannelStore<K, V> {
    capacity: usize,
    channels: HashMap<K, Channel<V>>,
}

impl<K, V> fmt::Debug for ChannelStore<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelStore")
            .field("capacity", &self.capacity)
            .field("channels", &self.channels.len())
            .finish()
    }
}

/// Result of [`ChannelStore::push`]
#[derive(Debug)]
pub struct PushOutcome<V> {
    /// Value dropped to make room, if the channel was full
    pub evicted: Option<V>,
    /// The push created the channel
    pub created: bool,
}

impl<K: Eq + Hash, V> ChannelStore<K, V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            channels: HashMap::new(),
        }
    }

    /// Append `value` to the channel of `key`, creating it if needed
    pub fn push(&mut self, key: K, value: V) -> PushOutcome<V> {
        let capacity = self.capacity;
        let mut created = false;
        let channel = self.channels.entry(key).or_insert_with(|| {
            created = true;
            Channel::new(capacity)
        });
        PushOutcome {
            evicted: channel.push(value),
            created,
        }
    }

    /// Pop the head of `key`'s channel
    #[inline]
    pub fn pop(&mut self, key: &K) -> Option<V> {
        self.channels.get_mut(key).and_then(Channel::pop)
    }

    pub fn get(&self, key: &K) -> Option<&Channel<V>> {
        self.channels.get(key)
    }

    /// Pending values of `key`, zero if the channel does not exist
    pub fn len_of(&self, key: &K) -> usize {
        self.channels.get(key).map_or(0, Channel::len)
    }

    /// Number of channels ever created
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Pending values across all channels
    pub fn total_len(&self) -> usize {
        self.channels.values().map(Channel::len).sum()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

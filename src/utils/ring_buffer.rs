//! # Ring Buffer
//!
//! Fixed-capacity FIFO store. Pushing past capacity evicts the oldest entry.
//! Used for response times, recovery history, audit events and recent alerts.

use serde::Serialize;
use std::collections::VecDeque;

/// Bounded FIFO buffer that evicts the oldest entry on overflow
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> RingBuffer<T> {
    /// Create a buffer holding at most `capacity` items (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append an item, returning the evicted oldest item if the buffer was full
    pub fn push(&mut self, item: T) -> Option<T> {
        let evicted = if self.items.len() == self.capacity {
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(item);
        evicted
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Iterate from oldest to newest
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator {
        self.items.iter()
    }

    /// Newest item, if any
    pub fn latest(&self) -> Option<&T> {
        self.items.back()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

impl<T: Clone> RingBuffer<T> {
    /// Clone contents, oldest first
    pub fn to_vec(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }

    /// Clone the newest `n` items, newest first
    pub fn recent(&self, n: usize) -> Vec<T> {
        self.items.iter().rev().take(n).cloned().collect()
    }
}

impl<T: Serialize> Serialize for RingBuffer<T> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.items.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_push_within_capacity() {
        let mut buffer = RingBuffer::new(3);
        assert!(buffer.push(1).is_none());
        assert!(buffer.push(2).is_none());
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.latest(), Some(&2));
    }

    #[test]
    fn test_overflow_evicts_oldest() {
        let mut buffer = RingBuffer::new(2);
        buffer.push("a");
        buffer.push("b");
        assert_eq!(buffer.push("c"), Some("a"));
        assert_eq!(buffer.to_vec(), vec!["b", "c"]);
    }

    #[test]
    fn test_recent_is_newest_first() {
        let mut buffer = RingBuffer::new(5);
        for i in 0..5 {
            buffer.push(i);
        }
        assert_eq!(buffer.recent(2), vec![4, 3]);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let buffer: RingBuffer<u8> = RingBuffer::new(0);
        assert_eq!(buffer.capacity(), 1);
    }

    proptest! {
        #[test]
        fn prop_size_never_exceeds_capacity_and_evicts_fifo(capacity in 1usize..64, extra in 0usize..64) {
            let mut buffer = RingBuffer::new(capacity);
            let mut evicted = Vec::new();
            for i in 0..capacity + extra {
                if let Some(old) = buffer.push(i) {
                    evicted.push(old);
                }
            }
            prop_assert_eq!(buffer.len(), capacity);
            prop_assert_eq!(evicted, (0..extra).collect::<Vec<_>>());
            prop_assert_eq!(buffer.to_vec(), (extra..capacity + extra).collect::<Vec<_>>());
        }
    }
}

//! Bounded FIFO buffers backing the learning tables.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Fixed-capacity FIFO buffer. Pushing into a full buffer evicts the oldest entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RingBuffer<T> {
    capacity: usize,
    items: VecDeque<T>,
}

impl<T> RingBuffer<T> {
    /// A buffer holding at most `capacity` items. A zero capacity is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            items: VecDeque::with_capacity(capacity),
        }
    }

    /// Append an item, returning the evicted one if the buffer was full.
    pub fn push(&mut self, item: T) -> Option<T> {
        let evicted = if self.items.len() == self.capacity {
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(item);
        evicted
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

impl RingBuffer<f64> {
    pub fn mean(&self) -> Option<f64> {
        if self.items.is_empty() {
            None
        } else {
            Some(self.items.iter().sum::<f64>() / self.items.len() as f64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_keeps_most_recent_in_order() {
        let mut ring = RingBuffer::new(50);
        for i in 0..60 {
            ring.push(i);
        }
        assert_eq!(ring.len(), 50);
        assert_eq!(ring.iter().copied().collect::<Vec<_>>(), (10..60).collect::<Vec<_>>());
    }

    #[test]
    fn test_push_reports_eviction() {
        let mut ring = RingBuffer::new(2);
        assert_eq!(ring.push("a"), None);
        assert_eq!(ring.push("b"), None);
        assert_eq!(ring.push("c"), Some("a"));
    }

    #[test]
    fn test_mean() {
        let mut ring = RingBuffer::new(3);
        assert_eq!(ring.mean(), None);
        for v in [1.0, 2.0, 3.0, 6.0] {
            ring.push(v);
        }
        assert!((ring.mean().unwrap() - 11.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_capacity_holds_one() {
        let mut ring = RingBuffer::new(0);
        ring.push(1);
        ring.push(2);
        assert_eq!(ring.capacity(), 1);
        assert_eq!(ring.iter().copied().collect::<Vec<_>>(), vec![2]);
    }
}

//! Min-heap of pending work ordered by urgency.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// An entry in the priority queue.
#[derive(Debug)]
struct PriorityEntry<T> {
    priority: f64,
    /// Insertion order; breaks ties first-in first-out.
    seq: u64,
    item: T,
}

impl<T> PartialEq for PriorityEntry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<T> Eq for PriorityEntry<T> {}

impl<T> PartialOrd for PriorityEntry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for PriorityEntry<T> {
    // Reversed: `BinaryHeap` is a max-heap and the smallest priority must
    // surface first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .total_cmp(&self.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Binary min-heap keyed by an `f64` priority; lower values pop first.
///
/// Priorities are compared with [`f64::total_cmp`], so NaN sorts after
/// positive infinity and is served last. Equal priorities pop in insertion
/// order.
#[derive(Debug)]
pub struct PriorityTaskQueue<T> {
    heap: BinaryHeap<PriorityEntry<T>>,
    next_seq: u64,
}

impl<T> Default for PriorityTaskQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> PriorityTaskQueue<T> {
    /// Create a new empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_seq: 0,
        }
    }

    /// Insert an item. O(log n).
    pub fn push(&mut self, priority: f64, item: T) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(PriorityEntry {
            priority,
            seq,
            item,
        });
    }

    /// Remove and return the most urgent item. O(log n).
    pub fn pop(&mut self) -> Option<T> {
        self.heap.pop().map(|e| e.item)
    }

    /// Remove and return the most urgent item with its priority.
    pub fn pop_with_priority(&mut self) -> Option<(f64, T)> {
        self.heap.pop().map(|e| (e.priority, e.item))
    }

    /// The most urgent item, without removing it.
    #[must_use]
    pub fn peek(&self) -> Option<&T> {
        self.heap.peek().map(|e| &e.item)
    }

    /// Priority of the most urgent item.
    #[must_use]
    pub fn peek_priority(&self) -> Option<f64> {
        self.heap.peek().map(|e| e.priority)
    }

    /// Number of queued items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Iterate over queued items in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.heap.iter().map(|e| &e.item)
    }

    /// Remove every entry.
    pub fn clear(&mut self) {
        self.heap.clear();
    }
}

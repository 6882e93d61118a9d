use std::collections::VecDeque;
use std::sync::Mutex;

/// Bounded FIFO that evicts its oldest item instead of rejecting new ones.
pub struct TransportQueue<T> {
    inner: Mutex<QueueInner<T>>,
}

struct QueueInner<T> {
    items: VecDeque<T>,
    capacity: usize,
    dropped: u64,
}

impl<T> TransportQueue<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                items: VecDeque::with_capacity(capacity.min(1024)),
                capacity: capacity.max(1),
                dropped: 0,
            }),
        }
    }

    /// Append `item`, evicting and returning the oldest entry when full.
    pub fn push_drop_oldest(&self, item: T) -> Option<T> {
        let mut g = self.inner.lock().expect("lock poisoned");
        let evicted = if g.items.len() >= g.capacity {
            g.dropped = g.dropped.saturating_add(1);
            g.items.pop_front()
        } else {
            None
        };
        g.items.push_back(item);
        evicted
    }

    /// Remove up to `max` items from the front, oldest first.
    pub fn take_batch(&self, max: usize) -> Vec<T> {
        let mut g = self.inner.lock().expect("lock poisoned");
        let n = max.min(g.items.len());
        g.items.drain(..n).collect()
    }

    /// Discard everything queued; returns how many items were removed.
    pub fn clear(&self) -> usize {
        let mut g = self.inner.lock().expect("lock poisoned");
        let n = g.items.len();
        g.items.clear();
        n
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("lock poisoned").items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().expect("lock poisoned").capacity
    }

    /// Items evicted by `push_drop_oldest` so far.
    pub fn dropped(&self) -> u64 {
        self.inner.lock().expect("lock poisoned").dropped
    }
}

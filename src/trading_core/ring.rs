use std::collections::VecDeque;

/// Fixed-capacity history. Pushing past capacity drops the oldest entry.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> RingBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, item: T) {
        if self.items.len() == self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn latest(&self) -> Option<&T> {
        self.items.back()
    }

    /// Item `n` positions before the latest (`back(0)` is the latest)
    pub fn back(&self, n: usize) -> Option<&T> {
        let len = self.items.len();
        if n >= len {
            return None;
        }
        self.items.get(len - 1 - n)
    }

    /// The most recent `n` items, oldest first. Returns fewer when history is short.
    pub fn last_n(&self, n: usize) -> impl Iterator<Item = &T> {
        let skip = self.items.len().saturating_sub(n);
        self.items.iter().skip(skip)
    }

    /// Items in `[from_back_end, from_back_start)` counted back from the latest, oldest first.
    /// `window(15, 5)` yields the items 15..5 positions back.
    pub fn window(&self, from_back_start: usize, from_back_end: usize) -> impl Iterator<Item = &T> {
        let len = self.items.len();
        let start = len.saturating_sub(from_back_start);
        let end = len.saturating_sub(from_back_end).max(start);
        self.items.range(start..end)
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    /// Contiguous view, oldest first
    pub fn as_slice(&mut self) -> &[T] {
        self.items.make_contiguous()
    }
}

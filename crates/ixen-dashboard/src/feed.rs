//! Newest-first bounded buffers

use std::collections::VecDeque;

/// Anything with a stable id
pub trait FeedItem {
    fn id(&self) -> &str;
}

/// Newest-first buffer that evicts the oldest entry on overflow
#[derive(Debug, Clone)]
pub struct BoundedFeed<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T: FeedItem> BoundedFeed<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity.min(1024)),
            capacity: capacity.max(1),
        }
    }

    /// Add to the front, evicting from the back past capacity
    pub fn push(&mut self, item: T) {
        self.items.push_front(item);
        self.items.truncate(self.capacity);
    }

    /// Like `push`, but an id already present leaves the feed untouched
    ///
    /// Returns whether the item was added.
    pub fn push_unique(&mut self, item: T) -> bool {
        if self.contains(item.id()) {
            return false;
        }
        self.push(item);
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.iter().any(|i| i.id() == id)
    }

    /// Newest first
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    pub fn newest(&self) -> Option<&T> {
        self.items.front()
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
}

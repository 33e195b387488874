//! Capped per-element log of visibility transitions.

use std::collections::{HashMap, VecDeque};

use crate::{ElementIndex, IntersectionLogEntry};

/// Default number of transitions kept for each element.
pub const DEFAULT_LOG_CAPACITY: usize = 20;

/// Number of transitions shown by debug displays.
pub const DEBUG_TAIL: usize = 3;

/// Ring buffers of intersection transitions, most recent first.
#[derive(Debug, Clone)]
pub struct IntersectionLog {
    capacity: usize,
    entries: HashMap<ElementIndex, VecDeque<IntersectionLogEntry>>,
}

impl Default for IntersectionLog {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}

impl IntersectionLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Prepends a transition, evicting the oldest once the element's buffer is full.
    pub fn record(&mut self, entry: IntersectionLogEntry) {
        let buffer = self.entries.entry(entry.element_index).or_default();
        buffer.push_front(entry);
        buffer.truncate(self.capacity);
    }

    /// Up to `count` most recent transitions for an element.
    pub fn latest(&self, index: ElementIndex, count: usize) -> Vec<&IntersectionLogEntry> {
        self.entries
            .get(&index)
            .map(|buffer| buffer.iter().take(count).collect())
            .unwrap_or_default()
    }

    pub fn entries(&self, index: ElementIndex) -> impl Iterator<Item = &IntersectionLogEntry> {
        self.entries.get(&index).into_iter().flatten()
    }

    pub fn len(&self, index: ElementIndex) -> usize {
        self.entries.get(&index).map_or(0, VecDeque::len)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.values().all(VecDeque::is_empty)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

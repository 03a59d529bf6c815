use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

pub const DEFAULT_CAPACITY: usize = 60;

/// Fixed-capacity FIFO of recent utilization samples.
///
/// A single writer (the sampling loop) appends; any number of readers take
/// copies. The lock is held only for the push/pop or the copy.
pub struct HistoryBuffer {
    inner: Mutex<VecDeque<f32>>,
    capacity: usize,
}

impl HistoryBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn append(&self, value: f32) {
        let mut inner = self.lock();
        if inner.len() == self.capacity {
            inner.pop_front();
        }
        inner.push_back(value);
    }

    /// Oldest-to-newest copy of the current contents.
    pub fn snapshot(&self) -> Vec<f32> {
        self.lock().iter().copied().collect()
    }

    pub fn latest(&self) -> Option<f32> {
        self.lock().back().copied()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    // A panic mid-append cannot leave the deque half-written, so a poisoned
    // lock still guards consistent data.
    fn lock(&self) -> MutexGuard<'_, VecDeque<f32>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for HistoryBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

use std::collections::VecDeque;

/// Fixed-capacity log that keeps the most recent `cap` entries.
#[derive(Debug, Clone)]
pub struct RingLog<T> {
    inner: VecDeque<T>,
    cap: usize,
}

impl<T> RingLog<T> {
    pub fn new(cap: usize) -> Self {
        Self {
            inner: VecDeque::with_capacity(cap),
            cap,
        }
    }

    /// Append an entry, dropping the oldest ones once the capacity is exceeded.
    pub fn push(&mut self, item: T) {
        if self.cap == 0 {
            return;
        }
        let overflow = self.inner.len().saturating_add(1).saturating_sub(self.cap);
        if overflow > 0 {
            self.inner.drain(..overflow);
        }
        self.inner.push_back(item);
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn clear(&mut self) {
        self.inner.clear();
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> {
        self.inner.iter()
    }
}

impl<T: Clone> RingLog<T> {
    pub fn to_vec(&self) -> Vec<T> {
        let mut vec = Vec::with_capacity(self.inner.len());
        vec.extend(self.inner.iter().cloned());
        vec
    }
}

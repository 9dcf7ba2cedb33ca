//! Fixed-capacity ring buffer.
//!
//! The single bounded-history abstraction used by every primitive and
//! engine. Pushing into a full buffer evicts (and returns) the oldest
//! element, so memory never depends on stream length.

/// Fixed-size circular buffer with random access from either end.
#[derive(Debug, Clone)]
pub struct RingBuffer<T: Copy> {
    buf: Vec<T>,
    capacity: usize,
    /// Index of the oldest element once the buffer has wrapped.
    head: usize,
}

impl<T: Copy> RingBuffer<T> {
    /// Create a new ring buffer. A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buf: Vec::with_capacity(capacity),
            capacity,
            head: 0,
        }
    }

    /// Push an item, returning the evicted oldest item when full.
    pub fn push(&mut self, item: T) -> Option<T> {
        if self.buf.len() < self.capacity {
            self.buf.push(item);
            None
        } else {
            let evicted = std::mem::replace(&mut self.buf[self.head], item);
            self.head = (self.head + 1) % self.capacity;
            Some(evicted)
        }
    }

    /// Element `index` positions after the oldest (0 = oldest).
    pub fn get(&self, index: usize) -> Option<T> {
        if index >= self.buf.len() {
            return None;
        }
        Some(self.buf[(self.head + index) % self.capacity])
    }

    /// Element `offset` positions before the newest (0 = newest).
    pub fn back(&self, offset: usize) -> Option<T> {
        let len = self.buf.len();
        if offset >= len {
            return None;
        }
        self.get(len - 1 - offset)
    }

    #[inline]
    pub fn newest(&self) -> Option<T> {
        self.back(0)
    }

    #[inline]
    pub fn oldest(&self) -> Option<T> {
        self.get(0)
    }

    /// Iterate from oldest to newest.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = T> + ExactSizeIterator + '_ {
        (0..self.buf.len()).map(move |i| self.buf[(self.head + i) % self.capacity])
    }

    /// The newest `n` elements (fewer if not available), oldest first.
    pub fn tail(&self, n: usize) -> Vec<T> {
        let n = n.min(self.buf.len());
        self.iter().skip(self.buf.len() - n).collect()
    }

    /// Copy out every element, oldest first.
    pub fn to_vec(&self) -> Vec<T> {
        self.iter().collect()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.buf.len() == self.capacity
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Clear all items.
    pub fn clear(&mut self) {
        self.buf.clear();
        self.head = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_buffer_basic() {
        let mut buf = RingBuffer::new(3);
        assert!(buf.is_empty());
        assert_eq!(buf.push(1), None);
        assert_eq!(buf.push(2), None);
        assert_eq!(buf.push(3), None);
        assert!(buf.is_full());

        // Full: oldest is evicted
        assert_eq!(buf.push(4), Some(1));
        assert_eq!(buf.to_vec(), vec![2, 3, 4]);
        assert_eq!(buf.len(), 3);
    }

    #[test]
    fn test_offsets() {
        let mut buf = RingBuffer::new(4);
        for i in 0..10 {
            buf.push(i);
        }
        assert_eq!(buf.newest(), Some(9));
        assert_eq!(buf.oldest(), Some(6));
        assert_eq!(buf.back(1), Some(8));
        assert_eq!(buf.back(4), None);
        assert_eq!(buf.get(2), Some(8));
        assert_eq!(buf.tail(2), vec![8, 9]);
        assert_eq!(buf.tail(10), vec![6, 7, 8, 9]);
        assert_eq!(buf.iter().rev().next(), Some(9));
    }

    #[test]
    fn test_clear() {
        let mut buf = RingBuffer::new(2);
        buf.push(1.0);
        buf.push(2.0);
        buf.push(3.0);
        buf.clear();
        assert!(buf.is_empty());
        buf.push(5.0);
        assert_eq!(buf.to_vec(), vec![5.0]);
    }

    #[test]
    fn test_zero_capacity_raised() {
        let mut buf = RingBuffer::new(0);
        assert_eq!(buf.capacity(), 1);
        buf.push('a');
        assert_eq!(buf.push('b'), Some('a'));
    }
}

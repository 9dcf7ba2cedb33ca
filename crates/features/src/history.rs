//! Bounded per-field bar history shared by the multi-window engines.

use crate::ring::RingBuffer;
use spikefeat_core::{Bar, TimestampMs};

/// Last `capacity` bars, stored column-wise.
#[derive(Debug, Clone)]
pub struct BarHistory {
    open: RingBuffer<f64>,
    high: RingBuffer<f64>,
    low: RingBuffer<f64>,
    close: RingBuffer<f64>,
    volume: RingBuffer<f64>,
    ts: RingBuffer<TimestampMs>,
}

impl BarHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            open: RingBuffer::new(capacity),
            high: RingBuffer::new(capacity),
            low: RingBuffer::new(capacity),
            close: RingBuffer::new(capacity),
            volume: RingBuffer::new(capacity),
            ts: RingBuffer::new(capacity),
        }
    }

    pub fn push(&mut self, bar: &Bar) {
        self.open.push(bar.open());
        self.high.push(bar.high());
        self.low.push(bar.low());
        self.close.push(bar.close());
        self.volume.push(bar.volume() as f64);
        self.ts.push(bar.ts_ms());
    }

    /// Newest `n` closes, oldest first.
    pub fn closes(&self, n: usize) -> Vec<f64> {
        self.close.tail(n)
    }

    pub fn highs(&self, n: usize) -> Vec<f64> {
        self.high.tail(n)
    }

    pub fn lows(&self, n: usize) -> Vec<f64> {
        self.low.tail(n)
    }

    pub fn volumes(&self, n: usize) -> Vec<f64> {
        self.volume.tail(n)
    }

    pub fn timestamps(&self, n: usize) -> Vec<TimestampMs> {
        self.ts.tail(n)
    }

    /// Newest `n` bar ranges.
    pub fn ranges(&self, n: usize) -> Vec<f64> {
        self.high
            .tail(n)
            .into_iter()
            .zip(self.low.tail(n))
            .map(|(h, l)| h - l)
            .collect()
    }

    /// Newest `n` typical prices (H + L + C) / 3.
    pub fn typical_prices(&self, n: usize) -> Vec<f64> {
        let highs = self.high.tail(n);
        let lows = self.low.tail(n);
        let closes = self.close.tail(n);
        highs
            .iter()
            .zip(&lows)
            .zip(&closes)
            .map(|((h, l), c)| (h + l + c) / 3.0)
            .collect()
    }

    /// Close `offset` bars back from the newest (0 = newest).
    pub fn close_back(&self, offset: usize) -> Option<f64> {
        self.close.back(offset)
    }

    pub fn open_back(&self, offset: usize) -> Option<f64> {
        self.open.back(offset)
    }

    pub fn high_back(&self, offset: usize) -> Option<f64> {
        self.high.back(offset)
    }

    pub fn low_back(&self, offset: usize) -> Option<f64> {
        self.low.back(offset)
    }

    pub fn volume_back(&self, offset: usize) -> Option<f64> {
        self.volume.back(offset)
    }

    pub fn len(&self) -> usize {
        self.close.len()
    }

    pub fn is_empty(&self) -> bool {
        self.close.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.close.is_full()
    }

    pub fn capacity(&self) -> usize {
        self.close.capacity()
    }

    pub fn clear(&mut self) {
        self.open.clear();
        self.high.clear();
        self.low.clear();
        self.close.clear();
        self.volume.clear();
        self.ts.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spikefeat_core::Timeframe;

    fn bar(i: i64, close: f64) -> Bar {
        let tf = Timeframe::from_minutes(1).unwrap();
        Bar::new("ES", tf, i * 60_000, close, close + 1.0, close - 1.0, close, 10).unwrap()
    }

    #[test]
    fn test_bounded_columns() {
        let mut history = BarHistory::new(3);
        for i in 0..5 {
            history.push(&bar(i, 100.0 + i as f64));
        }
        assert_eq!(history.len(), 3);
        assert!(history.is_full());
        assert_eq!(history.closes(10), vec![102.0, 103.0, 104.0]);
        assert_eq!(history.closes(2), vec![103.0, 104.0]);
        assert_eq!(history.ranges(1), vec![2.0]);
        assert_eq!(history.close_back(0), Some(104.0));
        assert_eq!(history.close_back(3), None);
        assert_eq!(history.timestamps(1), vec![4 * 60_000]);
    }

    #[test]
    fn test_clear() {
        let mut history = BarHistory::new(2);
        history.push(&bar(0, 10.0));
        history.clear();
        assert!(history.is_empty());
        assert_eq!(history.close_back(0), None);
    }
}

//! In-memory bar feed.
//!
//! Collects validated bars keyed by timestamp so they come out sorted, with
//! the last bar winning when two share a timestamp.

use spikefeat_core::{Bar, TimestampMs};
use std::collections::BTreeMap;

/// Ordered, de-duplicated buffer of bars for one symbol and timeframe.
#[derive(Debug, Clone, Default)]
pub struct BarFeed {
    bars: BTreeMap<TimestampMs, Bar>,
    /// Number of inserts that replaced an existing timestamp.
    replaced: u64,
}

impl BarFeed {
    /// Create an empty feed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a feed from unordered bars (sort, keep last on duplicates).
    pub fn from_bars(bars: impl IntoIterator<Item = Bar>) -> Self {
        let mut feed = Self::new();
        for bar in bars {
            feed.insert(bar);
        }
        feed
    }

    /// Insert a bar. Returns the bar it replaced, if any.
    pub fn insert(&mut self, bar: Bar) -> Option<Bar> {
        let previous = self.bars.insert(bar.ts_ms(), bar);
        if previous.is_some() {
            self.replaced += 1;
        }
        previous
    }

    /// Remove and return all bars with timestamp <= `ts_ms`, oldest first.
    pub fn drain_through(&mut self, ts_ms: TimestampMs) -> Vec<Bar> {
        let keep = self.bars.split_off(&(ts_ms.saturating_add(1)));
        let drained = std::mem::replace(&mut self.bars, keep);
        drained.into_values().collect()
    }

    /// Remove and return every bar, oldest first.
    pub fn drain_all(&mut self) -> Vec<Bar> {
        std::mem::take(&mut self.bars).into_values().collect()
    }

    /// Iterate bars in ascending timestamp order.
    pub fn iter(&self) -> impl Iterator<Item = &Bar> {
        self.bars.values()
    }

    /// Timestamp of the newest bar.
    pub fn last_ts_ms(&self) -> Option<TimestampMs> {
        self.bars.keys().next_back().copied()
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Number of duplicate-timestamp replacements so far.
    pub fn replaced_count(&self) -> u64 {
        self.replaced
    }

    /// Clear all state.
    pub fn clear(&mut self) {
        self.bars.clear();
        self.replaced = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spikefeat_core::Timeframe;

    fn make_bar(ts_ms: i64, close: f64) -> Bar {
        Bar::new(
            "NQ",
            Timeframe::from_minutes(1).unwrap(),
            ts_ms,
            close,
            close + 1.0,
            close - 1.0,
            close,
            10,
        )
        .unwrap()
    }

    #[test]
    fn test_sorts_and_keeps_last_duplicate() {
        let feed = BarFeed::from_bars(vec![
            make_bar(120_000, 3.0),
            make_bar(0, 1.0),
            make_bar(60_000, 2.0),
            make_bar(60_000, 2.5),
        ]);

        let closes: Vec<f64> = feed.iter().map(|b| b.close()).collect();
        assert_eq!(closes, vec![1.0, 2.5, 3.0]);
        assert_eq!(feed.replaced_count(), 1);
        assert_eq!(feed.last_ts_ms(), Some(120_000));
    }

    #[test]
    fn test_drain_through() {
        let mut feed = BarFeed::from_bars((0..5).map(|i| make_bar(i * 60_000, i as f64 + 10.0)));

        let drained = feed.drain_through(120_000);
        assert_eq!(drained.len(), 3);
        assert_eq!(drained[2].ts_ms(), 120_000);
        assert_eq!(feed.len(), 2);

        let rest = feed.drain_all();
        assert_eq!(rest.len(), 2);
        assert!(feed.is_empty());
    }
}

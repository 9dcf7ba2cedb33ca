//! Heikin-Ashi (derived bar) transform.
//!
//! Close is the OHLC average of the raw bar. Open is the midpoint of the
//! previous derived open/close, seeded from the first raw bar's open and
//! close. High/Low extend the raw extremes to cover the derived body.
//!
//! The recurrence is order dependent: bars must be fed exactly once, in
//! arrival order. Recomputing a bar out of order requires replaying the
//! whole history from `reset()`.

use spikefeat_core::{Bar, DerivedBar};

/// Stateful Heikin-Ashi transform.
#[derive(Debug, Clone, Default)]
pub struct HeikinAshi {
    /// Previous derived (open, close).
    prev: Option<(f64, f64)>,
}

impl HeikinAshi {
    /// Create a transform with no history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive the smoothed bar for the next raw bar.
    pub fn update(&mut self, bar: &Bar) -> DerivedBar {
        let close = bar.ohlc4();
        let open = match self.prev {
            Some((prev_open, prev_close)) => (prev_open + prev_close) / 2.0,
            None => (bar.open() + bar.close()) / 2.0,
        };
        self.prev = Some((open, close));

        DerivedBar {
            open,
            high: bar.high().max(open).max(close),
            low: bar.low().min(open).min(close),
            close,
        }
    }

    /// True once at least one bar has been transformed.
    pub fn is_seeded(&self) -> bool {
        self.prev.is_some()
    }

    /// Discard the recurrence state.
    pub fn reset(&mut self) {
        self.prev = None;
    }
}

/// Derive a whole series from the beginning.
pub fn heikin_ashi_series(bars: &[Bar]) -> Vec<DerivedBar> {
    let mut transform = HeikinAshi::new();
    bars.iter().map(|bar| transform.update(bar)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use spikefeat_core::Timeframe;

    fn make_bar(i: i64, open: f64, high: f64, low: f64, close: f64) -> Bar {
        Bar::new(
            "ES",
            Timeframe::from_minutes(1).unwrap(),
            i * 60_000,
            open,
            high,
            low,
            close,
            100,
        )
        .unwrap()
    }

    #[test]
    fn test_seeding() {
        let bars = vec![
            make_bar(0, 100.0, 104.0, 99.0, 103.0),
            make_bar(1, 103.0, 106.0, 102.0, 105.0),
        ];
        let ha = heikin_ashi_series(&bars);

        // First open = (raw open + raw close) / 2
        assert_abs_diff_eq!(ha[0].open, 101.5, epsilon = 1e-12);
        assert_abs_diff_eq!(ha[0].close, (100.0 + 104.0 + 99.0 + 103.0) / 4.0, epsilon = 1e-12);

        // Second open = (first derived open + first derived close) / 2
        assert_abs_diff_eq!(ha[1].open, (ha[0].open + ha[0].close) / 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_high_low_cover_body() {
        let bars: Vec<Bar> = (0..30)
            .map(|i| {
                let base = 100.0 + (i as f64 * 0.7).sin() * 5.0;
                make_bar(i, base, base + 1.0, base - 1.0, base + 0.3)
            })
            .collect();
        for (raw, ha) in bars.iter().zip(heikin_ashi_series(&bars)) {
            assert!(ha.high >= ha.open.max(ha.close));
            assert!(ha.low <= ha.open.min(ha.close));
            assert!(ha.high >= raw.high());
            assert!(ha.low <= raw.low());
        }
    }

    #[test]
    fn test_reset_replays_identically() {
        let bars: Vec<Bar> = (0..10)
            .map(|i| make_bar(i, 100.0 + i as f64, 102.0 + i as f64, 99.0 + i as f64, 101.0 + i as f64))
            .collect();
        let mut transform = HeikinAshi::new();
        let first: Vec<DerivedBar> = bars.iter().map(|b| transform.update(b)).collect();
        transform.reset();
        assert!(!transform.is_seeded());
        let second: Vec<DerivedBar> = bars.iter().map(|b| transform.update(b)).collect();
        assert_eq!(first, second);
    }
}

//! Exponential and Wilder smoothing, plus the indicators built on them.
//!
//! Both smoother families seed with the simple average of the first
//! `period` samples. Until then they are in the seeding state and report
//! no value; dependents return neutral values instead of dividing by
//! near-zero denominators.

use crate::numeric::EPS;

/// Smoothing family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmoothingKind {
    /// alpha = 2 / (period + 1)
    Exponential,
    /// alpha = 1 / period, i.e. `avg = (avg * (period - 1) + x) / period`
    Wilder,
}

/// SMA-seeded recursive average.
#[derive(Debug, Clone)]
pub struct Smoother {
    kind: SmoothingKind,
    period: usize,
    alpha: f64,
    count: usize,
    seed_sum: f64,
    value: Option<f64>,
}

impl Smoother {
    pub fn new(kind: SmoothingKind, period: usize) -> Self {
        let period = period.max(1);
        let alpha = match kind {
            SmoothingKind::Exponential => 2.0 / (period as f64 + 1.0),
            SmoothingKind::Wilder => 1.0 / period as f64,
        };
        Self {
            kind,
            period,
            alpha,
            count: 0,
            seed_sum: 0.0,
            value: None,
        }
    }

    /// Exponential moving average, alpha = 2 / (period + 1).
    pub fn ema(period: usize) -> Self {
        Self::new(SmoothingKind::Exponential, period)
    }

    /// Wilder average, alpha = 1 / period.
    pub fn wilder(period: usize) -> Self {
        Self::new(SmoothingKind::Wilder, period)
    }

    /// Feed a sample; returns the smoothed value once seeded.
    pub fn update(&mut self, x: f64) -> Option<f64> {
        self.count += 1;
        match self.value {
            None => {
                self.seed_sum += x;
                if self.count == self.period {
                    self.value = Some(self.seed_sum / self.period as f64);
                }
            }
            Some(prev) => {
                self.value = Some(prev + self.alpha * (x - prev));
            }
        }
        self.value
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }

    pub fn is_seeded(&self) -> bool {
        self.value.is_some()
    }

    pub fn period(&self) -> usize {
        self.period
    }

    pub fn kind(&self) -> SmoothingKind {
        self.kind
    }

    pub fn reset(&mut self) {
        self.count = 0;
        self.seed_sum = 0.0;
        self.value = None;
    }
}

/// True range; without a previous close it is the bar range.
#[inline]
pub fn true_range(high: f64, low: f64, prev_close: Option<f64>) -> f64 {
    match prev_close {
        Some(pc) => (high - low).max((high - pc).abs()).max((low - pc).abs()),
        None => high - low,
    }
}

/// Relative strength index with Wilder smoothing.
#[derive(Debug, Clone)]
pub struct Rsi {
    gains: Smoother,
    losses: Smoother,
    prev_close: Option<f64>,
}

impl Rsi {
    /// Neutral value reported before seeding completes.
    pub const NEUTRAL: f64 = 50.0;

    pub fn new(period: usize) -> Self {
        Self {
            gains: Smoother::wilder(period),
            losses: Smoother::wilder(period),
            prev_close: None,
        }
    }

    /// Feed a close; returns the RSI in [0, 100] (50 until seeded).
    pub fn update(&mut self, close: f64) -> f64 {
        if let Some(prev) = self.prev_close {
            let delta = close - prev;
            self.gains.update(delta.max(0.0));
            self.losses.update((-delta).max(0.0));
        }
        self.prev_close = Some(close);
        self.value()
    }

    pub fn value(&self) -> f64 {
        match (self.gains.value(), self.losses.value()) {
            (Some(gain), Some(loss)) => {
                if loss < EPS {
                    if gain < EPS {
                        Self::NEUTRAL
                    } else {
                        100.0
                    }
                } else {
                    let rs = gain / loss;
                    (100.0 - 100.0 / (1.0 + rs)).clamp(0.0, 100.0)
                }
            }
            _ => Self::NEUTRAL,
        }
    }

    pub fn is_seeded(&self) -> bool {
        self.gains.is_seeded()
    }

    pub fn reset(&mut self) {
        self.gains.reset();
        self.losses.reset();
        self.prev_close = None;
    }
}

/// Average true range with Wilder smoothing.
#[derive(Debug, Clone)]
pub struct Atr {
    avg: Smoother,
    prev_close: Option<f64>,
}

impl Atr {
    pub fn new(period: usize) -> Self {
        Self {
            avg: Smoother::wilder(period),
            prev_close: None,
        }
    }

    /// Feed a bar; returns the ATR once seeded.
    pub fn update(&mut self, high: f64, low: f64, close: f64) -> Option<f64> {
        let tr = true_range(high, low, self.prev_close);
        self.prev_close = Some(close);
        self.avg.update(tr)
    }

    pub fn value(&self) -> Option<f64> {
        self.avg.value()
    }

    /// ATR, or 0 while seeding.
    pub fn value_or_zero(&self) -> f64 {
        self.avg.value().unwrap_or(0.0)
    }

    pub fn is_seeded(&self) -> bool {
        self.avg.is_seeded()
    }

    pub fn reset(&mut self) {
        self.avg.reset();
        self.prev_close = None;
    }
}

/// MACD line, signal and histogram.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MacdValue {
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
}

/// Moving average convergence/divergence.
///
/// The signal EMA starts consuming MACD values only once both the fast
/// and slow EMAs are seeded.
#[derive(Debug, Clone)]
pub struct Macd {
    fast: Smoother,
    slow: Smoother,
    signal: Smoother,
}

impl Macd {
    pub fn new(fast: usize, slow: usize, signal: usize) -> Self {
        Self {
            fast: Smoother::ema(fast),
            slow: Smoother::ema(slow),
            signal: Smoother::ema(signal),
        }
    }

    /// Feed a close; returns the full triple once the signal line is seeded.
    pub fn update(&mut self, close: f64) -> Option<MacdValue> {
        let fast = self.fast.update(close);
        let slow = self.slow.update(close);
        let (fast, slow) = match (fast, slow) {
            (Some(f), Some(s)) => (f, s),
            _ => return None,
        };
        let macd = fast - slow;
        let signal = self.signal.update(macd)?;
        Some(MacdValue {
            macd,
            signal,
            histogram: macd - signal,
        })
    }

    /// Bars needed before the first complete value.
    pub fn warmup(&self) -> usize {
        self.slow.period() + self.signal.period() - 1
    }

    pub fn reset(&mut self) {
        self.fast.reset();
        self.slow.reset();
        self.signal.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_seeding_state() {
        let mut ema = Smoother::ema(3);
        assert_eq!(ema.update(1.0), None);
        assert_eq!(ema.update(2.0), None);
        assert!(!ema.is_seeded());
        // Seed = SMA of first 3
        assert_abs_diff_eq!(ema.update(3.0).unwrap(), 2.0, epsilon = 1e-12);
        // alpha = 0.5
        assert_abs_diff_eq!(ema.update(4.0).unwrap(), 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_wilder_recursion() {
        let mut w = Smoother::wilder(4);
        for x in [4.0, 4.0, 4.0, 4.0] {
            w.update(x);
        }
        // avg = (4 * 3 + 8) / 4 = 5
        assert_abs_diff_eq!(w.update(8.0).unwrap(), 5.0, epsilon = 1e-12);
        w.reset();
        assert_eq!(w.value(), None);
    }

    #[test]
    fn test_rsi_neutral_until_seeded() {
        let mut rsi = Rsi::new(5);
        for i in 0..5 {
            assert_eq!(rsi.update(100.0 + i as f64), Rsi::NEUTRAL);
        }
        // 6th close gives the 5th delta
        assert!(rsi.update(105.0) > 50.0);
    }

    #[test]
    fn test_rsi_monotonic_increase() {
        let mut rsi = Rsi::new(14);
        let mut last = 0.0;
        for i in 0..100 {
            last = rsi.update(100.0 + i as f64 * 0.5);
            assert!((0.0..=100.0).contains(&last));
        }
        assert_abs_diff_eq!(last, 100.0, epsilon = 1e-9);
    }

    #[test]
    fn test_rsi_flat_is_neutral() {
        let mut rsi = Rsi::new(3);
        for _ in 0..10 {
            rsi.update(10.0);
        }
        assert_eq!(rsi.value(), 50.0);
    }

    #[test]
    fn test_atr() {
        let mut atr = Atr::new(3);
        assert_eq!(atr.update(11.0, 9.0, 10.0), None); // TR = 2
        assert_eq!(atr.update(12.0, 10.0, 11.0), None); // TR = 2
        // TR = max(1, |13 - 11|, |12 - 11|) = 2
        assert_abs_diff_eq!(atr.update(13.0, 12.0, 12.5).unwrap(), 2.0, epsilon = 1e-12);
        assert!(atr.is_seeded());
    }

    #[test]
    fn test_true_range_gap() {
        assert_abs_diff_eq!(true_range(105.0, 104.0, Some(100.0)), 5.0, epsilon = 1e-12);
        assert_abs_diff_eq!(true_range(105.0, 104.0, None), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_macd_warmup() {
        let mut macd = Macd::new(3, 5, 2);
        let warmup = macd.warmup();
        assert_eq!(warmup, 6);
        let mut first = None;
        for i in 0..10 {
            if macd.update(100.0 + i as f64).is_some() && first.is_none() {
                first = Some(i + 1);
            }
        }
        assert_eq!(first, Some(warmup));
    }

    #[test]
    fn test_macd_flat_is_zero() {
        let mut macd = Macd::new(3, 5, 2);
        let mut value = None;
        for _ in 0..20 {
            value = macd.update(50.0);
        }
        let value = value.unwrap();
        assert_abs_diff_eq!(value.macd, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(value.histogram, 0.0, epsilon = 1e-12);
    }
}

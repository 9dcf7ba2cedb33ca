//! Rolling window accumulators.
//!
//! Aggregates are maintained by symmetric add/evict bookkeeping, never by
//! recomputation, so every update is O(1).
//!
//! Mean and variance use Welford updates (mean plus sum of squared
//! deviations). The raw `sum(x^2) - sum(x)^2 / n` form cancels to a spurious
//! non-zero deviation on flat windows of prices like 100.1.

use crate::numeric::{safe_div, EPS};
use crate::ring::RingBuffer;
use spikefeat_core::{Error, Result};

/// Fixed-capacity mean / variance accumulator.
///
/// Variance is the sample (n - 1) variance of the retained window. Values
/// at or below `EPS * max(1, mean^2)` are rounding noise and report as 0.
///
/// Ordering contract: for a leakage-free score of a new sample `x`, call
/// [`z_score`](Self::z_score) with `x` *before* calling [`add`](Self::add)
/// with the same `x`. Reversing the two calls lets the sample contaminate
/// its own statistic.
#[derive(Debug, Clone)]
pub struct RollingStats {
    values: RingBuffer<f64>,
    mean: f64,
    /// Sum of squared deviations from `mean`.
    m2: f64,
}

impl RollingStats {
    /// Create a new accumulator. Capacity must be at least 2.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity < 2 {
            return Err(Error::config(format!(
                "rolling variance window must be >= 2 (got {capacity})"
            )));
        }
        Ok(Self {
            values: RingBuffer::new(capacity),
            mean: 0.0,
            m2: 0.0,
        })
    }

    /// Push a sample, evicting the oldest when full. Returns the evicted sample.
    pub fn add(&mut self, x: f64) -> Option<f64> {
        let evicted = self.values.push(x);
        // `values` already holds x; n counts the window after the update
        let n = self.values.len() as f64;
        match evicted {
            Some(old) => {
                // Same count: drop `old` from n samples, then add x
                let mean_without = self.mean - (old - self.mean) / (n - 1.0);
                self.m2 -= (old - self.mean) * (old - mean_without);
                let delta = x - mean_without;
                self.mean = mean_without + delta / n;
                self.m2 += delta * (x - self.mean);
            }
            None => {
                let delta = x - self.mean;
                self.mean += delta / n;
                self.m2 += delta * (x - self.mean);
            }
        }
        self.m2 = self.m2.max(0.0);
        evicted
    }

    /// Mean of the retained window (0 when empty).
    pub fn mean(&self) -> f64 {
        if self.values.is_empty() {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance of the retained window (0 with fewer than 2 samples).
    pub fn variance(&self) -> f64 {
        let n = self.values.len();
        if n < 2 {
            return 0.0;
        }
        let var = self.m2 / (n as f64 - 1.0);
        if var <= EPS * self.mean.powi(2).max(1.0) {
            0.0
        } else {
            var
        }
    }

    /// Sample standard deviation.
    pub fn stddev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// Z-score of `x` against the retained window, excluding `x` itself.
    ///
    /// Returns 0 with fewer than two samples or a ~zero deviation.
    pub fn z_score(&self, x: f64) -> f64 {
        if self.values.len() < 2 {
            return 0.0;
        }
        let std = self.stddev();
        if std < EPS {
            return 0.0;
        }
        (x - self.mean()) / std
    }

    /// True once the window holds `capacity` samples.
    pub fn is_ready(&self) -> bool {
        self.values.is_full()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.values.capacity()
    }

    /// Retained samples, oldest first.
    pub fn values(&self) -> &RingBuffer<f64> {
        &self.values
    }

    /// Clear all data.
    pub fn clear(&mut self) {
        self.values.clear();
        self.mean = 0.0;
        self.m2 = 0.0;
    }
}

/// Fixed-capacity running sum (capacity >= 1).
#[derive(Debug, Clone)]
pub struct RollingSum {
    values: RingBuffer<f64>,
    sum: f64,
}

impl RollingSum {
    pub fn new(capacity: usize) -> Self {
        Self {
            values: RingBuffer::new(capacity),
            sum: 0.0,
        }
    }

    pub fn add(&mut self, x: f64) -> Option<f64> {
        let evicted = self.values.push(x);
        if let Some(old) = evicted {
            self.sum -= old;
        }
        self.sum += x;
        evicted
    }

    pub fn sum(&self) -> f64 {
        self.sum
    }

    pub fn mean(&self) -> f64 {
        safe_div(self.sum, self.values.len() as f64, 0.0)
    }

    pub fn is_ready(&self) -> bool {
        self.values.is_full()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn clear(&mut self) {
        self.values.clear();
        self.sum = 0.0;
    }
}

//! Volatility estimators.
//!
//! `RollingVolatility` is the standard deviation of log returns over a
//! rolling window. The closed-form range estimators work on a single bar
//! and return 0 for any non-positive price.

use crate::rolling::RollingStats;
use spikefeat_core::Result;
use std::f64::consts::LN_2;

/// Rolling volatility calculator using log returns.
#[derive(Debug, Clone)]
pub struct RollingVolatility {
    /// Recent log returns.
    returns: RollingStats,
    /// Previous price (for computing next return).
    prev_price: Option<f64>,
}

impl RollingVolatility {
    /// Create a calculator over `window` returns (minimum 2).
    pub fn new(window: usize) -> Result<Self> {
        Ok(Self {
            returns: RollingStats::new(window)?,
            prev_price: None,
        })
    }

    /// Add a price observation.
    ///
    /// Returns the current volatility if at least two returns are held.
    /// Non-positive prices break the return chain without being recorded.
    pub fn add_price(&mut self, price: f64) -> Option<f64> {
        if let Some(prev) = self.prev_price {
            if prev > 0.0 && price > 0.0 {
                self.returns.add((price / prev).ln());
            }
        }
        self.prev_price = Some(price);
        self.volatility()
    }

    /// Sample standard deviation of the retained returns.
    pub fn volatility(&self) -> Option<f64> {
        if self.returns.len() < 2 {
            return None;
        }
        Some(self.returns.stddev())
    }

    /// Check if the window is full.
    pub fn is_ready(&self) -> bool {
        self.returns.is_ready()
    }

    /// Number of retained returns.
    pub fn count(&self) -> usize {
        self.returns.len()
    }

    pub fn clear(&mut self) {
        self.returns.clear();
        self.prev_price = None;
    }
}

fn positive(values: &[f64]) -> bool {
    values.iter().all(|v| *v > 0.0)
}

/// Parkinson estimator: ln(H/L)^2 / (4 ln 2).
pub fn parkinson(high: f64, low: f64) -> f64 {
    if !positive(&[high, low]) {
        return 0.0;
    }
    let hl = (high / low).ln();
    hl * hl / (4.0 * LN_2)
}

/// Garman-Klass estimator: 0.5 ln(H/L)^2 - (2 ln 2 - 1) ln(C/O)^2, clamped >= 0.
pub fn garman_klass(open: f64, high: f64, low: f64, close: f64) -> f64 {
    if !positive(&[open, high, low, close]) {
        return 0.0;
    }
    let hl = (high / low).ln();
    let co = (close / open).ln();
    (0.5 * hl * hl - (2.0 * LN_2 - 1.0) * co * co).max(0.0)
}

/// Rogers-Satchell estimator: ln(H/C) ln(H/O) + ln(L/C) ln(L/O).
pub fn rogers_satchell(open: f64, high: f64, low: f64, close: f64) -> f64 {
    if !positive(&[open, high, low, close]) {
        return 0.0;
    }
    let hc = (high / close).ln();
    let ho = (high / open).ln();
    let lc = (low / close).ln();
    let lo = (low / open).ln();
    (hc * ho + lc * lo).max(0.0)
}

//! Low/high band energy ratio from a small naive DFT.

use crate::numeric::{safe_div, EPS};
use serde::{Deserialize, Serialize};
use spikefeat_core::{Error, Result};
use std::f64::consts::PI;

/// Supported transform sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpectralWindow {
    N16,
    N32,
}

impl SpectralWindow {
    pub fn size(self) -> usize {
        match self {
            SpectralWindow::N16 => 16,
            SpectralWindow::N32 => 32,
        }
    }
}

impl TryFrom<usize> for SpectralWindow {
    type Error = Error;

    fn try_from(n: usize) -> Result<Self> {
        match n {
            16 => Ok(SpectralWindow::N16),
            32 => Ok(SpectralWindow::N32),
            other => Err(Error::config(format!(
                "spectral window must be 16 or 32 (got {other})"
            ))),
        }
    }
}

/// Power at frequency bins 1..=N/2 of the mean-removed input (DC excluded).
fn half_spectrum(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    let mean = values.iter().sum::<f64>() / n as f64;
    (1..=n / 2)
        .map(|k| {
            let (mut re, mut im) = (0.0, 0.0);
            for (t, v) in values.iter().enumerate() {
                let angle = 2.0 * PI * (k * t) as f64 / n as f64;
                let x = v - mean;
                re += x * angle.cos();
                im -= x * angle.sin();
            }
            re * re + im * im
        })
        .collect()
}

/// Share of half-spectrum power in the lowest quarter band.
///
/// Uses the last `window.size()` values of `closes`. Returns 0 when history
/// is short or the series carries no power.
pub fn low_high_energy_ratio(closes: &[f64], window: SpectralWindow) -> f64 {
    let n = window.size();
    if closes.len() < n {
        return 0.0;
    }
    let power = half_spectrum(&closes[closes.len() - n..]);
    let quarter = n / 4;
    let low: f64 = power[..quarter].iter().sum();
    let total: f64 = power.iter().sum();
    if total < EPS {
        return 0.0;
    }
    safe_div(low, total, 0.0).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_sizes() {
        assert_eq!(SpectralWindow::try_from(16).unwrap().size(), 16);
        assert_eq!(SpectralWindow::try_from(32).unwrap(), SpectralWindow::N32);
        assert!(SpectralWindow::try_from(20).is_err());
    }

    #[test]
    fn test_slow_wave_is_low_band() {
        let slow: Vec<f64> = (0..16).map(|t| (2.0 * PI * t as f64 / 16.0).sin()).collect();
        let ratio = low_high_energy_ratio(&slow, SpectralWindow::N16);
        assert!(ratio > 0.99, "got {ratio}");
    }

    #[test]
    fn test_fast_wave_is_high_band() {
        let fast: Vec<f64> = (0..32).map(|t| if t % 2 == 0 { 1.0 } else { -1.0 }).collect();
        let ratio = low_high_energy_ratio(&fast, SpectralWindow::N32);
        assert!(ratio < 1e-9, "got {ratio}");
    }

    #[test]
    fn test_short_or_flat_is_zero() {
        assert_eq!(low_high_energy_ratio(&[1.0; 8], SpectralWindow::N16), 0.0);
        assert_eq!(low_high_energy_ratio(&[1.0; 16], SpectralWindow::N16), 0.0);
    }
}

//! Realized-variance family and related path statistics.
//!
//! Pure functions of a fixed-length slice of history. Short input never
//! panics; each function documents its default.

use crate::numeric::{safe_div, EPS};
use std::f64::consts::PI;

/// E|Z| for a standard normal Z, sqrt(2 / pi).
pub fn mu1() -> f64 {
    (2.0 / PI).sqrt()
}

/// Sum of squared returns. 0 for empty input.
pub fn realized_variance(returns: &[f64]) -> f64 {
    returns.iter().map(|r| r * r).sum()
}

/// Jump-robust bipower variation: mu1^-2 * sum |r_i| |r_{i-1}|.
/// 0 with fewer than two returns.
pub fn bipower_variation(returns: &[f64]) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let sum: f64 = returns.windows(2).map(|w| w[0].abs() * w[1].abs()).sum();
    sum / (mu1() * mu1())
}

/// Realized quarticity: (n / 3) * sum r^4. 0 for empty input.
pub fn realized_quarticity(returns: &[f64]) -> f64 {
    let n = returns.len() as f64;
    (n / 3.0) * returns.iter().map(|r| r.powi(4)).sum::<f64>()
}

/// Realized range proxy: sum (high - low)^2 over paired slices.
pub fn realized_range(highs: &[f64], lows: &[f64]) -> f64 {
    highs
        .iter()
        .zip(lows)
        .map(|(h, l)| (h - l) * (h - l))
        .sum()
}

/// Share of realized variance attributed to jumps, (RV - BV) / RV in [0, 1].
pub fn jump_ratio(rv: f64, bv: f64) -> f64 {
    safe_div(rv - bv, rv, 0.0).clamp(0.0, 1.0)
}

/// Kaufman efficiency ratio |p_last - p_first| / sum |dp| in [0, 1].
///
/// 0 with fewer than two prices or no movement.
pub fn efficiency_ratio(prices: &[f64]) -> f64 {
    if prices.len() < 2 {
        return 0.0;
    }
    let net = (prices[prices.len() - 1] - prices[0]).abs();
    let path: f64 = prices.windows(2).map(|w| (w[1] - w[0]).abs()).sum();
    safe_div(net, path, 0.0).clamp(0.0, 1.0)
}

/// Rescaled-range statistic and Hurst proxy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RescaledRange {
    /// R / S, 0 when undefined.
    pub rs: f64,
    /// ln(R/S) / ln(n), 0.5 when undefined.
    pub hurst: f64,
}

impl Default for RescaledRange {
    fn default() -> Self {
        Self { rs: 0.0, hurst: 0.5 }
    }
}

/// R/S over the first differences of `prices`.
///
/// R is the range of the cumulative mean-removed differences, S their
/// sample standard deviation; the Hurst proxy divides ln(R/S) by ln of
/// the window length (number of prices). Needs at least 3 prices.
pub fn rescaled_range(prices: &[f64]) -> RescaledRange {
    if prices.len() < 3 {
        return RescaledRange::default();
    }
    let diffs: Vec<f64> = prices.windows(2).map(|w| w[1] - w[0]).collect();
    let n = diffs.len() as f64;
    let mean = diffs.iter().sum::<f64>() / n;

    let mut cum = 0.0;
    let mut max_cum = 0.0_f64;
    let mut min_cum = 0.0_f64;
    let mut ss = 0.0;
    for d in &diffs {
        let dev = d - mean;
        cum += dev;
        max_cum = max_cum.max(cum);
        min_cum = min_cum.min(cum);
        ss += dev * dev;
    }
    let std = (ss / (n - 1.0)).sqrt();
    let range = max_cum - min_cum;
    if std < EPS || range < EPS {
        return RescaledRange::default();
    }
    let rs = range / std;
    let window = prices.len() as f64;
    let hurst = safe_div(rs.ln(), window.ln(), 0.5);
    RescaledRange { rs, hurst }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_rv_family() {
        let r = [0.01, -0.02, 0.03];
        assert_abs_diff_eq!(realized_variance(&r), 0.0014, epsilon = 1e-15);
        let bv = (0.01 * 0.02 + 0.02 * 0.03) / (2.0 / PI);
        assert_abs_diff_eq!(bipower_variation(&r), bv, epsilon = 1e-15);
        let rq = (3.0 / 3.0) * (1e-8 + 1.6e-7 + 8.1e-7);
        assert_abs_diff_eq!(realized_quarticity(&r), rq, epsilon = 1e-18);
        assert_abs_diff_eq!(
            realized_range(&[2.0, 3.0], &[1.0, 1.0]),
            5.0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_short_inputs_default() {
        assert_eq!(realized_variance(&[]), 0.0);
        assert_eq!(bipower_variation(&[0.1]), 0.0);
        assert_eq!(efficiency_ratio(&[1.0]), 0.0);
        assert_eq!(rescaled_range(&[1.0, 2.0]).hurst, 0.5);
        assert_eq!(jump_ratio(0.0, 0.0), 0.0);
    }

    #[test]
    fn test_efficiency_ratio() {
        assert_abs_diff_eq!(efficiency_ratio(&[1.0, 2.0, 3.0, 4.0]), 1.0, epsilon = 1e-12);
        // Up 2 then down 1: net 1, path 3
        assert_abs_diff_eq!(efficiency_ratio(&[1.0, 3.0, 2.0]), 1.0 / 3.0, epsilon = 1e-12);
        assert_eq!(efficiency_ratio(&[5.0, 5.0, 5.0]), 0.0);
    }

    #[test]
    fn test_rescaled_range_bounds() {
        let trending: Vec<f64> = (0..64).map(|i| (i * i) as f64 * 0.01).collect();
        let rr = rescaled_range(&trending);
        assert!(rr.rs > 0.0);
        assert!(rr.hurst.is_finite());

        let flat = [3.0; 20];
        assert_eq!(rescaled_range(&flat), RescaledRange::default());
    }

    #[test]
    fn test_hurst_scales_by_window_length() {
        // Diffs 1, 2, 1: cumulative deviations -1/3, 1/3, 0, std sqrt(1/3)
        let rr = rescaled_range(&[0.0, 1.0, 3.0, 4.0]);
        let rs = (2.0 / 3.0) / (1.0_f64 / 3.0).sqrt();
        assert_abs_diff_eq!(rr.rs, rs, epsilon = 1e-12);
        assert_abs_diff_eq!(rr.hurst, rs.ln() / 4.0_f64.ln(), epsilon = 1e-12);
    }

    #[test]
    fn test_jump_ratio_clamped() {
        assert_eq!(jump_ratio(1.0, 2.0), 0.0);
        assert_abs_diff_eq!(jump_ratio(1.0, 0.25), 0.75, epsilon = 1e-12);
    }
}

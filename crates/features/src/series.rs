//! Window statistics over a slice of history.
//!
//! Shared by the hybrid and tiered engines. Every function returns 0 for
//! input too short to define the statistic.

use crate::numeric::{finite_or, safe_div, EPS};
use ordered_float::OrderedFloat;
use statrs::statistics::Statistics;

/// Scale factor turning a MAD into a normal-consistent deviation.
pub const MAD_SCALE: f64 = 1.4826;

/// Sample standard deviation (0 with fewer than two values).
///
/// Variance at or below `EPS * max(1, mean^2)` is rounding noise from a
/// flat window and reports as 0.
pub fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let var = finite_or(values.variance(), 0.0);
    if var <= EPS * mean(values).powi(2).max(1.0) {
        0.0
    } else {
        var.sqrt()
    }
}

/// Arithmetic mean (0 when empty).
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    finite_or(values.mean(), 0.0)
}

/// Standardized third and fourth moments.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Moments {
    pub mean: f64,
    pub std: f64,
    pub skewness: f64,
    /// Excess kurtosis (normal = 0).
    pub kurtosis: f64,
}

/// Mean, sample std and population skewness / excess kurtosis.
pub fn moments(values: &[f64]) -> Moments {
    if values.len() < 3 {
        return Moments {
            mean: mean(values),
            std: std_dev(values),
            ..Default::default()
        };
    }
    let n = values.len() as f64;
    let m = mean(values);
    let (m2, m3, m4) = values.iter().fold((0.0, 0.0, 0.0), |(a, b, c), v| {
        let d = v - m;
        let d2 = d * d;
        (a + d2, b + d2 * d, c + d2 * d2)
    });
    let (m2, m3, m4) = (m2 / n, m3 / n, m4 / n);
    if m2 < EPS {
        return Moments {
            mean: m,
            ..Default::default()
        };
    }
    Moments {
        mean: m,
        std: std_dev(values),
        skewness: finite_or(m3 / m2.powf(1.5), 0.0),
        kurtosis: finite_or(m4 / (m2 * m2) - 3.0, 0.0),
    }
}

/// Pearson correlation over the common prefix of two slices, in [-1, 1].
pub fn pearson(xs: &[f64], ys: &[f64]) -> f64 {
    let n = xs.len().min(ys.len());
    if n < 2 {
        return 0.0;
    }
    let (xs, ys) = (&xs[..n], &ys[..n]);
    let (mx, my) = (mean(xs), mean(ys));
    let (sxy, sxx, syy) = xs
        .iter()
        .zip(ys)
        .fold((0.0, 0.0, 0.0), |(sxy, sxx, syy), (x, y)| {
            let (dx, dy) = (x - mx, y - my);
            (sxy + dx * dy, sxx + dx * dx, syy + dy * dy)
        });
    safe_div(sxy, (sxx * syy).sqrt(), 0.0).clamp(-1.0, 1.0)
}

/// Sample autocorrelation at `lag`.
pub fn autocorrelation(values: &[f64], lag: usize) -> f64 {
    let n = values.len();
    if lag == 0 || n < lag + 2 {
        return 0.0;
    }
    let m = mean(values);
    let denom: f64 = values.iter().map(|v| (v - m) * (v - m)).sum();
    let num: f64 = (lag..n)
        .map(|t| (values[t] - m) * (values[t - lag] - m))
        .sum();
    safe_div(num, denom, 0.0).clamp(-1.0, 1.0)
}

/// Second partial autocorrelation from the first two autocorrelations
/// (Durbin-Levinson step). PACF(1) is r1 itself.
pub fn pacf2(r1: f64, r2: f64) -> f64 {
    safe_div(r2 - r1 * r1, 1.0 - r1 * r1, 0.0).clamp(-1.0, 1.0)
}

/// Median under a total order (0 when empty).
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted: Vec<OrderedFloat<f64>> = values.iter().copied().map(OrderedFloat).collect();
    sorted.sort_unstable();
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1].0 + sorted[mid].0) / 2.0
    } else {
        sorted[mid].0
    }
}

/// Median, MAD and the robust deviation of the newest value.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RobustStats {
    pub median: f64,
    pub mad: f64,
    /// (x - median) / (1.4826 * MAD), 0 when MAD is ~0.
    pub deviation: f64,
}

/// Robust location/scale of `window` and the deviation of `x` from it.
pub fn robust_stats(window: &[f64], x: f64) -> RobustStats {
    if window.is_empty() {
        return RobustStats::default();
    }
    let med = median(window);
    let abs_dev: Vec<f64> = window.iter().map(|v| (v - med).abs()).collect();
    let mad = median(&abs_dev);
    RobustStats {
        median: med,
        mad,
        deviation: safe_div(x - med, MAD_SCALE * mad, 0.0),
    }
}

/// Up / down / flat shares of a return slice.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SignShares {
    pub positive: f64,
    pub negative: f64,
    pub flat: f64,
}

impl SignShares {
    /// (positive - negative) share, in [-1, 1].
    pub fn imbalance(&self) -> f64 {
        self.positive - self.negative
    }

    /// Shannon entropy of the three states normalized by ln 3, in [0, 1].
    pub fn entropy(&self) -> f64 {
        let h: f64 = [self.positive, self.negative, self.flat]
            .iter()
            .filter(|p| **p > 0.0)
            .map(|p| -p * p.ln())
            .sum();
        (h / 3.0_f64.ln()).clamp(0.0, 1.0)
    }
}

pub fn sign_shares(returns: &[f64]) -> SignShares {
    if returns.is_empty() {
        return SignShares::default();
    }
    let n = returns.len() as f64;
    let pos = returns.iter().filter(|r| **r > EPS).count() as f64;
    let neg = returns.iter().filter(|r| **r < -EPS).count() as f64;
    SignShares {
        positive: pos / n,
        negative: neg / n,
        flat: (n - pos - neg) / n,
    }
}

/// Largest peak-to-trough decline as a fraction of the peak.
pub fn max_drawdown(prices: &[f64]) -> f64 {
    let mut peak = f64::MIN;
    let mut worst = 0.0_f64;
    for &p in prices {
        peak = peak.max(p);
        worst = worst.max(safe_div(peak - p, peak, 0.0));
    }
    worst
}

/// Largest trough-to-peak rise as a fraction of the trough.
pub fn max_runup(prices: &[f64]) -> f64 {
    let mut trough = f64::MAX;
    let mut best = 0.0_f64;
    for &p in prices {
        trough = trough.min(p);
        best = best.max(safe_div(p - trough, trough, 0.0));
    }
    best
}

/// Simple returns between consecutive prices.
pub fn simple_returns(prices: &[f64]) -> Vec<f64> {
    prices
        .windows(2)
        .map(|w| safe_div(w[1] - w[0], w[0], 0.0))
        .collect()
}

/// Log returns between consecutive prices.
pub fn log_returns(prices: &[f64]) -> Vec<f64> {
    prices
        .windows(2)
        .map(|w| crate::numeric::log_return(w[0], w[1]))
        .collect()
}

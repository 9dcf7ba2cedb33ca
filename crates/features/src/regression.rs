//! Ordinary least squares of a window of values against their index.
//!
//! x runs 0..n-1 from the oldest sample. Every denominator is compared to
//! `EPS` before dividing; undefined results are reported as 0.
//!
//! y is shifted by an anchor value before any sums are taken, so a flat
//! window accumulates exact zeros instead of cancellation residue.

use crate::numeric::{safe_div, EPS};
use crate::ring::RingBuffer;

/// Closed-form OLS summary.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OlsFit {
    pub n: usize,
    pub slope: f64,
    pub intercept: f64,
    /// Residual sum of squares.
    pub rss: f64,
    /// RSS / (n - 2), 0 for n <= 2.
    pub mse: f64,
    /// Standard error of the slope, 0 when undefined.
    pub slope_se: f64,
    /// atan(slope) in degrees.
    pub angle_deg: f64,
    pub r_squared: f64,
}

impl OlsFit {
    /// Finish a fit from centered moments.
    fn from_moments(n: usize, y_mean: f64, sxy: f64, syy: f64) -> Self {
        if n < 2 {
            return OlsFit {
                n,
                intercept: y_mean,
                ..Default::default()
            };
        }
        let n_f = n as f64;
        let x_mean = (n_f - 1.0) / 2.0;
        // sum (x - x_mean)^2 for x = 0..n-1
        let sxx = n_f * (n_f * n_f - 1.0) / 12.0;
        let syy = syy.max(0.0);
        // Residual spread of a flat window
        if syy <= EPS * y_mean.powi(2).max(1.0) * (n_f - 1.0) {
            return OlsFit {
                n,
                intercept: y_mean,
                ..Default::default()
            };
        }

        let slope = safe_div(sxy, sxx, 0.0);
        let intercept = y_mean - slope * x_mean;
        let rss = (syy - slope * sxy).max(0.0);
        let mse = if n > 2 { rss / (n_f - 2.0) } else { 0.0 };
        let slope_se = if n > 2 && sxx >= EPS {
            (mse / sxx).sqrt()
        } else {
            0.0
        };
        let r_squared = if syy < EPS {
            0.0
        } else {
            (1.0 - rss / syy).clamp(0.0, 1.0)
        };

        OlsFit {
            n,
            slope,
            intercept,
            rss,
            mse,
            slope_se,
            angle_deg: slope.atan().to_degrees(),
            r_squared,
        }
    }
}

/// Fit a line through `values` (oldest first).
pub fn ols_fit(values: &[f64]) -> OlsFit {
    let n = values.len();
    if n == 0 {
        return OlsFit::default();
    }
    let n_f = n as f64;
    let x_mean = (n_f - 1.0) / 2.0;
    let anchor = values[0];
    let shifted_mean = values.iter().map(|y| y - anchor).sum::<f64>() / n_f;

    let mut sxy = 0.0;
    let mut syy = 0.0;
    for (i, &y) in values.iter().enumerate() {
        let dx = i as f64 - x_mean;
        let dy = (y - anchor) - shifted_mean;
        sxy += dx * dy;
        syy += dy * dy;
    }
    OlsFit::from_moments(n, anchor + shifted_mean, sxy, syy)
}

/// Slope of `values` against index (0 when undefined).
pub fn ols_slope(values: &[f64]) -> f64 {
    ols_fit(values).slope
}

/// Incremental OLS accumulator over the last `capacity` values.
///
/// Keeps sum(d), sum(d^2) and sum(i * d) for d = y - anchor, with i
/// relative to the oldest retained value. Evicting the oldest value shifts
/// every remaining index down by one, which is `sum(i * d) -= sum(d) - d_oldest`.
/// The anchor is the first value pushed into an empty window.
#[derive(Debug, Clone)]
pub struct RollingOls {
    values: RingBuffer<f64>,
    anchor: f64,
    sum_y: f64,
    sum_y2: f64,
    sum_iy: f64,
}

impl RollingOls {
    pub fn new(capacity: usize) -> Self {
        Self {
            values: RingBuffer::new(capacity),
            anchor: 0.0,
            sum_y: 0.0,
            sum_y2: 0.0,
            sum_iy: 0.0,
        }
    }

    pub fn add(&mut self, y: f64) {
        let len_before = self.values.len();
        if len_before == 0 {
            self.anchor = y;
        }
        let index = match self.values.push(y) {
            Some(oldest) => {
                let oldest = oldest - self.anchor;
                self.sum_iy -= self.sum_y - oldest;
                self.sum_y -= oldest;
                self.sum_y2 -= oldest * oldest;
                len_before - 1
            }
            None => len_before,
        };
        let y = y - self.anchor;
        self.sum_iy += index as f64 * y;
        self.sum_y += y;
        self.sum_y2 += y * y;
    }

    /// Fit over the retained window.
    pub fn fit(&self) -> OlsFit {
        let n = self.values.len();
        if n == 0 {
            return OlsFit::default();
        }
        let n_f = n as f64;
        let x_mean = (n_f - 1.0) / 2.0;
        let d_mean = self.sum_y / n_f;
        let sxy = self.sum_iy - x_mean * self.sum_y;
        let syy = self.sum_y2 - self.sum_y * d_mean;
        OlsFit::from_moments(n, self.anchor + d_mean, sxy, syy)
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

    pub fn capacity(&self) -> usize {
        self.values.capacity()
    }

    pub fn clear(&mut self) {
        self.values.clear();
        self.anchor = 0.0;
        self.sum_y = 0.0;
        self.sum_y2 = 0.0;
        self.sum_iy = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_perfect_line() {
        let values: Vec<f64> = (0..10).map(|i| 3.0 + 2.0 * i as f64).collect();
        let fit = ols_fit(&values);
        assert_abs_diff_eq!(fit.slope, 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(fit.intercept, 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(fit.rss, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(fit.r_squared, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(fit.angle_deg, 2.0_f64.atan().to_degrees(), epsilon = 1e-12);
    }

    #[test]
    fn test_known_residuals() {
        // y = 1, 3, 2 -> slope 0.5, intercept 1.5, residuals -0.5, 1, -0.5
        let fit = ols_fit(&[1.0, 3.0, 2.0]);
        assert_abs_diff_eq!(fit.slope, 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(fit.intercept, 1.5, epsilon = 1e-12);
        assert_abs_diff_eq!(fit.rss, 1.5, epsilon = 1e-12);
        assert_abs_diff_eq!(fit.mse, 1.5, epsilon = 1e-12);
        // sxx = 2 -> se = sqrt(1.5 / 2)
        assert_abs_diff_eq!(fit.slope_se, 0.75_f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_degenerate_inputs() {
        assert_eq!(ols_fit(&[]).slope, 0.0);
        let one = ols_fit(&[5.0]);
        assert_eq!(one.slope, 0.0);
        assert_eq!(one.intercept, 5.0);

        let two = ols_fit(&[1.0, 2.0]);
        assert_abs_diff_eq!(two.slope, 1.0, epsilon = 1e-12);
        assert_eq!(two.mse, 0.0);
        assert_eq!(two.slope_se, 0.0);

        let flat = ols_fit(&[4.0; 6]);
        assert_eq!(flat.slope, 0.0);
        assert_eq!(flat.r_squared, 0.0);
        assert!(flat.angle_deg.is_finite());
    }

    #[test]
    fn test_flat_non_dyadic_window_has_zero_slope() {
        for price in [100.1, 0.3, 1234.567] {
            let batch = ols_fit(&[price; 20]);
            assert_eq!(batch.slope, 0.0, "{price}");
            assert_eq!(batch.mse, 0.0, "{price}");
            assert_eq!(batch.intercept, price);

            let mut rolling = RollingOls::new(20);
            for _ in 0..500 {
                rolling.add(price);
            }
            let fit = rolling.fit();
            assert_eq!(fit.slope, 0.0, "{price}");
            assert_eq!(fit.angle_deg, 0.0, "{price}");
            assert_eq!(fit.slope_se, 0.0, "{price}");
        }
    }

    #[test]
    fn test_rolling_matches_batch() {
        let series: Vec<f64> = (0..120)
            .map(|i| 100.0 + i as f64 * 0.1 + (i as f64 * 0.9).sin())
            .collect();
        let window = 12;
        let mut rolling = RollingOls::new(window);
        for (i, &y) in series.iter().enumerate() {
            rolling.add(y);
            let start = (i + 1).saturating_sub(window);
            let batch = ols_fit(&series[start..=i]);
            let inc = rolling.fit();
            assert_abs_diff_eq!(inc.slope, batch.slope, epsilon = 1e-8);
            assert_abs_diff_eq!(inc.intercept, batch.intercept, epsilon = 1e-7);
            assert_abs_diff_eq!(inc.mse, batch.mse, epsilon = 1e-6);
        }
        assert!(rolling.is_ready());
    }
}

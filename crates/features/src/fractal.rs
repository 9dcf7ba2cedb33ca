//! Fractal-dimension proxies of a price path.
//!
//! Both estimators return 1.0 (a smooth line) when the input is too short
//! or has no movement.

use crate::numeric::{safe_div, EPS};

/// Default dimension for undefined input.
pub const DEFAULT_DIMENSION: f64 = 1.0;

/// Higuchi fractal dimension with lags 1..=k_max.
///
/// For each lag k the normalized curve length is averaged over the k
/// offsets; D is minus the slope of ln L(k) against ln k. Needs
/// `values.len() > 2 * k_max`. The result is clamped to [1, 2].
pub fn higuchi(values: &[f64], k_max: usize) -> f64 {
    let n = values.len();
    if k_max < 2 || n <= 2 * k_max {
        return DEFAULT_DIMENSION;
    }

    let mut xs = Vec::with_capacity(k_max);
    let mut ys = Vec::with_capacity(k_max);
    for k in 1..=k_max {
        let mut total = 0.0;
        let mut offsets = 0usize;
        for m in 0..k {
            let steps = (n - 1 - m) / k;
            if steps == 0 {
                continue;
            }
            let path: f64 = (1..=steps)
                .map(|i| (values[m + i * k] - values[m + (i - 1) * k]).abs())
                .sum();
            let norm = (n - 1) as f64 / (steps * k) as f64;
            total += path * norm / k as f64;
            offsets += 1;
        }
        let length = safe_div(total, offsets as f64, 0.0);
        if length > EPS {
            xs.push((k as f64).ln());
            ys.push(length.ln());
        }
    }
    if xs.len() < 2 {
        return DEFAULT_DIMENSION;
    }
    let slope = fit_slope(&xs, &ys);
    (-slope).clamp(1.0, 2.0)
}

/// Katz fractal dimension: ln(n) / (ln(n) + ln(d / L)).
///
/// n is the number of steps, L the total absolute path length and d the
/// largest excursion from the first point. Clamped to [1, 2].
pub fn katz(values: &[f64]) -> f64 {
    if values.len() < 3 {
        return DEFAULT_DIMENSION;
    }
    let steps = (values.len() - 1) as f64;
    let path: f64 = values.windows(2).map(|w| (w[1] - w[0]).abs()).sum();
    let first = values[0];
    let diameter = values
        .iter()
        .map(|v| (v - first).abs())
        .fold(0.0_f64, f64::max);
    if path < EPS || diameter < EPS {
        return DEFAULT_DIMENSION;
    }
    let ln_n = steps.ln();
    let denom = ln_n + (diameter / path).ln();
    if denom < EPS {
        return DEFAULT_DIMENSION;
    }
    (ln_n / denom).clamp(1.0, 2.0)
}

/// Least-squares slope of `ys` against arbitrary `xs`.
fn fit_slope(xs: &[f64], ys: &[f64]) -> f64 {
    let n = xs.len() as f64;
    let x_mean = xs.iter().sum::<f64>() / n;
    let y_mean = ys.iter().sum::<f64>() / n;
    let (sxy, sxx) = xs
        .iter()
        .zip(ys)
        .fold((0.0, 0.0), |(sxy, sxx), (x, y)| {
            let dx = x - x_mean;
            (sxy + dx * (y - y_mean), sxx + dx * dx)
        });
    safe_div(sxy, sxx, 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zigzag(n: usize) -> Vec<f64> {
        (0..n).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect()
    }

    #[test]
    fn test_higuchi_line_is_one() {
        let line: Vec<f64> = (0..40).map(|i| i as f64 * 0.5).collect();
        let d = higuchi(&line, 5);
        assert!((d - 1.0).abs() < 1e-6, "got {d}");
    }

    #[test]
    fn test_higuchi_rough_exceeds_smooth() {
        let smooth: Vec<f64> = (0..64).map(|i| (i as f64 * 0.1).sin()).collect();
        let rough = zigzag(64);
        assert!(higuchi(&rough, 5) > higuchi(&smooth, 5));
        assert!(higuchi(&rough, 5) <= 2.0);
    }

    #[test]
    fn test_katz_bounds() {
        let line: Vec<f64> = (0..20).map(|i| i as f64).collect();
        assert!((katz(&line) - 1.0).abs() < 1e-9);
        let d = katz(&zigzag(20));
        assert!((1.0..=2.0).contains(&d));
    }

    #[test]
    fn test_defaults_on_short_or_flat() {
        assert_eq!(higuchi(&[1.0, 2.0, 3.0], 5), DEFAULT_DIMENSION);
        assert_eq!(higuchi(&[2.0; 40], 5), DEFAULT_DIMENSION);
        assert_eq!(katz(&[1.0, 2.0]), DEFAULT_DIMENSION);
        assert_eq!(katz(&[3.0; 10]), DEFAULT_DIMENSION);
    }
}

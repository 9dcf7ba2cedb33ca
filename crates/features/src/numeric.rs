//! Numeric-safety helpers shared by all primitives and engines.
//!
//! Any division by a near-zero denominator, or any non-finite result,
//! resolves to a caller-chosen default at the point of computation.

/// Denominator threshold below which a division is considered undefined.
pub const EPS: f64 = 1e-12;

/// `num / den`, or `default` when `|den| < EPS` or the quotient is not finite.
#[inline]
pub fn safe_div(num: f64, den: f64, default: f64) -> f64 {
    if !den.is_finite() || den.abs() < EPS {
        return default;
    }
    let v = num / den;
    if v.is_finite() {
        v
    } else {
        default
    }
}

/// `v` if finite, otherwise `default`.
#[inline]
pub fn finite_or(v: f64, default: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        default
    }
}

/// Sign as -1, 0 or +1 (exact zero maps to 0).
#[inline]
pub fn sign(v: f64) -> f64 {
    if v > 0.0 {
        1.0
    } else if v < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Natural log return, 0 when either price is not strictly positive.
#[inline]
pub fn log_return(prev: f64, cur: f64) -> f64 {
    if prev > EPS && cur > EPS {
        (cur / prev).ln()
    } else {
        0.0
    }
}

/// Simple percentage change `cur / prev - 1`, 0 when `prev` is ~0.
#[inline]
pub fn pct_change(prev: f64, cur: f64) -> f64 {
    safe_div(cur - prev, prev, 0.0)
}

/// Boolean as 0/1 feature value.
#[inline]
pub fn flag(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

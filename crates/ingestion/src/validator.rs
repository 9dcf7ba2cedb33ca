//! Bar validation and normalization.
//!
//! Turns raw feed records into validated [`Bar`]s, either strictly
//! (malformed bars are rejected) or with Open/Close clamped into range.

use spikefeat_core::{Bar, RawBar, Result};
use tracing::warn;

/// How to treat Open/Close values outside `[Low, High]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidationMode {
    /// Reject the bar.
    #[default]
    Strict,
    /// Clamp Open/Close into range and count the repair.
    Sanitize,
}

/// Statistics about validation outcomes.
#[derive(Debug, Clone, Default)]
pub struct ValidationStats {
    /// Total bars seen.
    pub total_bars: u64,
    /// Bars accepted (including clamped ones).
    pub accepted_bars: u64,
    /// Bars rejected.
    pub rejected_bars: u64,
    /// Accepted bars whose Open or Close was clamped.
    pub clamped_bars: u64,
    /// Accepted bars with zero volume.
    pub zero_volume_bars: u64,
}

impl ValidationStats {
    /// Fraction of bars rejected.
    pub fn rejected_frac(&self) -> f64 {
        if self.total_bars > 0 {
            self.rejected_bars as f64 / self.total_bars as f64
        } else {
            0.0
        }
    }

    /// Fraction of accepted bars that needed clamping.
    pub fn clamped_frac(&self) -> f64 {
        if self.accepted_bars > 0 {
            self.clamped_bars as f64 / self.accepted_bars as f64
        } else {
            0.0
        }
    }

    /// Reset statistics.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Validator that converts raw records into bars and tracks quality.
pub struct BarValidator {
    mode: ValidationMode,
    stats: ValidationStats,
}

impl BarValidator {
    /// Create a new validator.
    pub fn new(mode: ValidationMode) -> Self {
        Self {
            mode,
            stats: ValidationStats::default(),
        }
    }

    /// Validate a single raw record.
    pub fn validate(&mut self, raw: RawBar) -> Result<Bar> {
        self.stats.total_bars += 1;
        let ts_ms = raw.ts_ms;

        let outcome = match self.mode {
            ValidationMode::Strict => Bar::try_from(raw).map(|bar| (bar, false)),
            ValidationMode::Sanitize => raw.sanitize().map(|s| (s.bar, s.clamped)),
        };

        match outcome {
            Ok((bar, clamped)) => {
                self.stats.accepted_bars += 1;
                if clamped {
                    self.stats.clamped_bars += 1;
                    warn!(ts_ms, symbol = %bar.symbol(), "clamped open/close into [low, high]");
                }
                if bar.volume() == 0 {
                    self.stats.zero_volume_bars += 1;
                }
                Ok(bar)
            }
            Err(err) => {
                self.stats.rejected_bars += 1;
                warn!(ts_ms, error = %err, "rejected bar");
                Err(err)
            }
        }
    }

    /// Validate a batch, keeping accepted bars and dropping rejected ones.
    pub fn validate_batch(&mut self, raws: Vec<RawBar>) -> Vec<Bar> {
        raws.into_iter()
            .filter_map(|raw| self.validate(raw).ok())
            .collect()
    }

    /// Current mode.
    pub fn mode(&self) -> ValidationMode {
        self.mode
    }

    /// Get validation statistics.
    pub fn stats(&self) -> &ValidationStats {
        &self.stats
    }

    /// Reset statistics.
    pub fn reset_stats(&mut self) {
        self.stats.reset();
    }
}

impl Default for BarValidator {
    fn default() -> Self {
        Self::new(ValidationMode::Strict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spikefeat_core::{Error, Timeframe};

    fn make_raw(ts_ms: i64, open: f64, high: f64, low: f64, close: f64, volume: u64) -> RawBar {
        RawBar {
            symbol: "XAUUSD".to_string(),
            timeframe: Timeframe::from_minutes(1).unwrap(),
            ts_ms,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    #[test]
    fn test_strict_rejects_out_of_range_close() {
        let mut validator = BarValidator::new(ValidationMode::Strict);
        let result = validator.validate(make_raw(0, 100.0, 101.0, 99.0, 101.5, 5));
        assert!(matches!(result, Err(Error::InvalidBar(_))));
        assert_eq!(validator.stats().rejected_bars, 1);
        assert_eq!(validator.stats().accepted_bars, 0);
    }

    #[test]
    fn test_sanitize_counts_clamps() {
        let mut validator = BarValidator::new(ValidationMode::Sanitize);
        let bar = validator
            .validate(make_raw(0, 100.0, 101.0, 99.0, 101.5, 5))
            .unwrap();
        assert_eq!(bar.close(), 101.0);
        validator
            .validate(make_raw(60_000, 100.0, 101.0, 99.0, 100.0, 0))
            .unwrap();

        let stats = validator.stats();
        assert_eq!(stats.accepted_bars, 2);
        assert_eq!(stats.clamped_bars, 1);
        assert_eq!(stats.zero_volume_bars, 1);
        assert!((stats.clamped_frac() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_sanitize_still_rejects_nan() {
        let mut validator = BarValidator::new(ValidationMode::Sanitize);
        assert!(validator
            .validate(make_raw(0, f64::NAN, 101.0, 99.0, 100.0, 1))
            .is_err());
        assert!((validator.stats().rejected_frac() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_batch_drops_rejected() {
        let mut validator = BarValidator::default();
        let bars = validator.validate_batch(vec![
            make_raw(0, 100.0, 101.0, 99.0, 100.0, 1),
            make_raw(60_000, 100.0, 99.0, 101.0, 100.0, 1),
            make_raw(120_000, 100.0, 102.0, 99.5, 101.0, 1),
        ]);
        assert_eq!(bars.len(), 2);
        assert_eq!(validator.stats().total_bars, 3);

        validator.reset_stats();
        assert_eq!(validator.stats().total_bars, 0);
    }
}

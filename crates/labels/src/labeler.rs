//! Forward-looking entry/exit labels.
//!
//! Labels look at the next `horizon` closes and are therefore built
//! offline over a complete series, never inside the streaming engines.

use serde::{Deserialize, Serialize};
use spikefeat_core::config::LabelConfig;
use spikefeat_core::{Bar, FeatureMap, Result};
use tracing::debug;

/// Targets for one row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EntryExitLabel {
    /// Max forward return reached the entry threshold.
    pub entry: bool,
    /// Min forward return reached minus the exit threshold.
    pub exit: bool,
    /// Largest close / base - 1 within the horizon.
    pub forward_max: Option<f64>,
    /// Smallest close / base - 1 within the horizon.
    pub forward_min: Option<f64>,
}

impl EntryExitLabel {
    /// `entry` / `exit` as 0/1 columns.
    pub fn to_feature_map(&self) -> FeatureMap {
        FeatureMap::from([
            ("entry".to_string(), if self.entry { 1.0 } else { 0.0 }),
            ("exit".to_string(), if self.exit { 1.0 } else { 0.0 }),
        ])
    }
}

/// Entry/exit labeler over forward return extrema.
#[derive(Debug, Clone)]
pub struct EntryExitLabeler {
    horizon: usize,
    entry_threshold: f64,
    exit_threshold: f64,
}

impl EntryExitLabeler {
    pub fn new(config: &LabelConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            horizon: config.horizon,
            entry_threshold: config.entry_threshold,
            exit_threshold: config.exit_threshold,
        })
    }

    pub fn horizon(&self) -> usize {
        self.horizon
    }

    /// Label every close. Rows with no future bar, or a non-positive base
    /// price, get both labels false.
    pub fn label_closes(&self, closes: &[f64]) -> Vec<EntryExitLabel> {
        let labels: Vec<EntryExitLabel> = (0..closes.len())
            .map(|i| self.label_at(closes, i))
            .collect();
        debug!(
            rows = labels.len(),
            entries = labels.iter().filter(|l| l.entry).count(),
            exits = labels.iter().filter(|l| l.exit).count(),
            "labels built"
        );
        labels
    }

    pub fn label_bars(&self, bars: &[Bar]) -> Vec<EntryExitLabel> {
        let closes: Vec<f64> = bars.iter().map(Bar::close).collect();
        self.label_closes(&closes)
    }

    fn label_at(&self, closes: &[f64], i: usize) -> EntryExitLabel {
        let base = closes[i];
        let end = closes.len().min(i + self.horizon + 1);
        let future = &closes[i + 1..end];
        if future.is_empty() || base <= 0.0 {
            return EntryExitLabel::default();
        }
        let (max, min) = future.iter().fold((f64::MIN, f64::MAX), |(hi, lo), c| {
            let r = c / base - 1.0;
            (hi.max(r), lo.min(r))
        });
        EntryExitLabel {
            entry: max >= self.entry_threshold,
            exit: min <= -self.exit_threshold,
            forward_max: Some(max),
            forward_min: Some(min),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn labeler(horizon: usize) -> EntryExitLabeler {
        EntryExitLabeler::new(&LabelConfig {
            horizon,
            entry_threshold: 0.02,
            exit_threshold: 0.02,
        })
        .unwrap()
    }

    #[test]
    fn test_known_series() {
        let closes = [100.0, 101.0, 103.0, 99.0, 97.0];
        let labels = labeler(2).label_closes(&closes);

        // Row 0 sees 101, 103: +3% entry, no exit
        assert!(labels[0].entry);
        assert!(!labels[0].exit);
        assert_abs_diff_eq!(labels[0].forward_max.unwrap(), 0.03, epsilon = 1e-12);

        // Row 2 sees 99, 97: exit only
        assert!(!labels[2].entry);
        assert!(labels[2].exit);

        // Last row has no future bar
        assert_eq!(labels[4], EntryExitLabel::default());
    }

    #[test]
    fn test_horizon_limits_lookahead() {
        let closes = [100.0, 100.0, 100.0, 110.0];
        assert!(!labeler(2).label_closes(&closes)[0].entry);
        assert!(labeler(3).label_closes(&closes)[0].entry);
    }

    #[test]
    fn test_feature_map_columns() {
        let labels = labeler(1).label_closes(&[100.0, 95.0]);
        let row = labels[0].to_feature_map();
        assert_eq!(row["entry"], 0.0);
        assert_eq!(row["exit"], 1.0);
    }

    #[test]
    fn test_invalid_config() {
        let config = LabelConfig {
            horizon: 0,
            ..Default::default()
        };
        assert!(EntryExitLabeler::new(&config).is_err());
    }
}

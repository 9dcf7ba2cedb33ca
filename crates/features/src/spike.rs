//! Spike and breakout heuristics.

use crate::engine::{FeatureEngine, FeatureWriter, WarmupTracker};
use crate::extrema::{RollingMax, RollingMin};
use crate::numeric::safe_div;
use crate::rolling::RollingStats;
use crate::smoothing::Atr;
use spikefeat_core::config::SpikeConfig;
use spikefeat_core::{Bar, DerivedBar, FeatureMap, Result};

const PREFIX: &str = "spk_";

/// ATR-normalized spike and breakout detector.
///
/// Breakouts compare the bar against the highest high / lowest low of the
/// previous `breakout_lookback` bars; the derived-range z-score is taken
/// against the previous `z_window` derived ranges.
#[derive(Debug, Clone)]
pub struct SpikeEngine {
    config: SpikeConfig,
    atr: Atr,
    derived_ranges: RollingStats,
    highest: RollingMax,
    lowest: RollingMin,
    prev_close: Option<f64>,
    tracker: WarmupTracker,
    features: FeatureMap,
}

impl SpikeEngine {
    pub fn new(config: &SpikeConfig) -> Result<Self> {
        config.validate()?;
        let warmup = config
            .atr_period
            .max(config.z_window + 1)
            .max(config.breakout_lookback + 1);
        Ok(Self {
            atr: Atr::new(config.atr_period),
            derived_ranges: RollingStats::new(config.z_window)?,
            highest: RollingMax::new(config.breakout_lookback),
            lowest: RollingMin::new(config.breakout_lookback),
            prev_close: None,
            tracker: WarmupTracker::new(warmup),
            features: FeatureMap::new(),
            config: config.clone(),
        })
    }

    fn compute(&mut self, bar: &Bar, derived: &DerivedBar) -> FeatureMap {
        let mut out = FeatureWriter::new(PREFIX);
        let range = bar.range();
        let atr = self.atr.update(bar.high(), bar.low(), bar.close());
        let atr_value = atr.unwrap_or(0.0);

        // z-score before enqueue
        let ha_range = derived.range();
        let z = if self.derived_ranges.is_ready() {
            self.derived_ranges.z_score(ha_range)
        } else {
            0.0
        };
        self.derived_ranges.add(ha_range);

        let gap = self.prev_close.map_or(0.0, |pc| bar.open() - pc);
        self.prev_close = Some(bar.close());

        let window_ready = self.highest.is_ready();
        let prior_high = self.highest.current().filter(|_| window_ready);
        let prior_low = self.lowest.current().filter(|_| window_ready);
        self.highest.add(bar.high());
        self.lowest.add(bar.low());

        let breakout_high = prior_high.is_some_and(|h| bar.high() > h);
        let breakout_low = prior_low.is_some_and(|l| bar.low() < l);
        let high_excess = prior_high.map_or(0.0, |h| (bar.high() - h).max(0.0));
        let low_excess = prior_low.map_or(0.0, |l| (l - bar.low()).max(0.0));

        let body = bar.close() - bar.open();
        let upper = bar.high() - bar.open().max(bar.close());
        let lower = bar.open().min(bar.close()) - bar.low();
        let range_atr = safe_div(range, atr_value, 0.0);
        let gap_atr = safe_div(gap.abs(), atr_value, 0.0);

        out.put("atr", atr_value);
        out.put("ha_range", ha_range);
        out.put("ha_range_z", z);
        out.put("gap", gap);
        out.put("gap_atr", safe_div(gap, atr_value, 0.0));
        out.put("range_atr", range_atr);
        out.put("body_atr", safe_div(body, atr_value, 0.0));
        out.put("wick_asymmetry", safe_div(upper - lower, range, 0.0));
        out.put_flag("breakout_high", breakout_high);
        out.put_flag("breakout_low", breakout_low);
        out.put("breakout_high_atr", safe_div(high_excess, atr_value, 0.0));
        out.put("breakout_low_atr", safe_div(low_excess, atr_value, 0.0));
        out.put_flag("spike_z", z.abs() >= self.config.z_threshold);
        out.put_flag(
            "spike_atr",
            atr.is_some() && range_atr >= self.config.atr_ratio_threshold,
        );
        out.put_flag(
            "spike_gap",
            atr.is_some() && gap_atr >= self.config.gap_atr_threshold,
        );
        out.finish()
    }
}

impl FeatureEngine for SpikeEngine {
    fn name(&self) -> &str {
        "spike"
    }

    fn reset(&mut self) {
        self.atr.reset();
        self.derived_ranges.clear();
        self.highest.clear();
        self.lowest.clear();
        self.prev_close = None;
        self.tracker.reset();
        self.features.clear();
    }

    fn update(&mut self, bar: &Bar, derived: &DerivedBar) {
        self.features = self.compute(bar, derived);
        self.tracker.tick("spike");
    }

    fn features(&self) -> FeatureMap {
        self.features.clone()
    }

    fn warmup_bars(&self) -> usize {
        self.tracker.warmup()
    }

    fn bars_seen(&self) -> usize {
        self.tracker.seen()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spikefeat_core::Timeframe;
    use spikefeat_ingestion::HeikinAshi;

    fn run(engine: &mut SpikeEngine, bars: &[Bar]) {
        let mut ha = HeikinAshi::new();
        for bar in bars {
            let derived = ha.update(bar);
            engine.update(bar, &derived);
        }
    }

    fn rising_bars(n: usize) -> Vec<Bar> {
        let tf = Timeframe::from_minutes(1).unwrap();
        (0..n)
            .map(|i| {
                let open = 100.0 + 0.1 * i as f64;
                let high = open + 0.5 + 0.1 * i as f64;
                Bar::new("ES", tf, i as i64 * 60_000, open, high, open - 0.5, open + 0.2, 100)
                    .unwrap()
            })
            .collect()
    }

    #[test]
    fn test_rising_highs_break_out() {
        let config = SpikeConfig {
            breakout_lookback: 5,
            ..Default::default()
        };
        let mut engine = SpikeEngine::new(&config).unwrap();
        run(&mut engine, &rising_bars(20));
        let f = engine.features();
        assert_eq!(f["spk_breakout_high"], 1.0);
        assert_eq!(f["spk_breakout_low"], 0.0);
        assert!(f["spk_breakout_high_atr"] > 0.0);
    }

    #[test]
    fn test_no_breakout_before_window_fills() {
        let config = SpikeConfig {
            breakout_lookback: 5,
            ..Default::default()
        };
        let mut engine = SpikeEngine::new(&config).unwrap();
        run(&mut engine, &rising_bars(5));
        assert_eq!(engine.features()["spk_breakout_high"], 0.0);
    }

    #[test]
    fn test_range_spike_flags() {
        let tf = Timeframe::from_minutes(1).unwrap();
        let mut bars: Vec<Bar> = (0..30)
            .map(|i| Bar::new("ES", tf, i * 60_000, 100.0, 100.5, 99.5, 100.0, 10).unwrap())
            .collect();
        bars.push(Bar::new("ES", tf, 30 * 60_000, 100.0, 106.0, 99.0, 105.0, 10).unwrap());
        let mut engine = SpikeEngine::new(&SpikeConfig::default()).unwrap();
        run(&mut engine, &bars);
        let f = engine.features();
        assert_eq!(f["spk_spike_atr"], 1.0);
        assert_eq!(f["spk_breakout_high"], 1.0);
        assert!(f["spk_range_atr"] > 2.0);
    }

    #[test]
    fn test_thresholds_are_configuration() {
        let tf = Timeframe::from_minutes(1).unwrap();
        let mut bars: Vec<Bar> = (0..30)
            .map(|i| Bar::new("ES", tf, i * 60_000, 100.0, 100.5, 99.5, 100.0, 10).unwrap())
            .collect();
        bars.push(Bar::new("ES", tf, 30 * 60_000, 100.0, 106.0, 99.0, 105.0, 10).unwrap());
        let config = SpikeConfig {
            atr_ratio_threshold: 100.0,
            ..Default::default()
        };
        let mut engine = SpikeEngine::new(&config).unwrap();
        run(&mut engine, &bars);
        assert_eq!(engine.features()["spk_spike_atr"], 0.0);
    }

    #[test]
    fn test_reset_replays_identically() {
        let bars = rising_bars(25);
        let mut engine = SpikeEngine::new(&SpikeConfig::default()).unwrap();
        run(&mut engine, &bars);
        let first = engine.features();
        engine.reset();
        run(&mut engine, &bars);
        assert_eq!(first, engine.features());
    }
}

//! Tiered spike-feature engine.
//!
//! A fixed superset of features over three window tiers (short, medium,
//! long), all read from one bounded `BarHistory`. Drawdown and run-up are
//! emitted for every tier.

use crate::engine::{FeatureEngine, FeatureWriter, WarmupTracker};
use crate::fractal::{higuchi, katz, DEFAULT_DIMENSION};
use crate::history::BarHistory;
use crate::hybrid::cyclical_time;
use crate::numeric::{pct_change, safe_div, EPS};
use crate::realized::{
    bipower_variation, efficiency_ratio, jump_ratio, realized_quarticity, realized_range,
    realized_variance, rescaled_range,
};
use crate::series::{
    autocorrelation, log_returns, max_drawdown, max_runup, mean, moments, pacf2, pearson,
    robust_stats, sign_shares,
};
use crate::spectral::{low_high_energy_ratio, SpectralWindow};
use spikefeat_core::config::TieredConfig;
use spikefeat_core::{Bar, DerivedBar, FeatureMap, Result};

const PREFIX: &str = "tsf_";
const TIER_NAMES: [&str; 3] = ["short", "medium", "long"];

#[derive(Debug, Clone, Copy, Default)]
struct PatternCounts {
    up: u32,
    down: u32,
    higher_highs: u32,
    lower_lows: u32,
}

/// Fixed-tier spike-feature engine.
#[derive(Debug, Clone)]
pub struct TieredSpikeEngine {
    config: TieredConfig,
    history: BarHistory,
    prev_velocity: [Option<f64>; 3],
    counts: PatternCounts,
    tracker: WarmupTracker,
    features: FeatureMap,
}

impl TieredSpikeEngine {
    pub fn new(config: &TieredConfig) -> Result<Self> {
        config.validate()?;
        let long = config.tiers[2];
        Ok(Self {
            history: BarHistory::new(long + 1),
            prev_velocity: [None; 3],
            counts: PatternCounts::default(),
            tracker: WarmupTracker::new(long + 1),
            features: FeatureMap::new(),
            config: config.clone(),
        })
    }

    fn has(&self, bars: usize) -> bool {
        self.history.len() >= bars
    }

    /// Log returns over the newest `n` bars (`n` returns), empty if short.
    fn returns(&self, n: usize) -> Vec<f64> {
        if self.has(n + 1) {
            log_returns(&self.history.closes(n + 1))
        } else {
            Vec::new()
        }
    }

    fn compute(&mut self, bar: &Bar) -> FeatureMap {
        let tiers = self.config.tiers;
        let [short, medium, long] = tiers;

        // Past averages per tier, excluding the current bar
        let past: Vec<Option<(f64, f64)>> = tiers
            .iter()
            .map(|&n| {
                self.has(n).then(|| {
                    (
                        mean(&self.history.ranges(n)),
                        mean(&self.history.volumes(n)),
                    )
                })
            })
            .collect();
        let prev_high = self.history.high_back(0);
        let prev_low = self.history.low_back(0);
        let prev_close = self.history.close_back(0);
        self.history.push(bar);

        let mut out = FeatureWriter::new(PREFIX);
        let (open, high, low, close) = (bar.open(), bar.high(), bar.low(), bar.close());
        let volume = bar.volume() as f64;
        let range = bar.range();

        // Raw OHLCV and geometry
        out.put("open", open);
        out.put("high", high);
        out.put("low", low);
        out.put("close", close);
        out.put("volume", volume);
        out.put("log_volume", volume.ln_1p());
        let body = close - open;
        let upper = high - open.max(close);
        let lower = open.min(close) - low;
        out.put("range", range);
        out.put("body", body);
        out.put("upper_wick", upper);
        out.put("lower_wick", lower);
        out.put("body_to_range", safe_div(body.abs(), range, 0.0));
        out.put("close_position", safe_div(close - low, range, 0.5));

        // Per-tier multi-scale features
        let mut velocities = [0.0; 3];
        let mut stds = [0.0; 3];
        for (t, &n) in tiers.iter().enumerate() {
            let name = TIER_NAMES[t];
            let lagged = self.history.close_back(n);
            let velocity = lagged.map(|c| pct_change(c, close));
            let accel = match (velocity, self.prev_velocity[t]) {
                (Some(v), Some(p)) => v - p,
                _ => 0.0,
            };
            self.prev_velocity[t] = velocity;
            velocities[t] = velocity.unwrap_or(0.0);
            out.put(&format!("vel_{name}"), velocities[t]);
            out.put(&format!("accel_{name}"), accel);
            out.put(&format!("mom_{name}"), lagged.map_or(0.0, |c| close - c));

            let (range_ratio, volume_ratio) = past[t].map_or((0.0, 0.0), |(r, v)| {
                (safe_div(range, r, 0.0), safe_div(volume, v, 0.0))
            });
            out.put(&format!("range_ratio_{name}"), range_ratio);
            out.put(&format!("volume_ratio_{name}"), volume_ratio);

            let returns = self.returns(n);
            let m = moments(&returns);
            stds[t] = m.std;
            out.put(&format!("ret_std_{name}"), m.std);
            out.put(&format!("ret_skew_{name}"), m.skewness);
            out.put(&format!("ret_kurt_{name}"), m.kurtosis);
            out.put(
                &format!("pv_corr_{name}"),
                if returns.is_empty() {
                    0.0
                } else {
                    pearson(&returns, &self.history.volumes(n))
                },
            );

            if self.has(n) {
                let highs = self.history.highs(n);
                let lows = self.history.lows(n);
                let closes = self.history.closes(n);
                let top = highs.iter().copied().fold(f64::MIN, f64::max);
                let bottom = lows.iter().copied().fold(f64::MAX, f64::min);
                out.put(&format!("dist_high_{name}"), pct_change(top, close));
                out.put(&format!("dist_low_{name}"), pct_change(bottom, close));
                out.put(&format!("dist_sma_{name}"), pct_change(mean(&closes), close));
                out.put(&format!("drawdown_{name}"), max_drawdown(&closes));
                out.put(&format!("runup_{name}"), max_runup(&closes));
            } else {
                for feature in ["dist_high", "dist_low", "dist_sma", "drawdown", "runup"] {
                    out.put(&format!("{feature}_{name}"), 0.0);
                }
            }
            out.put(
                &format!("er_{name}"),
                if self.has(n + 1) {
                    efficiency_ratio(&self.history.closes(n + 1))
                } else {
                    0.0
                },
            );
        }
        out.put("vol_term_short_long", safe_div(stds[0], stds[2], 0.0));
        out.put("vol_term_short_medium", safe_div(stds[0], stds[1], 0.0));
        out.put("mom_term_short_long", velocities[0] - velocities[2]);

        // Consecutive patterns
        let c = &mut self.counts;
        c.up = if prev_close.is_some_and(|p| close > p) { c.up + 1 } else { 0 };
        c.down = if prev_close.is_some_and(|p| close < p) { c.down + 1 } else { 0 };
        c.higher_highs = if prev_high.is_some_and(|p| high > p) { c.higher_highs + 1 } else { 0 };
        c.lower_lows = if prev_low.is_some_and(|p| low < p) { c.lower_lows + 1 } else { 0 };
        out.put("up_count", c.up as f64);
        out.put("down_count", c.down as f64);
        out.put("higher_high_count", c.higher_highs as f64);
        out.put("lower_low_count", c.lower_lows as f64);

        cyclical_time(bar, &mut out);

        // Order-flow proxies from close location
        let clv = safe_div((close - low) - (high - close), range, 0.0);
        out.put("of_clv", clv);
        out.put("of_buy_share", safe_div(close - low, range, 0.5));
        out.put("of_signed_volume", clv * volume);
        let of_pressure = if self.has(medium) {
            let highs = self.history.highs(medium);
            let lows = self.history.lows(medium);
            let closes = self.history.closes(medium);
            let vols = self.history.volumes(medium);
            let signed: f64 = (0..medium)
                .map(|i| {
                    let r = highs[i] - lows[i];
                    safe_div((closes[i] - lows[i]) - (highs[i] - closes[i]), r, 0.0) * vols[i]
                })
                .sum();
            safe_div(signed, vols.iter().sum(), 0.0)
        } else {
            0.0
        };
        out.put("of_pressure", of_pressure);

        // Fractal, Hurst, ACF and spectral over the long tier
        let (higuchi_fd, katz_fd) = if self.has(long) {
            let closes = self.history.closes(long);
            (higuchi(&closes, self.config.higuchi_k_max), katz(&closes))
        } else {
            (DEFAULT_DIMENSION, DEFAULT_DIMENSION)
        };
        out.put("higuchi_fd", higuchi_fd);
        out.put("katz_fd", katz_fd);

        let rr = if self.has(long) {
            rescaled_range(&self.history.closes(long))
        } else {
            Default::default()
        };
        out.put("rs", rr.rs);
        out.put("hurst", rr.hurst);

        let long_returns = self.returns(long);
        let acf: Vec<f64> = (1..=3).map(|lag| autocorrelation(&long_returns, lag)).collect();
        out.put("acf_1", acf[0]);
        out.put("acf_2", acf[1]);
        out.put("acf_3", acf[2]);
        out.put("pacf_1", acf[0]);
        out.put("pacf_2", pacf2(acf[0], acf[1]));

        let long_closes = self.history.closes(long);
        out.put(
            "spectral_16",
            low_high_energy_ratio(&long_closes, SpectralWindow::N16),
        );
        out.put(
            "spectral_32",
            low_high_energy_ratio(&long_closes, SpectralWindow::N32),
        );

        // Realized, robust, sign and liquidity families over the medium tier
        let medium_returns = self.returns(medium);
        if medium_returns.is_empty() {
            for name in ["rv", "bv", "rq", "realized_range", "jump_ratio"] {
                out.put(name, 0.0);
            }
        } else {
            let rv = realized_variance(&medium_returns);
            let bv = bipower_variation(&medium_returns);
            out.put("rv", rv);
            out.put("bv", bv);
            out.put("rq", realized_quarticity(&medium_returns));
            out.put(
                "realized_range",
                realized_range(&self.history.highs(medium), &self.history.lows(medium)),
            );
            out.put("jump_ratio", jump_ratio(rv, bv));
        }

        let robust = if self.has(medium + 2) {
            let r = log_returns(&self.history.closes(medium + 2));
            let (past_returns, current) = r.split_at(r.len() - 1);
            robust_stats(past_returns, current[0])
        } else {
            Default::default()
        };
        out.put("robust_median", robust.median);
        out.put("robust_mad", robust.mad);
        out.put("robust_dev", robust.deviation);

        let shares = sign_shares(&medium_returns);
        out.put("sign_imbalance", shares.imbalance());
        out.put("positive_share", shares.positive);
        out.put("sign_entropy", shares.entropy());

        let medium_volumes = self.history.volumes(medium);
        let amihud: Vec<f64> = medium_returns
            .iter()
            .zip(&medium_volumes)
            .filter(|(_, v)| **v > EPS)
            .map(|(r, v)| r.abs() / v)
            .collect();
        out.put("amihud", mean(&amihud));
        out.put(
            "range_per_volume",
            safe_div(
                mean(&self.history.ranges(short)),
                mean(&self.history.volumes(short)),
                0.0,
            ),
        );

        out.finish()
    }
}

impl FeatureEngine for TieredSpikeEngine {
    fn name(&self) -> &str {
        "tiered"
    }

    fn reset(&mut self) {
        self.history.clear();
        self.prev_velocity = [None; 3];
        self.counts = PatternCounts::default();
        self.tracker.reset();
        self.features.clear();
    }

    fn update(&mut self, bar: &Bar, _derived: &DerivedBar) {
        self.features = self.compute(bar);
        self.tracker.tick("tiered");
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
    use approx::assert_abs_diff_eq;
    use spikefeat_core::Timeframe;

    fn bars(n: usize) -> Vec<Bar> {
        let tf = Timeframe::from_minutes(5).unwrap();
        (0..n)
            .map(|i| {
                let c = 50.0 + (i as f64 * 0.2).cos() * 1.5 + i as f64 * 0.02;
                let o = c + 0.05;
                Bar::new("NQ", tf, i as i64 * 300_000, o, o + 0.3, c - 0.3, c, 500 + (i % 5) as u64 * 50)
                    .unwrap()
            })
            .collect()
    }

    fn run(engine: &mut TieredSpikeEngine, input: &[Bar]) {
        for bar in input {
            let derived = DerivedBar {
                open: bar.open(),
                high: bar.high(),
                low: bar.low(),
                close: bar.close(),
            };
            engine.update(bar, &derived);
        }
    }

    #[test]
    fn test_warmup_is_long_tier() {
        let engine = TieredSpikeEngine::new(&TieredConfig::default()).unwrap();
        assert_eq!(engine.warmup_bars(), 61);
    }

    #[test]
    fn test_invalid_tiers_rejected() {
        let config = TieredConfig {
            tiers: [20, 10, 60],
            ..Default::default()
        };
        assert!(TieredSpikeEngine::new(&config).is_err());
    }

    #[test]
    fn test_drawdown_and_runup_for_every_tier() {
        let mut engine = TieredSpikeEngine::new(&TieredConfig::default()).unwrap();
        run(&mut engine, &bars(100));
        let f = engine.features();
        for tier in TIER_NAMES {
            assert!(f.contains_key(&format!("tsf_drawdown_{tier}")));
            assert!(f.contains_key(&format!("tsf_runup_{tier}")));
        }
        assert!(f.values().all(|v| v.is_finite()));
        assert!((1.0..=2.0).contains(&f["tsf_higuchi_fd"]));
        assert!((0.0..=1.0).contains(&f["tsf_spectral_32"]));
    }

    #[test]
    fn test_raw_fields_and_bounded_history() {
        let input = bars(200);
        let mut engine = TieredSpikeEngine::new(&TieredConfig::default()).unwrap();
        run(&mut engine, &input);
        let last = input.last().unwrap();
        let f = engine.features();
        assert_eq!(f["tsf_close"], last.close());
        assert_eq!(f["tsf_volume"], last.volume() as f64);
        assert_eq!(engine.history.len(), 61);
        assert_abs_diff_eq!(
            f["tsf_vel_short"],
            last.close() / input[194].close() - 1.0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_reset_restores_initial_state() {
        let input = bars(80);
        let mut engine = TieredSpikeEngine::new(&TieredConfig::default()).unwrap();
        run(&mut engine, &input);
        let first = engine.features();
        engine.reset();
        assert!(engine.features().is_empty());
        assert_eq!(engine.bars_seen(), 0);
        run(&mut engine, &input);
        assert_eq!(first, engine.features());
    }
}

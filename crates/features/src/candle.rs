//! Candle geometry and structure metrics.
//!
//! One engine type, two instances: `raw_` reads the raw OHLC, `ha_` reads
//! the derived (Heikin-Ashi) OHLC. Volume always comes from the raw bar.
//! Statistics scored against a rolling window are read before the current
//! value is added to that window.

use crate::engine::{FeatureEngine, FeatureWriter, WarmupTracker};
use crate::extrema::{RollingMax, RollingMin};
use crate::numeric::{pct_change, safe_div, sign, EPS};
use crate::regression::RollingOls;
use crate::ring::RingBuffer;
use crate::rolling::{RollingStats, RollingSum};
use crate::smoothing::{true_range, Smoother};
use crate::volatility::{garman_klass, parkinson, rogers_satchell};
use spikefeat_core::config::CandleConfig;
use spikefeat_core::{Bar, DerivedBar, FeatureMap, Result};

/// Which OHLC the engine measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandleSource {
    Raw,
    Derived,
}

impl CandleSource {
    pub fn prefix(self) -> &'static str {
        match self {
            CandleSource::Raw => "raw_",
            CandleSource::Derived => "ha_",
        }
    }

    pub fn engine_name(self) -> &'static str {
        match self {
            CandleSource::Raw => "raw_candle",
            CandleSource::Derived => "ha_candle",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Candle {
    open: f64,
    high: f64,
    low: f64,
    close: f64,
}

impl Candle {
    fn range(&self) -> f64 {
        self.high - self.low
    }

    fn body(&self) -> f64 {
        self.close - self.open
    }

    fn body_top(&self) -> f64 {
        self.open.max(self.close)
    }

    fn body_bottom(&self) -> f64 {
        self.open.min(self.close)
    }
}

#[derive(Debug, Clone)]
struct SlopeTrack {
    window: usize,
    ols: RollingOls,
    prev_slope: Option<f64>,
}

/// Body color: +1 up, -1 down, 0 inside the `EPS` dead band.
pub(crate) fn body_color(body: f64) -> i64 {
    if body > EPS {
        1
    } else if body < -EPS {
        -1
    } else {
        0
    }
}

/// Signed color run after a bar of `color`. A neutral bar ends the run.
pub(crate) fn extend_color_run(run: i64, color: i64) -> i64 {
    match color {
        0 => 0,
        _ if run.signum() == color => run + color,
        _ => color,
    }
}

/// Close location value in [-1, 1], 0 for a zero range.
pub(crate) fn close_location(high: f64, low: f64, close: f64) -> f64 {
    safe_div((close - low) - (high - close), high - low, 0.0)
}

/// Candle metrics engine.
#[derive(Debug, Clone)]
pub struct CandleEngine {
    source: CandleSource,
    config: CandleConfig,
    prev: Option<Candle>,
    /// Recent candles for multi-bar patterns and swing pivots.
    recent: RingBuffer<Candle>,
    ma_short: RollingSum,
    ma_long: RollingSum,
    range_stats: RollingStats,
    parkinson_stats: RollingStats,
    /// Sorted by window, shortest first.
    slopes: Vec<SlopeTrack>,
    run_length: i64,
    trend: Smoother,
    clv: RollingSum,
    clv_volume: RollingSum,
    volume: RollingSum,
    prior_high: RollingMax,
    prior_low: RollingMin,
    /// (price, bar index) of the last confirmed swing pivots.
    swing_high: Option<(f64, usize)>,
    swing_low: Option<(f64, usize)>,
    compression_closes: RollingStats,
    compression_tr: RollingSum,
    tracker: WarmupTracker,
    features: FeatureMap,
}

impl CandleEngine {
    pub fn new(source: CandleSource, config: &CandleConfig) -> Result<Self> {
        config.validate()?;
        let mut windows = config.slope_windows.clone();
        windows.sort_unstable();
        windows.dedup();
        let slopes = windows
            .iter()
            .map(|&window| SlopeTrack {
                window,
                ols: RollingOls::new(window),
                prev_slope: None,
            })
            .collect();
        let max_slope = windows.last().copied().unwrap_or(3);
        let pivot_span = 2 * config.swing_strength + 1;

        let warmup = [
            config.ma_long,
            config.stats_window + 1,
            max_slope + 1,
            config.trend_ema_period,
            config.pressure_window,
            config.extreme_lookback + 1,
            pivot_span,
            config.compression_window,
        ]
        .into_iter()
        .max()
        .unwrap_or(1);

        Ok(Self {
            source,
            prev: None,
            recent: RingBuffer::new(pivot_span.max(3)),
            ma_short: RollingSum::new(config.ma_short),
            ma_long: RollingSum::new(config.ma_long),
            range_stats: RollingStats::new(config.stats_window)?,
            parkinson_stats: RollingStats::new(config.stats_window)?,
            slopes,
            run_length: 0,
            trend: Smoother::ema(config.trend_ema_period),
            clv: RollingSum::new(config.pressure_window),
            clv_volume: RollingSum::new(config.pressure_window),
            volume: RollingSum::new(config.pressure_window),
            prior_high: RollingMax::new(config.extreme_lookback),
            prior_low: RollingMin::new(config.extreme_lookback),
            swing_high: None,
            swing_low: None,
            compression_closes: RollingStats::new(config.compression_window)?,
            compression_tr: RollingSum::new(config.compression_window),
            tracker: WarmupTracker::new(warmup),
            features: FeatureMap::new(),
            config: config.clone(),
        })
    }

    pub fn source(&self) -> CandleSource {
        self.source
    }

    fn candle(&self, bar: &Bar, derived: &DerivedBar) -> Candle {
        match self.source {
            CandleSource::Raw => Candle {
                open: bar.open(),
                high: bar.high(),
                low: bar.low(),
                close: bar.close(),
            },
            CandleSource::Derived => Candle {
                open: derived.open,
                high: derived.high,
                low: derived.low,
                close: derived.close,
            },
        }
    }

    fn compute(&mut self, c: Candle, volume: f64) -> FeatureMap {
        let mut out = FeatureWriter::new(self.source.prefix());
        let index = self.tracker.seen();
        let prev = self.prev;

        // Geometry
        let range = c.range();
        let body = c.body();
        let upper = c.high - c.body_top();
        let lower = c.body_bottom() - c.low;
        let body_to_range = safe_div(body.abs(), range, 0.0);
        let upper_ratio = safe_div(upper, range, 0.0);
        let lower_ratio = safe_div(lower, range, 0.0);
        out.put("range", range);
        out.put("body", body);
        out.put("body_abs", body.abs());
        out.put("upper_wick", upper);
        out.put("lower_wick", lower);
        out.put("body_to_range", body_to_range);
        out.put("upper_wick_ratio", upper_ratio);
        out.put("lower_wick_ratio", lower_ratio);
        out.put("wick_asymmetry", safe_div(upper - lower, range, 0.0));
        out.put("close_position", safe_div(c.close - c.low, range, 0.5));

        // Shape scores
        let has_range = range > EPS;
        let marubozu = if has_range {
            ((body_to_range - 0.5) / 0.5).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let doji = if has_range {
            (1.0 - body_to_range / 0.1).max(0.0)
        } else {
            0.0
        };
        let pin = if has_range {
            upper_ratio.max(lower_ratio) * (1.0 - body_to_range)
        } else {
            0.0
        };
        out.put("marubozu_score", marubozu);
        out.put("doji_score", doji);
        out.put("pin_score", pin);

        // Gap vs previous close
        let gap = prev.map_or(0.0, |p| c.open - p.close);
        out.put("gap", gap);
        out.put("gap_abs", gap.abs());
        out.put(
            "gap_pct",
            prev.map_or(0.0, |p| pct_change(p.close, c.open) * 100.0),
        );

        // Closed-form volatility
        let park = parkinson(c.high, c.low);
        out.put("parkinson", park);
        out.put("garman_klass", garman_klass(c.open, c.high, c.low, c.close));
        out.put("rogers_satchell", rogers_satchell(c.open, c.high, c.low, c.close));

        // Past-only range / Parkinson statistics
        let stats_ready = self.range_stats.is_ready();
        let range_mean = if stats_ready { self.range_stats.mean() } else { 0.0 };
        out.put("range_mean", range_mean);
        out.put(
            "range_std",
            if stats_ready { self.range_stats.stddev() } else { 0.0 },
        );
        out.put(
            "range_dev",
            if stats_ready { self.range_stats.z_score(range) } else { 0.0 },
        );
        out.put(
            "range_ratio",
            if stats_ready { safe_div(range, range_mean, 0.0) } else { 0.0 },
        );
        let park_ready = self.parkinson_stats.is_ready();
        out.put(
            "parkinson_mean",
            if park_ready { self.parkinson_stats.mean() } else { 0.0 },
        );
        out.put(
            "parkinson_std",
            if park_ready { self.parkinson_stats.stddev() } else { 0.0 },
        );
        out.put(
            "parkinson_dev",
            if park_ready { self.parkinson_stats.z_score(park) } else { 0.0 },
        );
        self.range_stats.add(range);
        self.parkinson_stats.add(park);

        // Moving averages
        self.ma_short.add(c.close);
        self.ma_long.add(c.close);
        let ma_short = if self.ma_short.is_ready() { self.ma_short.mean() } else { 0.0 };
        let ma_long = if self.ma_long.is_ready() { self.ma_long.mean() } else { 0.0 };
        out.put("ma_short", ma_short);
        out.put("ma_long", ma_long);
        out.put(
            "ma_spread",
            if ma_long > 0.0 { pct_change(ma_long, ma_short) } else { 0.0 },
        );
        out.put(
            "close_to_ma_long",
            if ma_long > 0.0 { pct_change(ma_long, c.close) } else { 0.0 },
        );

        // OLS slope / angle / acceleration per window
        let mut ready_slopes = Vec::with_capacity(self.slopes.len());
        for track in &mut self.slopes {
            track.ols.add(c.close);
            let w = track.window;
            if track.ols.is_ready() {
                let fit = track.ols.fit();
                let accel = track.prev_slope.map_or(0.0, |p| fit.slope - p);
                track.prev_slope = Some(fit.slope);
                ready_slopes.push(Some(fit.slope));
                out.put(&format!("slope_{w}"), fit.slope);
                out.put(&format!("angle_{w}"), fit.angle_deg);
                out.put(&format!("accel_{w}"), accel);
                out.put(&format!("mse_{w}"), fit.mse);
                out.put(&format!("slope_se_{w}"), fit.slope_se);
            } else {
                ready_slopes.push(None);
                for name in ["slope", "angle", "accel", "mse", "slope_se"] {
                    out.put(&format!("{name}_{w}"), 0.0);
                }
            }
        }
        let shortest = ready_slopes.first().copied().flatten();
        let longest = ready_slopes.last().copied().flatten();
        out.put(
            "curvature",
            match (shortest, longest) {
                (Some(s), Some(l)) => s - l,
                _ => 0.0,
            },
        );

        // Color run and trend strength
        self.run_length = extend_color_run(self.run_length, body_color(body));
        out.put("run_length", self.run_length as f64);
        let trend = self
            .trend
            .update(sign(body) * body_to_range)
            .unwrap_or(0.0);
        out.put("trend_strength", trend);

        // CLV pressure
        let clv = close_location(c.high, c.low, c.close);
        self.clv.add(clv);
        self.clv_volume.add(clv * volume);
        self.volume.add(volume);
        let pressure = safe_div(self.clv_volume.sum(), self.volume.sum(), self.clv.mean());
        out.put("clv", clv);
        out.put("pressure", pressure);

        // Two-bar and three-bar patterns
        let engulfing = match prev {
            Some(p) if body * p.body() < 0.0
                && c.body_top() >= p.body_top()
                && c.body_bottom() <= p.body_bottom() =>
            {
                sign(body) * (1.0 - safe_div(p.body().abs(), body.abs(), 1.0)).clamp(0.0, 1.0)
            }
            _ => 0.0,
        };
        out.put("engulfing_score", engulfing);

        let fvg_gap = match self.recent.back(1) {
            Some(a) if c.low > a.high => c.low - a.high,
            Some(a) if c.high < a.low => c.high - a.low,
            _ => 0.0,
        };
        let fvg_scale = if range_mean > EPS { range_mean } else { range };
        out.put("fvg_score", safe_div(fvg_gap, fvg_scale, 0.0));

        // Prior-N extremes, read before the current bar joins them
        let extremes_ready = self.prior_high.is_ready();
        let prior_high = self.prior_high.current().filter(|_| extremes_ready);
        let prior_low = self.prior_low.current().filter(|_| extremes_ready);
        let mut sweep = 0.0;
        if let Some(h) = prior_high {
            if c.high > h && c.close < h {
                sweep -= safe_div(c.high - h, range, 0.0);
            }
        }
        if let Some(l) = prior_low {
            if c.low < l && c.close > l {
                sweep += safe_div(l - c.low, range, 0.0);
            }
        }
        out.put("sweep_score", sweep);
        out.put(
            "dist_prior_high",
            prior_high.map_or(0.0, |h| pct_change(h, c.close)),
        );
        out.put(
            "dist_prior_low",
            prior_low.map_or(0.0, |l| pct_change(l, c.close)),
        );
        out.put(
            "bars_since_prior_high",
            self.prior_high
                .bars_since()
                .filter(|_| extremes_ready)
                .map_or(0.0, |b| (b + 1) as f64),
        );
        out.put(
            "bars_since_prior_low",
            self.prior_low
                .bars_since()
                .filter(|_| extremes_ready)
                .map_or(0.0, |b| (b + 1) as f64),
        );
        self.prior_high.add(c.high);
        self.prior_low.add(c.low);

        // Swing pivots confirmed `swing_strength` bars after the fact
        self.recent.push(c);
        let strength = self.config.swing_strength;
        let span = 2 * strength + 1;
        if self.recent.len() >= span {
            if let Some(center) = self.recent.back(strength) {
                let others = (0..span).filter(|&o| o != strength).filter_map(|o| self.recent.back(o));
                let (mut is_high, mut is_low) = (true, true);
                for other in others {
                    is_high &= center.high > other.high;
                    is_low &= center.low < other.low;
                }
                if is_high {
                    self.swing_high = Some((center.high, index - strength));
                }
                if is_low {
                    self.swing_low = Some((center.low, index - strength));
                }
            }
        }
        out.put(
            "dist_swing_high",
            self.swing_high.map_or(0.0, |(h, _)| pct_change(h, c.close)),
        );
        out.put(
            "dist_swing_low",
            self.swing_low.map_or(0.0, |(l, _)| pct_change(l, c.close)),
        );
        out.put(
            "bars_since_swing_high",
            self.swing_high.map_or(0.0, |(_, i)| (index - i) as f64),
        );
        out.put(
            "bars_since_swing_low",
            self.swing_low.map_or(0.0, |(_, i)| (index - i) as f64),
        );

        // Bollinger / Keltner compression
        self.compression_closes.add(c.close);
        self.compression_tr
            .add(true_range(c.high, c.low, prev.map(|p| p.close)));
        if self.compression_closes.is_ready() {
            let mean = self.compression_closes.mean();
            let bb = 2.0 * self.config.bb_k * self.compression_closes.stddev();
            let kc = 2.0 * self.config.keltner_mult * self.compression_tr.mean();
            out.put("bb_width", safe_div(bb, mean, 0.0));
            out.put("keltner_width", safe_div(kc, mean, 0.0));
            out.put("squeeze_ratio", safe_div(bb, kc, 0.0));
            out.put_flag("squeeze", kc > EPS && bb < kc);
        } else {
            out.put("bb_width", 0.0);
            out.put("keltner_width", 0.0);
            out.put("squeeze_ratio", 0.0);
            out.put_flag("squeeze", false);
        }

        self.prev = Some(c);
        out.finish()
    }
}

impl FeatureEngine for CandleEngine {
    fn name(&self) -> &str {
        self.source.engine_name()
    }

    fn reset(&mut self) {
        self.prev = None;
        self.recent.clear();
        self.ma_short.clear();
        self.ma_long.clear();
        self.range_stats.clear();
        self.parkinson_stats.clear();
        for track in &mut self.slopes {
            track.ols.clear();
            track.prev_slope = None;
        }
        self.run_length = 0;
        self.trend.reset();
        self.clv.clear();
        self.clv_volume.clear();
        self.volume.clear();
        self.prior_high.clear();
        self.prior_low.clear();
        self.swing_high = None;
        self.swing_low = None;
        self.compression_closes.clear();
        self.compression_tr.clear();
        self.tracker.reset();
        self.features.clear();
    }

    fn update(&mut self, bar: &Bar, derived: &DerivedBar) {
        let candle = self.candle(bar, derived);
        self.features = self.compute(candle, bar.volume() as f64);
        self.tracker.tick(self.source.engine_name());
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

    fn bar(i: i64, o: f64, h: f64, l: f64, c: f64) -> Bar {
        let tf = Timeframe::from_minutes(1).unwrap();
        Bar::new("ES", tf, i * 60_000, o, h, l, c, 100).unwrap()
    }

    fn derived_of(b: &Bar) -> DerivedBar {
        DerivedBar {
            open: b.open(),
            high: b.high(),
            low: b.low(),
            close: b.close(),
        }
    }

    fn raw_engine() -> CandleEngine {
        CandleEngine::new(CandleSource::Raw, &CandleConfig::default()).unwrap()
    }

    #[test]
    fn test_geometry() {
        let mut engine = raw_engine();
        let b = bar(0, 100.0, 110.0, 95.0, 105.0);
        engine.update(&b, &derived_of(&b));
        let f = engine.features();
        assert_abs_diff_eq!(f["raw_range"], 15.0, epsilon = 1e-12);
        assert_abs_diff_eq!(f["raw_body"], 5.0, epsilon = 1e-12);
        assert_abs_diff_eq!(f["raw_upper_wick"], 5.0, epsilon = 1e-12);
        assert_abs_diff_eq!(f["raw_lower_wick"], 5.0, epsilon = 1e-12);
        assert_abs_diff_eq!(f["raw_body_to_range"], 1.0 / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(f["raw_wick_asymmetry"], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(f["raw_close_position"], 10.0 / 15.0, epsilon = 1e-12);
        assert_eq!(f["raw_gap"], 0.0);
    }

    #[test]
    fn test_derived_source_reads_derived_bar() {
        let mut engine = CandleEngine::new(CandleSource::Derived, &CandleConfig::default()).unwrap();
        let b = bar(0, 100.0, 110.0, 95.0, 105.0);
        let d = DerivedBar {
            open: 100.0,
            high: 104.0,
            low: 100.0,
            close: 104.0,
        };
        engine.update(&b, &d);
        let f = engine.features();
        assert_abs_diff_eq!(f["ha_range"], 4.0, epsilon = 1e-12);
        assert_abs_diff_eq!(f["ha_body_to_range"], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(f["ha_marubozu_score"], 1.0, epsilon = 1e-12);
        assert_eq!(engine.name(), "ha_candle");
    }

    #[test]
    fn test_gap_and_engulfing() {
        let mut engine = raw_engine();
        let first = bar(0, 101.0, 101.5, 99.5, 100.0);
        engine.update(&first, &derived_of(&first));
        let second = bar(1, 99.8, 103.0, 99.5, 102.5);
        engine.update(&second, &derived_of(&second));
        let f = engine.features();
        assert_abs_diff_eq!(f["raw_gap"], -0.2, epsilon = 1e-12);
        // Bullish body 2.7 engulfs bearish body 1.0
        assert_abs_diff_eq!(f["raw_engulfing_score"], 1.0 - 1.0 / 2.7, epsilon = 1e-12);
    }

    #[test]
    fn test_run_length_and_reset() {
        let mut engine = raw_engine();
        for i in 0..4 {
            let base = 100.0 + i as f64;
            let b = bar(i, base, base + 1.5, base - 0.5, base + 1.0);
            engine.update(&b, &derived_of(&b));
        }
        assert_eq!(engine.features()["raw_run_length"], 4.0);
        let b = bar(4, 104.0, 104.5, 102.0, 103.0);
        engine.update(&b, &derived_of(&b));
        assert_eq!(engine.features()["raw_run_length"], -1.0);

        engine.reset();
        assert!(engine.features().is_empty());
        assert_eq!(engine.bars_seen(), 0);
    }

    #[test]
    fn test_swing_high_detected() {
        let config = CandleConfig {
            swing_strength: 1,
            ..Default::default()
        };
        let mut engine = CandleEngine::new(CandleSource::Raw, &config).unwrap();
        for (i, h) in [101.0, 105.0, 102.0].into_iter().enumerate() {
            let b = bar(i as i64, 100.0, h, 99.0, 100.5);
            engine.update(&b, &derived_of(&b));
        }
        let f = engine.features();
        assert_abs_diff_eq!(f["raw_bars_since_swing_high"], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(f["raw_dist_swing_high"], 100.5 / 105.0 - 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_flat_bars_are_finite_zero_ratios() {
        let mut engine = raw_engine();
        for i in 0..60 {
            let b = bar(i, 50.0, 50.0, 50.0, 50.0);
            engine.update(&b, &derived_of(&b));
        }
        let f = engine.features();
        assert!(engine.is_warm());
        assert!(f.values().all(|v| v.is_finite()));
        assert_eq!(f["raw_body_to_range"], 0.0);
        assert_eq!(f["raw_upper_wick_ratio"], 0.0);
        assert_eq!(f["raw_lower_wick_ratio"], 0.0);
        assert_eq!(f["raw_bb_width"], 0.0);
        assert_eq!(f["raw_slope_5"], 0.0);
    }

    #[test]
    fn test_color_run_helpers() {
        assert_eq!(body_color(0.5), 1);
        assert_eq!(body_color(-1e-13), 0);
        assert_eq!(extend_color_run(3, 1), 4);
        assert_eq!(extend_color_run(3, -1), -1);
        assert_eq!(extend_color_run(-2, 0), 0);
        assert_eq!(close_location(2.0, 1.0, 2.0), 1.0);
        assert_eq!(close_location(1.0, 1.0, 1.0), 0.0);
    }

    #[test]
    fn test_trend_slopes_positive() {
        let mut engine = raw_engine();
        for i in 0..30 {
            let base = 100.0 + i as f64 * 0.5;
            let b = bar(i, base, base + 0.6, base - 0.1, base + 0.5);
            engine.update(&b, &derived_of(&b));
        }
        let f = engine.features();
        assert_abs_diff_eq!(f["raw_slope_5"], 0.5, epsilon = 1e-9);
        assert_abs_diff_eq!(f["raw_accel_5"], 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(f["raw_curvature"], 0.0, epsilon = 1e-9);
        assert!(f["raw_angle_5"] > 0.0);
        assert_eq!(f["raw_run_length"], 30.0);
    }
}

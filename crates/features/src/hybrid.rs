//! Hybrid multi-window statistics engine.
//!
//! Window statistics are recomputed each bar from a bounded `BarHistory`
//! sized for the largest configured window. Ratios against a "past"
//! average exclude the current bar. Optional cross-source divergence
//! compares the angle, CLV pressure and color run of the raw and derived
//! candles, each tracked with O(1) rolling state.

use crate::candle::{body_color, close_location, extend_color_run};
use crate::engine::{FeatureEngine, FeatureWriter, WarmupTracker};
use crate::fractal::{higuchi, katz, DEFAULT_DIMENSION};
use crate::history::BarHistory;
use crate::numeric::{pct_change, safe_div, sign, EPS};
use crate::realized::{
    bipower_variation, efficiency_ratio, jump_ratio, realized_quarticity, realized_range,
    realized_variance, rescaled_range,
};
use crate::regression::{ols_slope, RollingOls};
use crate::rolling::RollingSum;
use crate::series::{
    autocorrelation, log_returns, max_drawdown, max_runup, mean, moments, pacf2, pearson,
    robust_stats, sign_shares, std_dev,
};
use crate::spectral::{low_high_energy_ratio, SpectralWindow};
use chrono::{Datelike, Timelike};
use spikefeat_core::config::{CandleConfig, HybridConfig};
use spikefeat_core::{Bar, DerivedBar, FeatureMap, Result};
use std::f64::consts::TAU;

const PREFIX: &str = "hyb_";

/// Consecutive-bar counters.
#[derive(Debug, Clone, Copy, Default)]
struct Runs {
    up: u32,
    down: u32,
    tight: u32,
    wide: u32,
    high_volume: u32,
    low_volume: u32,
}

fn extend(run: u32, hit: bool) -> u32 {
    if hit {
        run + 1
    } else {
        0
    }
}

#[derive(Debug, Clone, Copy)]
struct TrendReading {
    angle: f64,
    pressure: f64,
    run_length: f64,
}

/// Angle, pressure and color run of one candle source.
#[derive(Debug, Clone)]
struct SourceTrend {
    ols: RollingOls,
    clv: RollingSum,
    clv_volume: RollingSum,
    volume: RollingSum,
    run_length: i64,
}

impl SourceTrend {
    fn new(slope_window: usize, pressure_window: usize) -> Self {
        Self {
            ols: RollingOls::new(slope_window),
            clv: RollingSum::new(pressure_window),
            clv_volume: RollingSum::new(pressure_window),
            volume: RollingSum::new(pressure_window),
            run_length: 0,
        }
    }

    fn update(&mut self, open: f64, high: f64, low: f64, close: f64, volume: f64) -> TrendReading {
        self.ols.add(close);
        self.run_length = extend_color_run(self.run_length, body_color(close - open));
        let clv = close_location(high, low, close);
        self.clv.add(clv);
        self.clv_volume.add(clv * volume);
        self.volume.add(volume);

        let angle = if self.ols.is_ready() {
            self.ols.fit().angle_deg
        } else {
            0.0
        };
        let pressure = safe_div(self.clv_volume.sum(), self.volume.sum(), self.clv.mean());
        TrendReading {
            angle,
            pressure,
            run_length: self.run_length as f64,
        }
    }

    fn clear(&mut self) {
        self.ols.clear();
        self.clv.clear();
        self.clv_volume.clear();
        self.volume.clear();
        self.run_length = 0;
    }
}

/// Raw and derived candle trends compared bar by bar.
#[derive(Debug, Clone)]
struct Divergence {
    raw: SourceTrend,
    derived: SourceTrend,
}

/// Sin/cos encodings of hour-of-day and day-of-week.
pub(crate) fn cyclical_time(bar: &Bar, out: &mut FeatureWriter<'_>) {
    let ts = bar.ts();
    let hour = ts.hour() as f64 + ts.minute() as f64 / 60.0;
    let day = ts.weekday().num_days_from_monday() as f64;
    out.put("tod_sin", (TAU * hour / 24.0).sin());
    out.put("tod_cos", (TAU * hour / 24.0).cos());
    out.put("dow_sin", (TAU * day / 7.0).sin());
    out.put("dow_cos", (TAU * day / 7.0).cos());
}

/// Multi-window statistics engine.
#[derive(Debug, Clone)]
pub struct HybridEngine {
    config: HybridConfig,
    spectral: SpectralWindow,
    history: BarHistory,
    prev_velocity: Vec<Option<f64>>,
    runs: Runs,
    divergence: Option<Divergence>,
    tracker: WarmupTracker,
    features: FeatureMap,
}

impl HybridEngine {
    /// `candle` supplies the slope and pressure windows for cross-source
    /// divergence (shortest slope window, pressure window).
    pub fn new(config: &HybridConfig, candle: &CandleConfig) -> Result<Self> {
        config.validate()?;
        let spectral = SpectralWindow::try_from(config.spectral_n)?;
        let max_lag = config.velocity_lags.iter().copied().max().unwrap_or(1);
        let capacity = [
            max_lag + 1,
            config.window + 1,
            config.er_window + 1,
            config.hurst_window,
            config.rv_window + 1,
            config.vwap_window,
            config.acf_window + 1,
            config.robust_window + 2,
            spectral.size(),
            config.fractal_window,
            4 * config.slope_sub_window,
            config.drawdown_window,
        ]
        .into_iter()
        .max()
        .unwrap_or(1);

        let divergence_warmup = if config.cross_divergence {
            candle.validate()?;
            let slope_window = candle.slope_windows.iter().copied().min().unwrap_or(3);
            Some((slope_window, candle.pressure_window))
        } else {
            None
        };
        let divergence = divergence_warmup.map(|(slope, pressure)| Divergence {
            raw: SourceTrend::new(slope, pressure),
            derived: SourceTrend::new(slope, pressure),
        });
        let warmup = divergence_warmup.map_or(capacity, |(slope, pressure)| {
            capacity.max(slope).max(pressure)
        });

        Ok(Self {
            spectral,
            history: BarHistory::new(capacity),
            prev_velocity: vec![None; config.velocity_lags.len()],
            runs: Runs::default(),
            divergence,
            tracker: WarmupTracker::new(warmup),
            features: FeatureMap::new(),
            config: config.clone(),
        })
    }

    fn has(&self, bars: usize) -> bool {
        self.history.len() >= bars
    }

    fn compute(&mut self, bar: &Bar, derived: &DerivedBar) -> FeatureMap {
        let cfg = &self.config;
        let window = cfg.window;
        let range = bar.range();
        let volume = bar.volume() as f64;

        // Past-only averages, read before the bar joins the history
        let past_ready = self.has(window);
        let past_range = mean(&self.history.ranges(window));
        let past_volume = mean(&self.history.volumes(window));
        self.history.push(bar);

        let mut out = FeatureWriter::new(PREFIX);
        let close = bar.close();

        // Multi-scale velocity / acceleration
        for (i, &lag) in cfg.velocity_lags.iter().enumerate() {
            let velocity = self.history.close_back(lag).map(|c| pct_change(c, close));
            let accel = match (velocity, self.prev_velocity[i]) {
                (Some(v), Some(p)) => v - p,
                _ => 0.0,
            };
            self.prev_velocity[i] = velocity;
            out.put(&format!("vel_{lag}"), velocity.unwrap_or(0.0));
            out.put(&format!("accel_{lag}"), accel);
        }

        // Ratios vs past averages and consecutive counters
        let range_ratio = if past_ready { safe_div(range, past_range, 0.0) } else { 0.0 };
        let volume_ratio = if past_ready { safe_div(volume, past_volume, 0.0) } else { 0.0 };
        out.put("range_ratio", range_ratio);
        out.put("volume_ratio", volume_ratio);

        let prev_close = self.history.close_back(1);
        let runs = &mut self.runs;
        runs.up = extend(runs.up, prev_close.is_some_and(|p| close > p));
        runs.down = extend(runs.down, prev_close.is_some_and(|p| close < p));
        runs.tight = extend(runs.tight, past_ready && range_ratio < cfg.tight_range_ratio);
        runs.wide = extend(runs.wide, past_ready && range_ratio > cfg.wide_range_ratio);
        runs.high_volume = extend(
            runs.high_volume,
            past_ready && volume_ratio > cfg.high_volume_ratio,
        );
        runs.low_volume = extend(
            runs.low_volume,
            past_ready && volume_ratio < cfg.low_volume_ratio,
        );
        out.put("up_run", runs.up as f64);
        out.put("down_run", runs.down as f64);
        out.put("tight_run", runs.tight as f64);
        out.put("wide_run", runs.wide as f64);
        out.put("high_volume_run", runs.high_volume as f64);
        out.put("low_volume_run", runs.low_volume as f64);

        // Return moments and price-volume correlation
        let returns = if self.has(window + 1) {
            log_returns(&self.history.closes(window + 1))
        } else {
            Vec::new()
        };
        let m = moments(&returns);
        out.put("ret_std", m.std);
        out.put("ret_skew", m.skewness);
        out.put("ret_kurt", m.kurtosis);
        let volumes = self.history.volumes(window);
        out.put(
            "pv_corr",
            if returns.is_empty() { 0.0 } else { pearson(&returns, &volumes) },
        );

        // Momentum divergence: price direction vs momentum change
        let half = window / 2;
        let divergence = match (
            self.history.close_back(half),
            self.history.close_back(2 * half),
        ) {
            (Some(mid), Some(start)) => {
                let price_dir = sign(close - start);
                let mom_dir = sign((close - mid) - (mid - start));
                if price_dir != 0.0 && mom_dir != 0.0 && price_dir != mom_dir {
                    (mom_dir - price_dir) / 2.0
                } else {
                    0.0
                }
            }
            _ => 0.0,
        };
        out.put("mom_divergence", divergence);

        // Efficiency ratio and R/S
        out.put(
            "efficiency_ratio",
            if self.has(cfg.er_window + 1) {
                efficiency_ratio(&self.history.closes(cfg.er_window + 1))
            } else {
                0.0
            },
        );
        let rr = if self.has(cfg.hurst_window) {
            rescaled_range(&self.history.closes(cfg.hurst_window))
        } else {
            Default::default()
        };
        out.put("rs", rr.rs);
        out.put("hurst", rr.hurst);

        // Realized variance family
        if self.has(cfg.rv_window + 1) {
            let r = log_returns(&self.history.closes(cfg.rv_window + 1));
            let rv = realized_variance(&r);
            let bv = bipower_variation(&r);
            out.put("rv", rv);
            out.put("realized_vol", rv.sqrt());
            out.put("bv", bv);
            out.put("rq", realized_quarticity(&r));
            out.put(
                "realized_range",
                realized_range(
                    &self.history.highs(cfg.rv_window),
                    &self.history.lows(cfg.rv_window),
                ),
            );
            out.put("jump_ratio", jump_ratio(rv, bv));
        } else {
            for name in ["rv", "realized_vol", "bv", "rq", "realized_range", "jump_ratio"] {
                out.put(name, 0.0);
            }
        }

        // Rolling VWAP
        if self.has(cfg.vwap_window) {
            let typical = self.history.typical_prices(cfg.vwap_window);
            let vols = self.history.volumes(cfg.vwap_window);
            let pv: f64 = typical.iter().zip(&vols).map(|(p, v)| p * v).sum();
            let vwap = safe_div(pv, vols.iter().sum(), mean(&typical));
            out.put("vwap", vwap);
            out.put("vwap_dev", pct_change(vwap, close));
        } else {
            out.put("vwap", 0.0);
            out.put("vwap_dev", 0.0);
        }

        // Autocorrelation of returns
        let acf_returns = if self.has(cfg.acf_window + 1) {
            log_returns(&self.history.closes(cfg.acf_window + 1))
        } else {
            Vec::new()
        };
        let acf: Vec<f64> = (1..=3).map(|lag| autocorrelation(&acf_returns, lag)).collect();
        out.put("acf_1", acf[0]);
        out.put("acf_2", acf[1]);
        out.put("acf_3", acf[2]);
        out.put("pacf_1", acf[0]);
        out.put("pacf_2", pacf2(acf[0], acf[1]));

        // Sign shares over the main window
        let shares = sign_shares(&returns);
        out.put("sign_imbalance", shares.imbalance());
        out.put("positive_share", shares.positive);
        out.put("sign_entropy", shares.entropy());

        // Robust statistics: current return against the previous window
        let robust = if self.has(cfg.robust_window + 2) {
            let r = log_returns(&self.history.closes(cfg.robust_window + 2));
            let (past, current) = r.split_at(r.len() - 1);
            robust_stats(past, current[0])
        } else {
            Default::default()
        };
        out.put("robust_median", robust.median);
        out.put("robust_mad", robust.mad);
        out.put("robust_dev", robust.deviation);

        out.put(
            "spectral_ratio",
            low_high_energy_ratio(&self.history.closes(self.spectral.size()), self.spectral),
        );

        let (higuchi_fd, katz_fd) = if self.has(cfg.fractal_window) {
            let closes = self.history.closes(cfg.fractal_window);
            (higuchi(&closes, cfg.higuchi_k_max), katz(&closes))
        } else {
            (DEFAULT_DIMENSION, DEFAULT_DIMENSION)
        };
        out.put("higuchi_fd", higuchi_fd);
        out.put("katz_fd", katz_fd);

        // Std of OLS slopes over four consecutive sub-windows
        let sub = cfg.slope_sub_window;
        let stability = if self.has(4 * sub) {
            let closes = self.history.closes(4 * sub);
            let slopes: Vec<f64> = closes.chunks(sub).map(ols_slope).collect();
            std_dev(&slopes)
        } else {
            0.0
        };
        out.put("slope_stability", stability);

        // Liquidity
        let ranges = self.history.ranges(window);
        let amihud: Vec<f64> = returns
            .iter()
            .zip(&volumes)
            .filter(|(_, v)| **v > EPS)
            .map(|(r, v)| r.abs() / v)
            .collect();
        out.put("amihud", mean(&amihud));
        out.put(
            "range_per_volume",
            safe_div(mean(&ranges), mean(&volumes), 0.0),
        );

        let (drawdown, runup) = if self.has(cfg.drawdown_window) {
            let closes = self.history.closes(cfg.drawdown_window);
            (max_drawdown(&closes), max_runup(&closes))
        } else {
            (0.0, 0.0)
        };
        out.put("max_drawdown", drawdown);
        out.put("max_runup", runup);

        // Cross-source divergence
        if let Some(div) = &mut self.divergence {
            let raw = div
                .raw
                .update(bar.open(), bar.high(), bar.low(), bar.close(), volume);
            let ha = div
                .derived
                .update(derived.open, derived.high, derived.low, derived.close, volume);
            out.put("div_angle", raw.angle - ha.angle);
            out.put("div_pressure", raw.pressure - ha.pressure);
            out.put("div_run_length", raw.run_length - ha.run_length);
        }

        cyclical_time(bar, &mut out);

        // Data quality
        let completeness = safe_div(self.history.len() as f64, self.history.capacity() as f64, 0.0);
        let zero_volume_share = safe_div(
            volumes.iter().filter(|v| **v <= 0.0).count() as f64,
            volumes.len() as f64,
            0.0,
        );
        let step = bar.timeframe().millis();
        let stamps = self.history.timestamps(window);
        let irregular = stamps.windows(2).filter(|w| w[1] - w[0] != step).count();
        let time_gap_share = safe_div(irregular as f64, stamps.len().saturating_sub(1) as f64, 0.0);
        out.put("completeness", completeness);
        out.put("zero_volume_share", zero_volume_share);
        out.put("time_gap_share", time_gap_share);
        out.put(
            "quality_score",
            completeness * (1.0 - zero_volume_share) * (1.0 - time_gap_share),
        );

        out.finish()
    }
}

impl FeatureEngine for HybridEngine {
    fn name(&self) -> &str {
        "hybrid"
    }

    fn reset(&mut self) {
        self.history.clear();
        self.prev_velocity.iter_mut().for_each(|v| *v = None);
        self.runs = Runs::default();
        if let Some(div) = &mut self.divergence {
            div.raw.clear();
            div.derived.clear();
        }
        self.tracker.reset();
        self.features.clear();
    }

    fn update(&mut self, bar: &Bar, derived: &DerivedBar) {
        self.features = self.compute(bar, derived);
        self.tracker.tick("hybrid");
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

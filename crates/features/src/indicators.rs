//! Classic indicator engine: RSI, ATR, MACD, Bollinger bands and
//! per-window close metrics.

use crate::engine::{FeatureEngine, FeatureWriter, WarmupTracker};
use crate::numeric::{pct_change, safe_div};
use crate::ring::RingBuffer;
use crate::rolling::{RollingStats, RollingSum};
use crate::smoothing::{Atr, Macd, MacdValue, Rsi};
use crate::volatility::RollingVolatility;
use spikefeat_core::config::IndicatorConfig;
use spikefeat_core::{Bar, DerivedBar, FeatureMap, Result};

const PREFIX: &str = "ind_";

/// Rolling state for one configured metric window.
#[derive(Debug, Clone)]
struct WindowMetrics {
    window: usize,
    /// Log-return volatility.
    returns: RollingVolatility,
    /// 1 for an up close, 0 otherwise.
    up_closes: RollingSum,
    /// Closes for the past-only z-score.
    closes: RollingStats,
}

impl WindowMetrics {
    fn new(window: usize) -> Result<Self> {
        Ok(Self {
            window,
            returns: RollingVolatility::new(window)?,
            up_closes: RollingSum::new(window),
            closes: RollingStats::new(window)?,
        })
    }

    fn clear(&mut self) {
        self.returns.clear();
        self.up_closes.clear();
        self.closes.clear();
    }
}

/// RSI / ATR / MACD / Bollinger engine.
#[derive(Debug, Clone)]
pub struct IndicatorEngine {
    config: IndicatorConfig,
    rsi: Rsi,
    atr: Atr,
    macd: Macd,
    last_macd: Option<MacdValue>,
    bollinger: RollingStats,
    windows: Vec<WindowMetrics>,
    /// Closes retained for rate of change and momentum.
    closes: RingBuffer<f64>,
    tracker: WarmupTracker,
    features: FeatureMap,
}

impl IndicatorEngine {
    pub fn new(config: &IndicatorConfig) -> Result<Self> {
        config.validate()?;
        let windows = config
            .windows
            .iter()
            .map(|&w| WindowMetrics::new(w))
            .collect::<Result<Vec<_>>>()?;
        let max_window = config.windows.iter().copied().max().unwrap_or(1);
        let macd = Macd::new(config.macd_fast, config.macd_slow, config.macd_signal);

        let warmup = [
            config.rsi_period + 1,
            config.atr_period,
            macd.warmup(),
            config.bb_period,
            max_window + 1,
        ]
        .into_iter()
        .max()
        .unwrap_or(1);

        Ok(Self {
            rsi: Rsi::new(config.rsi_period),
            atr: Atr::new(config.atr_period),
            macd,
            last_macd: None,
            bollinger: RollingStats::new(config.bb_period)?,
            windows,
            closes: RingBuffer::new(max_window + 1),
            tracker: WarmupTracker::new(warmup),
            features: FeatureMap::new(),
            config: config.clone(),
        })
    }

    fn compute(&mut self, bar: &Bar) -> FeatureMap {
        let close = bar.close();
        let prev_close = self.closes.newest();
        self.closes.push(close);

        let rsi = self.rsi.update(close);
        let atr = self.atr.update(bar.high(), bar.low(), close).unwrap_or(0.0);
        if let Some(value) = self.macd.update(close) {
            self.last_macd = Some(value);
        }
        self.bollinger.add(close);

        let mut out = FeatureWriter::new(PREFIX);
        out.put("rsi", rsi);
        out.put("atr", atr);
        out.put("atr_pct", safe_div(atr, close, 0.0) * 100.0);

        let macd = self.last_macd.unwrap_or_default();
        out.put("macd", macd.macd);
        out.put("macd_signal", macd.signal);
        out.put("macd_hist", macd.histogram);

        if self.bollinger.is_ready() {
            let mid = self.bollinger.mean();
            let band = self.config.bb_k * self.bollinger.stddev();
            let (upper, lower) = (mid + band, mid - band);
            out.put("bb_mid", mid);
            out.put("bb_upper", upper);
            out.put("bb_lower", lower);
            out.put("bb_width", safe_div(upper - lower, mid, 0.0));
            out.put("bb_pctb", safe_div(close - lower, upper - lower, 0.5));
        } else {
            out.put("bb_mid", 0.0);
            out.put("bb_upper", 0.0);
            out.put("bb_lower", 0.0);
            out.put("bb_width", 0.0);
            out.put("bb_pctb", 0.5);
        }

        for metrics in &mut self.windows {
            let w = metrics.window;
            // Past-only: score before the close joins its own window
            let z = if metrics.closes.is_ready() {
                metrics.closes.z_score(close)
            } else {
                0.0
            };
            metrics.closes.add(close);
            metrics.returns.add_price(close);
            if let Some(prev) = prev_close {
                metrics.up_closes.add(if close > prev { 1.0 } else { 0.0 });
            }

            let lagged = self.closes.back(w);
            out.put(
                &format!("roc_{w}"),
                lagged.map_or(0.0, |c| pct_change(c, close)),
            );
            out.put(&format!("mom_{w}"), lagged.map_or(0.0, |c| close - c));
            out.put(
                &format!("vol_{w}"),
                if metrics.returns.is_ready() {
                    metrics.returns.volatility().unwrap_or(0.0)
                } else {
                    0.0
                },
            );
            out.put(
                &format!("psi_{w}"),
                if metrics.up_closes.is_ready() {
                    metrics.up_closes.mean()
                } else {
                    0.0
                },
            );
            out.put(&format!("zscore_{w}"), z);
        }

        out.finish()
    }
}

impl FeatureEngine for IndicatorEngine {
    fn name(&self) -> &str {
        "indicators"
    }

    fn reset(&mut self) {
        self.rsi.reset();
        self.atr.reset();
        self.macd.reset();
        self.last_macd = None;
        self.bollinger.clear();
        for metrics in &mut self.windows {
            metrics.clear();
        }
        self.closes.clear();
        self.tracker.reset();
        self.features.clear();
    }

    fn update(&mut self, bar: &Bar, _derived: &DerivedBar) {
        self.features = self.compute(bar);
        self.tracker.tick("indicators");
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

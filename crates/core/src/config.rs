//! Configuration structures for the spikefeat system.
//!
//! Every section validates itself; engines call `validate()` in their
//! constructors so a bad parameter fails before the first bar.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration for the feature pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Indicator engine configuration.
    pub indicators: IndicatorConfig,
    /// Candle / derived-bar metrics configuration (shared by both instances).
    pub candle: CandleConfig,
    /// Spike heuristics configuration.
    pub spike: SpikeConfig,
    /// Hybrid multi-window configuration.
    pub hybrid: HybridConfig,
    /// Tiered spike configuration.
    pub tiered: TieredConfig,
    /// Offline label configuration.
    pub labels: LabelConfig,
    /// Which engines run and how their output is merged.
    pub pipeline: PipelineConfig,
}

impl Config {
    /// Parse a configuration from JSON. Missing sections take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<()> {
        self.indicators.validate()?;
        self.candle.validate()?;
        self.spike.validate()?;
        self.hybrid.validate()?;
        self.tiered.validate()?;
        self.labels.validate()?;
        Ok(())
    }
}

fn require_min(name: &str, value: usize, min: usize) -> Result<()> {
    if value < min {
        return Err(Error::config(format!("{name} must be >= {min} (got {value})")));
    }
    Ok(())
}

fn require_positive(name: &str, value: f64) -> Result<()> {
    if !(value.is_finite() && value > 0.0) {
        return Err(Error::config(format!("{name} must be > 0 (got {value})")));
    }
    Ok(())
}

fn require_longer(short_name: &str, short: usize, long_name: &str, long: usize) -> Result<()> {
    if long <= short {
        return Err(Error::config(format!(
            "{long_name} ({long}) must be greater than {short_name} ({short})"
        )));
    }
    Ok(())
}

fn require_windows(name: &str, windows: &[usize], min: usize) -> Result<()> {
    if windows.is_empty() {
        return Err(Error::config(format!("{name} must not be empty")));
    }
    for &w in windows {
        require_min(name, w, min)?;
    }
    Ok(())
}

fn require_spectral(name: &str, n: usize) -> Result<()> {
    if n != 16 && n != 32 {
        return Err(Error::config(format!("{name} must be 16 or 32 (got {n})")));
    }
    Ok(())
}

/// Indicator engine configuration (RSI, ATR, MACD, Bollinger, per-window metrics).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorConfig {
    pub rsi_period: usize,
    pub atr_period: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub bb_period: usize,
    /// Band width in standard deviations.
    pub bb_k: f64,
    /// Windows for rate-of-change / volatility / strength / momentum / z-score.
    pub windows: Vec<usize>,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            atr_period: 14,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            bb_period: 20,
            bb_k: 2.0,
            windows: vec![5, 10, 20],
        }
    }
}

impl IndicatorConfig {
    pub fn validate(&self) -> Result<()> {
        require_min("indicators.rsi_period", self.rsi_period, 2)?;
        require_min("indicators.atr_period", self.atr_period, 2)?;
        require_min("indicators.macd_fast", self.macd_fast, 2)?;
        require_longer(
            "indicators.macd_fast",
            self.macd_fast,
            "indicators.macd_slow",
            self.macd_slow,
        )?;
        require_min("indicators.macd_signal", self.macd_signal, 2)?;
        require_min("indicators.bb_period", self.bb_period, 2)?;
        require_positive("indicators.bb_k", self.bb_k)?;
        require_windows("indicators.windows", &self.windows, 2)?;
        Ok(())
    }
}

/// Candle / derived-bar metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CandleConfig {
    pub ma_short: usize,
    pub ma_long: usize,
    /// Window for past-only range / Parkinson statistics.
    pub stats_window: usize,
    /// OLS slope windows; curvature is shortest minus longest.
    pub slope_windows: Vec<usize>,
    /// EMA period for the trend-strength score.
    pub trend_ema_period: usize,
    /// Window for the CLV pressure index.
    pub pressure_window: usize,
    /// Lookback for prior-N high/low distances and liquidity sweeps.
    pub extreme_lookback: usize,
    /// Pivot strength (bars on each side) for swing extremes.
    pub swing_strength: usize,
    /// Window for Bollinger/Keltner compression proxies.
    pub compression_window: usize,
    pub bb_k: f64,
    pub keltner_mult: f64,
}

impl Default for CandleConfig {
    fn default() -> Self {
        Self {
            ma_short: 5,
            ma_long: 20,
            stats_window: 20,
            slope_windows: vec![5, 10, 20],
            trend_ema_period: 10,
            pressure_window: 14,
            extreme_lookback: 20,
            swing_strength: 3,
            compression_window: 20,
            bb_k: 2.0,
            keltner_mult: 1.5,
        }
    }
}

impl CandleConfig {
    pub fn validate(&self) -> Result<()> {
        require_min("candle.ma_short", self.ma_short, 1)?;
        require_longer("candle.ma_short", self.ma_short, "candle.ma_long", self.ma_long)?;
        require_min("candle.stats_window", self.stats_window, 2)?;
        require_windows("candle.slope_windows", &self.slope_windows, 3)?;
        require_min("candle.trend_ema_period", self.trend_ema_period, 2)?;
        require_min("candle.pressure_window", self.pressure_window, 1)?;
        require_min("candle.extreme_lookback", self.extreme_lookback, 2)?;
        require_min("candle.swing_strength", self.swing_strength, 1)?;
        require_min("candle.compression_window", self.compression_window, 2)?;
        require_positive("candle.bb_k", self.bb_k)?;
        require_positive("candle.keltner_mult", self.keltner_mult)?;
        Ok(())
    }
}

/// Spike heuristics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpikeConfig {
    pub atr_period: usize,
    /// Window for the past-only derived-range z-score.
    pub z_window: usize,
    /// Lookback for highest-high / lowest-low breakouts.
    pub breakout_lookback: usize,
    /// |z| at or above this flags a z-score spike.
    pub z_threshold: f64,
    /// range / ATR at or above this flags an ATR spike.
    pub atr_ratio_threshold: f64,
    /// |gap| / ATR at or above this flags a gap spike.
    pub gap_atr_threshold: f64,
}

impl Default for SpikeConfig {
    fn default() -> Self {
        Self {
            atr_period: 14,
            z_window: 20,
            breakout_lookback: 20,
            z_threshold: 2.0,
            atr_ratio_threshold: 2.0,
            gap_atr_threshold: 1.0,
        }
    }
}

impl SpikeConfig {
    pub fn validate(&self) -> Result<()> {
        require_min("spike.atr_period", self.atr_period, 2)?;
        require_min("spike.z_window", self.z_window, 2)?;
        require_min("spike.breakout_lookback", self.breakout_lookback, 1)?;
        require_positive("spike.z_threshold", self.z_threshold)?;
        require_positive("spike.atr_ratio_threshold", self.atr_ratio_threshold)?;
        require_positive("spike.gap_atr_threshold", self.gap_atr_threshold)?;
        Ok(())
    }
}

/// Hybrid multi-window statistics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HybridConfig {
    /// Lags for multi-scale velocity / acceleration of close.
    pub velocity_lags: Vec<usize>,
    /// Main statistics window (moments, ratios, correlation, liquidity).
    pub window: usize,
    /// Window for efficiency ratio.
    pub er_window: usize,
    /// Window for the R/S Hurst proxy.
    pub hurst_window: usize,
    /// Window for the realized-variance family.
    pub rv_window: usize,
    pub vwap_window: usize,
    /// Window for return autocorrelation / PACF.
    pub acf_window: usize,
    /// Window for median / MAD.
    pub robust_window: usize,
    /// DFT size for the spectral energy ratio (16 or 32).
    pub spectral_n: usize,
    /// Window for Higuchi / Katz fractal dimension.
    pub fractal_window: usize,
    pub higuchi_k_max: usize,
    /// Sub-window length for slope stability (four consecutive sub-windows).
    pub slope_sub_window: usize,
    /// Window for drawdown / run-up.
    pub drawdown_window: usize,
    /// range / mean range below this counts as a tight bar.
    pub tight_range_ratio: f64,
    /// range / mean range above this counts as a wide bar.
    pub wide_range_ratio: f64,
    /// volume / mean volume above this counts as high volume.
    pub high_volume_ratio: f64,
    /// volume / mean volume below this counts as low volume.
    pub low_volume_ratio: f64,
    /// Emit raw-vs-derived divergence features from embedded candle engines.
    pub cross_divergence: bool,
}

impl Default for HybridConfig {
    fn default() -> Self {
        Self {
            velocity_lags: vec![1, 3, 5, 10],
            window: 20,
            er_window: 10,
            hurst_window: 32,
            rv_window: 20,
            vwap_window: 20,
            acf_window: 30,
            robust_window: 20,
            spectral_n: 16,
            fractal_window: 32,
            higuchi_k_max: 5,
            slope_sub_window: 5,
            drawdown_window: 50,
            tight_range_ratio: 0.5,
            wide_range_ratio: 1.5,
            high_volume_ratio: 1.5,
            low_volume_ratio: 0.5,
            cross_divergence: true,
        }
    }
}

impl HybridConfig {
    pub fn validate(&self) -> Result<()> {
        require_windows("hybrid.velocity_lags", &self.velocity_lags, 1)?;
        require_min("hybrid.window", self.window, 4)?;
        require_min("hybrid.er_window", self.er_window, 2)?;
        require_min("hybrid.hurst_window", self.hurst_window, 8)?;
        require_min("hybrid.rv_window", self.rv_window, 2)?;
        require_min("hybrid.vwap_window", self.vwap_window, 1)?;
        require_min("hybrid.acf_window", self.acf_window, 8)?;
        require_min("hybrid.robust_window", self.robust_window, 3)?;
        require_spectral("hybrid.spectral_n", self.spectral_n)?;
        require_min("hybrid.higuchi_k_max", self.higuchi_k_max, 2)?;
        require_min(
            "hybrid.fractal_window",
            self.fractal_window,
            2 * self.higuchi_k_max + 1,
        )?;
        require_min("hybrid.slope_sub_window", self.slope_sub_window, 3)?;
        require_min("hybrid.drawdown_window", self.drawdown_window, 2)?;
        require_positive("hybrid.tight_range_ratio", self.tight_range_ratio)?;
        require_positive("hybrid.wide_range_ratio", self.wide_range_ratio)?;
        if self.wide_range_ratio <= self.tight_range_ratio {
            return Err(Error::config(
                "hybrid.wide_range_ratio must be greater than hybrid.tight_range_ratio",
            ));
        }
        require_positive("hybrid.high_volume_ratio", self.high_volume_ratio)?;
        require_positive("hybrid.low_volume_ratio", self.low_volume_ratio)?;
        if self.high_volume_ratio <= self.low_volume_ratio {
            return Err(Error::config(
                "hybrid.high_volume_ratio must be greater than hybrid.low_volume_ratio",
            ));
        }
        Ok(())
    }
}

/// Tiered spike-feature configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TieredConfig {
    /// Short, medium and long window tiers (strictly increasing).
    pub tiers: [usize; 3],
    pub higuchi_k_max: usize,
}

impl Default for TieredConfig {
    fn default() -> Self {
        Self {
            tiers: [5, 20, 60],
            higuchi_k_max: 5,
        }
    }
}

impl TieredConfig {
    pub fn validate(&self) -> Result<()> {
        let [short, medium, long] = self.tiers;
        require_min("tiered.tiers[0]", short, 4)?;
        require_longer("tiered.tiers[0]", short, "tiered.tiers[1]", medium)?;
        require_longer("tiered.tiers[1]", medium, "tiered.tiers[2]", long)?;
        // Spectral ratios need 32 closes from the long tier
        require_min("tiered.tiers[2]", long, 32)?;
        require_min("tiered.higuchi_k_max", self.higuchi_k_max, 2)?;
        require_min("tiered.tiers[2]", long, 2 * self.higuchi_k_max + 1)?;
        Ok(())
    }
}

/// Offline entry/exit label configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelConfig {
    /// Number of future bars inspected.
    pub horizon: usize,
    /// Minimum forward return for an entry label.
    pub entry_threshold: f64,
    /// Minimum forward drawdown (positive number) for an exit label.
    pub exit_threshold: f64,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            horizon: 5,
            entry_threshold: 0.01,
            exit_threshold: 0.01,
        }
    }
}

impl LabelConfig {
    pub fn validate(&self) -> Result<()> {
        require_min("labels.horizon", self.horizon, 1)?;
        require_positive("labels.entry_threshold", self.entry_threshold)?;
        require_positive("labels.exit_threshold", self.exit_threshold)?;
        Ok(())
    }
}

/// Engine toggles and merge options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub indicators: bool,
    pub raw_candles: bool,
    pub derived_candles: bool,
    pub spike: bool,
    pub hybrid: bool,
    pub tiered: bool,
    /// Append the derived bar's OHLC as `ha_open`, `ha_high`, `ha_low`, `ha_close`.
    pub include_derived_ohlc: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            indicators: true,
            raw_candles: true,
            derived_candles: true,
            spike: true,
            hybrid: true,
            tiered: true,
            include_derived_ohlc: true,
        }
    }
}

//! Streaming, leakage-free bar features for the spikefeat system.
//!
//! This crate handles:
//! - Rolling primitives (ring buffer, mean/variance, extrema, smoothers, OLS)
//! - Window statistics (realized variance, fractal dimension, spectral ratio)
//! - Feature engines behind the `FeatureEngine` trait
//! - The pipeline that merges engine outputs into one row per bar

pub mod numeric;
pub mod ring;
pub mod rolling;
pub mod extrema;
pub mod smoothing;
pub mod regression;
pub mod volatility;
pub mod realized;
pub mod fractal;
pub mod spectral;
pub mod series;
pub mod history;
pub mod engine;
pub mod indicators;
pub mod candle;
pub mod spike;
pub mod hybrid;
pub mod tiered;
pub mod pipeline;

pub use candle::{CandleEngine, CandleSource};
pub use engine::{merge_feature_maps, EngineState, FeatureEngine, FeatureWriter};
pub use extrema::{RollingMax, RollingMin};
pub use history::BarHistory;
pub use hybrid::HybridEngine;
pub use indicators::IndicatorEngine;
pub use pipeline::FeaturePipeline;
pub use regression::{ols_fit, OlsFit, RollingOls};
pub use ring::RingBuffer;
pub use rolling::{RollingStats, RollingSum};
pub use smoothing::{Atr, Macd, MacdValue, Rsi, Smoother, SmoothingKind};
pub use spectral::SpectralWindow;
pub use spike::SpikeEngine;
pub use tiered::TieredSpikeEngine;
pub use volatility::RollingVolatility;

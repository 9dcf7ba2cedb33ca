//! Feature pipeline.
//!
//! Owns the Heikin-Ashi transform and the enabled engines, feeds each bar
//! through all of them and merges their outputs into one row.

use crate::candle::{CandleEngine, CandleSource};
use crate::engine::{merge_feature_maps, FeatureEngine, FeatureWriter};
use crate::hybrid::HybridEngine;
use crate::indicators::IndicatorEngine;
use crate::spike::SpikeEngine;
use crate::tiered::TieredSpikeEngine;
use spikefeat_core::{Bar, Config, Error, FeatureMap, Result, TimestampMs};
use spikefeat_ingestion::HeikinAshi;
use tracing::{info, trace, warn};

/// Streaming feature pipeline over one symbol/timeframe stream.
pub struct FeaturePipeline {
    /// Derived-bar transform.
    transform: HeikinAshi,
    /// Enabled engines, in merge order.
    engines: Vec<Box<dyn FeatureEngine>>,
    /// Append `ha_open` .. `ha_close` to every row.
    include_derived_ohlc: bool,
    /// Timestamp of the last accepted bar.
    last_ts_ms: Option<TimestampMs>,
    /// Row for the last accepted bar.
    features: FeatureMap,
    bars_seen: usize,
}

impl FeaturePipeline {
    /// Build the engines enabled in `config.pipeline`.
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;
        let toggles = &config.pipeline;
        let mut engines: Vec<Box<dyn FeatureEngine>> = Vec::new();
        if toggles.indicators {
            engines.push(Box::new(IndicatorEngine::new(&config.indicators)?));
        }
        if toggles.raw_candles {
            engines.push(Box::new(CandleEngine::new(CandleSource::Raw, &config.candle)?));
        }
        if toggles.derived_candles {
            engines.push(Box::new(CandleEngine::new(
                CandleSource::Derived,
                &config.candle,
            )?));
        }
        if toggles.spike {
            engines.push(Box::new(SpikeEngine::new(&config.spike)?));
        }
        if toggles.hybrid {
            engines.push(Box::new(HybridEngine::new(&config.hybrid, &config.candle)?));
        }
        if toggles.tiered {
            engines.push(Box::new(TieredSpikeEngine::new(&config.tiered)?));
        }
        Ok(Self::from_engines(engines, toggles.include_derived_ohlc))
    }

    /// Build a pipeline over caller-supplied engines.
    pub fn from_engines(engines: Vec<Box<dyn FeatureEngine>>, include_derived_ohlc: bool) -> Self {
        let pipeline = Self {
            transform: HeikinAshi::new(),
            engines,
            include_derived_ohlc,
            last_ts_ms: None,
            features: FeatureMap::new(),
            bars_seen: 0,
        };
        info!(
            engines = ?pipeline.engine_names(),
            warmup = pipeline.warmup_bars(),
            "feature pipeline built"
        );
        pipeline
    }

    /// Process the next bar and return its merged feature row.
    ///
    /// A bar older than the last accepted one is rejected with
    /// `Error::OutOfOrder` and leaves every engine untouched. Equal
    /// timestamps are accepted.
    pub fn update(&mut self, bar: &Bar) -> Result<FeatureMap> {
        let ts_ms = bar.ts_ms();
        if let Some(last_ts_ms) = self.last_ts_ms {
            if ts_ms < last_ts_ms {
                warn!(ts_ms, last_ts_ms, "rejecting out-of-order bar");
                return Err(Error::OutOfOrder { ts_ms, last_ts_ms });
            }
        }

        let derived = self.transform.update(bar);
        for engine in &mut self.engines {
            engine.update(bar, &derived);
        }

        let mut rows: Vec<FeatureMap> = self.engines.iter().map(|e| e.features()).collect();
        if self.include_derived_ohlc {
            let mut out = FeatureWriter::new("ha_");
            out.put("open", derived.open);
            out.put("high", derived.high);
            out.put("low", derived.low);
            out.put("close", derived.close);
            rows.push(out.finish());
        }
        self.features = merge_feature_maps(rows);
        self.last_ts_ms = Some(ts_ms);
        self.bars_seen += 1;

        trace!(
            symbol = %bar.symbol(),
            ts_ms,
            features = self.features.len(),
            warm = self.is_warm(),
            "bar processed"
        );
        Ok(self.features.clone())
    }

    /// Process a sequence of bars, stopping at the first rejected one.
    pub fn process_all<'a, I>(&mut self, bars: I) -> Result<Vec<FeatureMap>>
    where
        I: IntoIterator<Item = &'a Bar>,
    {
        bars.into_iter().map(|bar| self.update(bar)).collect()
    }

    /// Row for the last accepted bar (empty before the first).
    pub fn features(&self) -> FeatureMap {
        self.features.clone()
    }

    /// Discard all state, e.g. on a symbol or session change.
    pub fn reset(&mut self) {
        self.transform.reset();
        for engine in &mut self.engines {
            engine.reset();
        }
        self.last_ts_ms = None;
        self.features.clear();
        self.bars_seen = 0;
    }

    /// Largest warmup among the engines.
    pub fn warmup_bars(&self) -> usize {
        self.engines
            .iter()
            .map(|e| e.warmup_bars())
            .max()
            .unwrap_or(0)
    }

    pub fn is_warm(&self) -> bool {
        self.engines.iter().all(|e| e.is_warm())
    }

    pub fn bars_seen(&self) -> usize {
        self.bars_seen
    }

    pub fn engine_names(&self) -> Vec<&str> {
        self.engines.iter().map(|e| e.name()).collect()
    }

    pub fn engines(&self) -> &[Box<dyn FeatureEngine>] {
        &self.engines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spikefeat_core::config::PipelineConfig;
    use spikefeat_core::Timeframe;

    fn bar(ts_ms: i64, close: f64) -> Bar {
        let tf = Timeframe::from_minutes(1).unwrap();
        Bar::new("ES", tf, ts_ms, close, close + 1.0, close - 1.0, close, 10).unwrap()
    }

    #[test]
    fn test_default_pipeline_has_all_engines() {
        let pipeline = FeaturePipeline::new(&Config::default()).unwrap();
        assert_eq!(
            pipeline.engine_names(),
            vec!["indicators", "raw_candle", "ha_candle", "spike", "hybrid", "tiered"]
        );
        assert_eq!(pipeline.warmup_bars(), 61);
    }

    #[test]
    fn test_toggles() {
        let config = Config {
            pipeline: PipelineConfig {
                indicators: true,
                raw_candles: false,
                derived_candles: false,
                spike: false,
                hybrid: false,
                tiered: false,
                include_derived_ohlc: false,
            },
            ..Default::default()
        };
        let mut pipeline = FeaturePipeline::new(&config).unwrap();
        let row = pipeline.update(&bar(0, 100.0)).unwrap();
        assert!(row.keys().all(|k| k.starts_with("ind_")));
    }

    #[test]
    fn test_out_of_order_leaves_state_untouched() {
        let mut pipeline = FeaturePipeline::new(&Config::default()).unwrap();
        pipeline.update(&bar(120_000, 100.0)).unwrap();
        let before = pipeline.features();

        let err = pipeline.update(&bar(60_000, 101.0)).unwrap_err();
        assert!(matches!(
            err,
            Error::OutOfOrder {
                ts_ms: 60_000,
                last_ts_ms: 120_000
            }
        ));
        assert_eq!(pipeline.bars_seen(), 1);
        assert_eq!(pipeline.features(), before);
        // Equal timestamp is accepted
        assert!(pipeline.update(&bar(120_000, 100.5)).is_ok());
    }

    #[test]
    fn test_derived_ohlc_columns() {
        let mut pipeline = FeaturePipeline::new(&Config::default()).unwrap();
        let row = pipeline.update(&bar(0, 100.0)).unwrap();
        assert_eq!(row["ha_close"], 100.0);
        assert_eq!(row["ha_open"], 100.0);
        assert!(row.contains_key("ha_high"));
        assert!(row.contains_key("ha_low"));
    }
}

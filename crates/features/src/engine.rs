//! Feature engine contract.
//!
//! Every engine consumes one raw bar plus its derived bar per call, in
//! arrival order, and exposes the latest flat feature map. Engines own
//! their rolling state exclusively and never look ahead.

use crate::numeric::{finite_or, flag};
use spikefeat_core::{Bar, DerivedBar, FeatureMap};
use tracing::debug;

/// Lifecycle of an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// No bar seen since construction or the last reset.
    Uninitialized,
    /// Fewer than `warmup_bars` bars seen.
    Seeding,
    /// At least `warmup_bars` bars seen.
    Warm,
}

impl EngineState {
    pub fn from_counts(bars_seen: usize, warmup_bars: usize) -> Self {
        if bars_seen == 0 {
            EngineState::Uninitialized
        } else if bars_seen < warmup_bars {
            EngineState::Seeding
        } else {
            EngineState::Warm
        }
    }
}

/// A streaming, leakage-free feature engine.
pub trait FeatureEngine: Send {
    /// Engine name, also used in logs.
    fn name(&self) -> &str;

    /// Restore every accumulator to its freshly constructed condition.
    fn reset(&mut self);

    /// Consume the next bar and its derived bar.
    fn update(&mut self, bar: &Bar, derived: &DerivedBar);

    /// Features for the most recent bar (empty before the first update).
    fn features(&self) -> FeatureMap;

    /// Bars needed before every feature is backed by a full window.
    fn warmup_bars(&self) -> usize;

    /// Bars consumed since construction or the last reset.
    fn bars_seen(&self) -> usize;

    fn is_warm(&self) -> bool {
        self.bars_seen() >= self.warmup_bars()
    }

    fn state(&self) -> EngineState {
        EngineState::from_counts(self.bars_seen(), self.warmup_bars())
    }
}

/// Bar counter that logs the seeding to warm transition.
#[derive(Debug, Clone)]
pub struct WarmupTracker {
    warmup: usize,
    seen: usize,
}

impl WarmupTracker {
    pub fn new(warmup: usize) -> Self {
        Self { warmup, seen: 0 }
    }

    /// Count one bar for `engine`.
    pub fn tick(&mut self, engine: &str) {
        self.seen += 1;
        if self.seen == self.warmup {
            debug!(engine, warmup = self.warmup, "engine warm");
        }
    }

    pub fn seen(&self) -> usize {
        self.seen
    }

    pub fn warmup(&self) -> usize {
        self.warmup
    }

    pub fn is_warm(&self) -> bool {
        self.seen >= self.warmup
    }

    pub fn reset(&mut self) {
        self.seen = 0;
    }
}

/// Builds a prefixed feature map, replacing non-finite values with 0.
#[derive(Debug)]
pub struct FeatureWriter<'a> {
    prefix: &'a str,
    map: FeatureMap,
}

impl<'a> FeatureWriter<'a> {
    pub fn new(prefix: &'a str) -> Self {
        Self {
            prefix,
            map: FeatureMap::new(),
        }
    }

    pub fn put(&mut self, name: &str, value: f64) {
        self.map
            .insert(format!("{}{}", self.prefix, name), finite_or(value, 0.0));
    }

    /// Boolean as 0/1.
    pub fn put_flag(&mut self, name: &str, value: bool) {
        self.put(name, flag(value));
    }

    /// Copy another map in under this writer's prefix.
    pub fn put_all(&mut self, other: &FeatureMap) {
        for (name, value) in other {
            self.put(name, *value);
        }
    }

    pub fn finish(self) -> FeatureMap {
        self.map
    }
}

/// Merge maps in order; on a key collision the later map wins.
pub fn merge_feature_maps<I>(maps: I) -> FeatureMap
where
    I: IntoIterator<Item = FeatureMap>,
{
    let mut merged = FeatureMap::new();
    for map in maps {
        merged.extend(map);
    }
    merged
}

//! Core data types for the spikefeat system.

use crate::error::{Error, Result};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Timestamp in milliseconds since Unix epoch (UTC).
pub type TimestampMs = i64;

/// Flat feature output of one engine (or of a merged row).
///
/// Keys are unique within an engine and carry the engine prefix.
pub type FeatureMap = BTreeMap<String, f64>;

/// Instrument symbol, normalized to trimmed upper case.
///
/// `" eurusd "` and `"EURUSD"` are the same symbol.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Symbol(String);

impl Symbol {
    /// Create a symbol from any string, normalizing case and whitespace.
    pub fn new(raw: impl AsRef<str>) -> Self {
        Symbol(raw.as_ref().trim().to_uppercase())
    }

    /// The normalized symbol text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Symbol {
    fn from(raw: String) -> Self {
        Symbol::new(raw)
    }
}

impl From<&str> for Symbol {
    fn from(raw: &str) -> Self {
        Symbol::new(raw)
    }
}

impl From<Symbol> for String {
    fn from(symbol: Symbol) -> Self {
        symbol.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Bar timeframe, stored as a whole number of seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Timeframe {
    seconds: u32,
}

impl Timeframe {
    /// Create a timeframe from seconds. Zero is rejected.
    pub fn from_seconds(seconds: u32) -> Result<Self> {
        if seconds == 0 {
            return Err(Error::config("timeframe must be at least one second"));
        }
        Ok(Self { seconds })
    }

    /// Create a timeframe from minutes. Zero is rejected.
    pub fn from_minutes(minutes: u32) -> Result<Self> {
        Self::from_seconds(minutes.saturating_mul(60))
    }

    /// Length of one bar in seconds.
    pub fn seconds(&self) -> u32 {
        self.seconds
    }

    /// Length of one bar in milliseconds.
    pub fn millis(&self) -> i64 {
        self.seconds as i64 * 1_000
    }
}

impl FromStr for Timeframe {
    type Err = Error;

    /// Parse `"30s"`, `"1m"`, `"15m"`, `"4h"`, `"1d"` (a bare number means minutes).
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim().to_lowercase();
        let split = s
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(s.len());
        let (digits, unit) = s.split_at(split);
        let count: u32 = digits
            .parse()
            .map_err(|_| Error::config(format!("invalid timeframe '{s}'")))?;
        let multiplier = match unit {
            "s" => 1,
            "" | "m" | "min" => 60,
            "h" => 3_600,
            "d" => 86_400,
            _ => return Err(Error::config(format!("invalid timeframe unit in '{s}'"))),
        };
        Self::from_seconds(count.saturating_mul(multiplier))
    }
}

impl TryFrom<String> for Timeframe {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Timeframe> for String {
    fn from(tf: Timeframe) -> Self {
        tf.to_string()
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.seconds;
        if s % 86_400 == 0 {
            write!(f, "{}d", s / 86_400)
        } else if s % 3_600 == 0 {
            write!(f, "{}h", s / 3_600)
        } else if s % 60 == 0 {
            write!(f, "{}m", s / 60)
        } else {
            write!(f, "{s}s")
        }
    }
}

/// Unvalidated bar fields as they arrive from a feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawBar {
    pub symbol: String,
    pub timeframe: Timeframe,
    /// Bar open time in milliseconds (UTC).
    pub ts_ms: TimestampMs,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

/// Result of sanitized bar construction.
#[derive(Debug, Clone)]
pub struct Sanitized {
    pub bar: Bar,
    /// True if Open or Close had to be clamped into `[Low, High]`.
    pub clamped: bool,
}

impl RawBar {
    /// Build a bar, clamping Open/Close into `[Low, High]`.
    ///
    /// Non-finite or negative prices and `High < Low` are still rejected.
    pub fn sanitize(self) -> Result<Sanitized> {
        self.check_fields()?;
        let open = self.open.clamp(self.low, self.high);
        let close = self.close.clamp(self.low, self.high);
        let clamped = open != self.open || close != self.close;
        let bar = Bar {
            ts: timestamp_from_ms(self.ts_ms)?,
            symbol: Symbol::new(&self.symbol),
            timeframe: self.timeframe,
            open,
            high: self.high,
            low: self.low,
            close,
            volume: self.volume,
        };
        Ok(Sanitized { bar, clamped })
    }

    /// Field-level checks shared by strict and sanitized construction.
    fn check_fields(&self) -> Result<()> {
        if Symbol::new(&self.symbol).as_str().is_empty() {
            return Err(Error::invalid_bar("empty symbol"));
        }
        for (name, value) in [
            ("open", self.open),
            ("high", self.high),
            ("low", self.low),
            ("close", self.close),
        ] {
            if !value.is_finite() {
                return Err(Error::invalid_bar(format!("{name} is not finite ({value})")));
            }
            if value < 0.0 {
                return Err(Error::invalid_bar(format!("{name} is negative ({value})")));
            }
        }
        if self.high < self.low {
            return Err(Error::invalid_bar(format!(
                "high {} is below low {}",
                self.high, self.low
            )));
        }
        Ok(())
    }
}

fn timestamp_from_ms(ts_ms: TimestampMs) -> Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ts_ms)
        .single()
        .ok_or_else(|| Error::invalid_bar(format!("timestamp {ts_ms} out of range")))
}

/// Validated, immutable OHLCV bar.
///
/// Invariants: all prices finite and >= 0, `low <= open, close <= high`.
/// Identity is (symbol, timeframe, timestamp); ordering is by timestamp.
#[derive(Debug, Clone, Serialize)]
pub struct Bar {
    symbol: Symbol,
    timeframe: Timeframe,
    ts: DateTime<Utc>,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: u64,
}

impl TryFrom<RawBar> for Bar {
    type Error = Error;

    fn try_from(raw: RawBar) -> Result<Self> {
        raw.check_fields()?;
        if raw.open < raw.low || raw.open > raw.high {
            return Err(Error::invalid_bar(format!(
                "open {} outside [{}, {}]",
                raw.open, raw.low, raw.high
            )));
        }
        if raw.close < raw.low || raw.close > raw.high {
            return Err(Error::invalid_bar(format!(
                "close {} outside [{}, {}]",
                raw.close, raw.low, raw.high
            )));
        }
        Ok(Bar {
            ts: timestamp_from_ms(raw.ts_ms)?,
            symbol: Symbol::new(&raw.symbol),
            timeframe: raw.timeframe,
            open: raw.open,
            high: raw.high,
            low: raw.low,
            close: raw.close,
            volume: raw.volume,
        })
    }
}

impl Bar {
    /// Strictly validated construction from individual fields.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        symbol: impl Into<String>,
        timeframe: Timeframe,
        ts_ms: TimestampMs,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: u64,
    ) -> Result<Self> {
        Bar::try_from(RawBar {
            symbol: symbol.into(),
            timeframe,
            ts_ms,
            open,
            high,
            low,
            close,
            volume,
        })
    }

    #[inline]
    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    #[inline]
    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    #[inline]
    pub fn ts(&self) -> DateTime<Utc> {
        self.ts
    }

    #[inline]
    pub fn ts_ms(&self) -> TimestampMs {
        self.ts.timestamp_millis()
    }

    #[inline]
    pub fn open(&self) -> f64 {
        self.open
    }

    #[inline]
    pub fn high(&self) -> f64 {
        self.high
    }

    #[inline]
    pub fn low(&self) -> f64 {
        self.low
    }

    #[inline]
    pub fn close(&self) -> f64 {
        self.close
    }

    #[inline]
    pub fn volume(&self) -> u64 {
        self.volume
    }

    /// High minus low.
    #[inline]
    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    /// Average of the four prices.
    #[inline]
    pub fn ohlc4(&self) -> f64 {
        (self.open + self.high + self.low + self.close) / 4.0
    }

    /// Typical price (H + L + C) / 3.
    #[inline]
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }

    /// Back to the raw record form.
    pub fn to_raw(&self) -> RawBar {
        RawBar {
            symbol: self.symbol.to_string(),
            timeframe: self.timeframe,
            ts_ms: self.ts_ms(),
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
        }
    }
}

impl PartialEq for Bar {
    fn eq(&self, other: &Self) -> bool {
        self.ts == other.ts && self.symbol == other.symbol && self.timeframe == other.timeframe
    }
}

impl Eq for Bar {}

impl Hash for Bar {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.symbol.hash(state);
        self.timeframe.hash(state);
        self.ts.hash(state);
    }
}

impl PartialOrd for Bar {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Bar {
    fn cmp(&self, other: &Self) -> Ordering {
        self.ts
            .cmp(&other.ts)
            .then_with(|| self.symbol.cmp(&other.symbol))
            .then_with(|| self.timeframe.cmp(&other.timeframe))
    }
}

/// Smoothed (Heikin-Ashi) candle derived from a raw bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DerivedBar {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl DerivedBar {
    #[inline]
    pub fn range(&self) -> f64 {
        self.high - self.low
    }
}

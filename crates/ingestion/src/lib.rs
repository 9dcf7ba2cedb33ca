//! Bar ingestion and normalization for the spikefeat system.
//!
//! This crate handles:
//! - Bar validation (strict or clamping) with quality statistics
//! - The Heikin-Ashi derived-bar transform
//! - In-memory feeds (sort + keep-last de-duplication)

pub mod feed;
pub mod heikin_ashi;
pub mod validator;

pub use feed::BarFeed;
pub use heikin_ashi::{heikin_ashi_series, HeikinAshi};
pub use validator::{BarValidator, ValidationMode, ValidationStats};

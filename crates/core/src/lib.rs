//! Core types and configuration for the spikefeat system.
//!
//! This crate provides shared types used across all other crates:
//! - Market data types (raw and validated bars, derived bars)
//! - Configuration structures for every feature engine
//! - Common error types

pub mod config;
pub mod error;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use types::*;

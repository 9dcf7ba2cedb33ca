//! Offline training targets for the spikefeat system.
//!
//! Labels use future bars by construction and are kept out of the
//! streaming feature engines.

pub mod labeler;

pub use labeler::{EntryExitLabel, EntryExitLabeler};

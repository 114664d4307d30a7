//! Spread detection engine.
//!
//! This crate contains the aggregation step that turns a registry snapshot
//! into a spread, and the run loop that drives feeds, aggregation and
//! notifications for one pair.

pub mod aggregator;
pub mod error;
pub mod monitor;

pub use aggregator::*;
pub use error::*;
pub use monitor::*;

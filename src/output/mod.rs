//! Output module for reporting harvest results
//!
//! This module handles:
//! - Aggregating per-kind and per-status counts from the store
//! - Printing the statistics report for the `stats` subcommand

pub mod stats;

pub use stats::{load_statistics, print_statistics, HarvestStatistics};

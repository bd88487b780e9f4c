//! Target lifecycle state definitions
//!
//! This module defines the status a crawl target moves through and the
//! two kinds of crawlable work the engine knows about.

mod target_state;

pub use target_state::{TargetKind, TargetStatus};

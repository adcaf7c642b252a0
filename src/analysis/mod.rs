//! Analysis module for flushed windows
//!
//! This module provides per-channel summary statistics (count, mean,
//! standard deviation, min, max) for a window of samples.

pub mod summary;

pub use summary::{summarize, ChannelSummary, RunningStats};

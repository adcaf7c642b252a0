//! Per-channel window statistics

use crate::types::{ChannelSet, Sample};
use serde::{Deserialize, Serialize};

/// Running statistics using Welford's online algorithm
///
/// O(1) per update; variance stays numerically stable for long windows.
#[derive(Debug, Clone, Copy)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl Default for RunningStats {
    fn default() -> Self {
        Self::new()
    }
}

impl RunningStats {
    pub fn new() -> Self {
        Self {
            count: 0,
            mean: 0.0,
            m2: 0.0,
            min: f64::MAX,
            max: f64::MIN,
        }
    }

    #[inline]
    pub fn push(&mut self, value: f64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample standard deviation (n - 1); zero below two values
    pub fn std_dev(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            (self.m2 / (self.count - 1) as f64).sqrt()
        }
    }

    pub fn min(&self) -> Option<f64> {
        (self.count > 0).then_some(self.min)
    }

    pub fn max(&self) -> Option<f64> {
        (self.count > 0).then_some(self.max)
    }
}

/// Summary row for one channel of a window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelSummary {
    pub channel: String,
    pub count: u64,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

impl ChannelSummary {
    fn from_stats(channel: &str, stats: &RunningStats) -> Self {
        Self {
            channel: channel.to_string(),
            count: stats.count(),
            mean: stats.mean(),
            std: stats.std_dev(),
            min: stats.min().unwrap_or(0.0),
            max: stats.max().unwrap_or(0.0),
        }
    }
}

/// Summarize every channel of `samples`; non-finite values are ignored
pub fn summarize(channels: &ChannelSet, samples: &[Sample]) -> Vec<ChannelSummary> {
    let mut stats = vec![RunningStats::new(); channels.len()];
    for sample in samples {
        for (acc, value) in stats.iter_mut().zip(sample.values()) {
            if value.is_finite() {
                acc.push(*value);
            }
        }
    }
    channels
        .names()
        .iter()
        .zip(&stats)
        .map(|(name, s)| ChannelSummary::from_stats(name, s))
        .collect()
}

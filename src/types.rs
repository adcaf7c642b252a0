//! Core data types for motionvis-rs
//!
//! This module contains the fundamental data structures shared by the
//! streaming core, the sources and the sinks.

use crate::error::{MotionVisError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Ordered set of channel names, fixed for the lifetime of a stream
///
/// Clones share the same backing storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSet {
    names: Arc<[String]>,
}

impl ChannelSet {
    /// Create a channel set from names
    ///
    /// Fails if the list is empty or contains duplicates (compared
    /// case-insensitively).
    pub fn new<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.is_empty() {
            return Err(MotionVisError::Config(
                "channel set must contain at least one channel".to_string(),
            ));
        }
        for (i, name) in names.iter().enumerate() {
            if name.trim().is_empty() {
                return Err(MotionVisError::Config(format!(
                    "channel {} has an empty name",
                    i
                )));
            }
            if names[..i].iter().any(|n| n.eq_ignore_ascii_case(name)) {
                return Err(MotionVisError::Config(format!(
                    "duplicate channel name '{}'",
                    name
                )));
            }
        }
        Ok(Self {
            names: names.into(),
        })
    }

    /// The three accelerometer/gyroscope axes
    pub fn xyz() -> Self {
        Self {
            names: vec!["X".to_string(), "Y".to_string(), "Z".to_string()].into(),
        }
    }

    /// Number of channels
    #[inline]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Always false for a constructed set; provided for API symmetry
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Channel names in order
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Name of the channel at `index`
    pub fn name(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    /// Resolve a channel name (case-insensitive) to its index
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n.eq_ignore_ascii_case(name))
    }

    /// Check that a value slice matches the channel arity
    #[inline]
    pub fn check_arity(&self, actual: usize) -> Result<()> {
        if actual != self.names.len() {
            return Err(MotionVisError::Arity {
                expected: self.names.len(),
                actual,
            });
        }
        Ok(())
    }
}

/// One timestamped multi-channel reading
///
/// `timestamp` is an offset from the owning stream's [`StreamClock`] epoch.
/// Values are matched positionally against the stream's [`ChannelSet`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    timestamp: Duration,
    values: Vec<f64>,
}

impl Sample {
    /// Create a new sample
    pub fn new(timestamp: Duration, values: impl Into<Vec<f64>>) -> Self {
        Self {
            timestamp,
            values: values.into(),
        }
    }

    /// Time offset from the stream epoch
    #[inline]
    pub fn timestamp(&self) -> Duration {
        self.timestamp
    }

    /// Channel values in channel order
    #[inline]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Number of channel values
    #[inline]
    pub fn arity(&self) -> usize {
        self.values.len()
    }

    /// Value of a single channel
    #[inline]
    pub fn value(&self, channel: usize) -> Option<f64> {
        self.values.get(channel).copied()
    }
}

/// Why a window was flushed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlushReason {
    /// Explicit request (button, keyboard, shutdown)
    Manual,
    /// Elapsed time since the window opened exceeded the window duration
    Timer,
    /// The window reached the configured maximum sample count
    Size,
}

impl FlushReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlushReason::Manual => "manual",
            FlushReason::Timer => "timer",
            FlushReason::Size => "size",
        }
    }
}

impl fmt::Display for FlushReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Samples collected between two flush points
#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    /// When the first sample of this window arrived
    pub started: Instant,
    /// Samples in arrival order
    pub samples: Vec<Sample>,
}

impl Window {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Time between the window opening and `now`
    pub fn age_at(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.started)
    }
}

/// A window handed to a sink, with everything the sink needs to name and
/// render its artifacts
#[derive(Debug, Clone)]
pub struct FlushedWindow {
    pub reason: FlushReason,
    pub channels: ChannelSet,
    pub window: Window,
    /// Wall-clock time of the stream epoch, for absolute timestamps
    pub epoch: chrono::DateTime<chrono::Local>,
    /// Wall-clock time of the flush
    pub flushed_at: chrono::DateTime<chrono::Local>,
}

impl FlushedWindow {
    pub fn samples(&self) -> &[Sample] {
        &self.window.samples
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    /// Absolute wall-clock time of a sample
    pub fn wall_time(&self, sample: &Sample) -> chrono::DateTime<chrono::Local> {
        self.epoch
            + chrono::Duration::from_std(sample.timestamp()).unwrap_or(chrono::Duration::zero())
    }
}

/// Stream epoch: a monotonic start instant paired with its wall-clock time
#[derive(Debug, Clone, Copy)]
pub struct StreamClock {
    start: Instant,
    wall_start: chrono::DateTime<chrono::Local>,
}

impl Default for StreamClock {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamClock {
    /// Start a new clock at the current instant
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            wall_start: chrono::Local::now(),
        }
    }

    /// Time since the epoch, suitable as a sample timestamp
    #[inline]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn start(&self) -> Instant {
        self.start
    }

    pub fn wall_start(&self) -> chrono::DateTime<chrono::Local> {
        self.wall_start
    }

    /// Stamp a value vector with the current elapsed time
    pub fn stamp(&self, values: impl Into<Vec<f64>>) -> Sample {
        Sample::new(self.elapsed(), values)
    }
}

/// Format a wall-clock time as ISO-8601 with millisecond precision
pub fn iso_millis(time: &chrono::DateTime<chrono::Local>) -> String {
    time.format("%Y-%m-%dT%H:%M:%S%.3f").to_string()
}

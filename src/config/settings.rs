//! Configuration sections
//!
//! Each section maps to a TOML table of the same name. Every field has a
//! default, so partial files are fine.

use crate::error::{MotionVisError, Result};
use crate::stream::FlushSettings;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Channel layout of the stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamSettings {
    /// Ordered channel names
    pub channels: Vec<String>,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            channels: vec!["X".into(), "Y".into(), "Z".into()],
        }
    }
}

/// Live render cadence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    /// Target sliding window length per channel
    pub window_points: usize,
    /// Maximum samples dispatched per tick
    pub max_step: usize,
    /// Tick period in milliseconds
    pub tick_ms: u64,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            window_points: 800,
            max_step: 20,
            tick_ms: 120,
        }
    }
}

impl RenderSettings {
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

/// Window flush policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlushConfig {
    pub window_secs: f64,
    pub min_samples: usize,
    /// Poll interval in milliseconds
    pub poll_ms: u64,
    /// Size-triggered flush threshold; 0 disables it
    pub max_samples: usize,
    /// Attempt a final flush on shutdown
    pub on_shutdown: bool,
}

impl Default for FlushConfig {
    fn default() -> Self {
        Self {
            window_secs: 10.0,
            min_samples: 15,
            poll_ms: 1000,
            max_samples: 0,
            on_shutdown: true,
        }
    }
}

impl FlushConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_ms)
    }

    /// Window length as a timer duration
    pub fn window_duration(&self) -> Result<Duration> {
        timer_duration(self.window_secs).ok_or_else(|| {
            MotionVisError::Config(format!(
                "flush.window_secs must be a positive duration, got {}",
                self.window_secs
            ))
        })
    }

    pub fn to_settings(&self) -> Result<FlushSettings> {
        Ok(FlushSettings {
            window_duration: self.window_duration()?,
            min_samples: self.min_samples,
            max_samples: (self.max_samples > 0).then_some(self.max_samples),
        })
    }
}

/// Seconds as a non-zero `Duration`, or `None` when the value is negative,
/// not finite, too large, or rounds down to zero.
pub(crate) fn timer_duration(secs: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(secs)
        .ok()
        .filter(|d| !d.is_zero())
}

/// Which sinks receive flushed windows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Csv,
    Jsonl,
    Both,
}

impl OutputFormat {
    pub fn writes_csv(&self) -> bool {
        matches!(self, OutputFormat::Csv | OutputFormat::Both)
    }

    pub fn writes_jsonl(&self) -> bool {
        matches!(self, OutputFormat::Jsonl | OutputFormat::Both)
    }
}

/// Where flushed windows are written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    pub dir: PathBuf,
    pub format: OutputFormat,
    /// File name prefix for CSV windows
    pub prefix: String,
    /// Maintain `annotations.csv` next to the CSV windows
    pub annotations: bool,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data"),
            format: OutputFormat::Csv,
            prefix: String::new(),
            annotations: true,
        }
    }
}

/// Kind of sample source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    #[default]
    Mock,
    Lines,
    Json,
}

impl std::str::FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mock" => Ok(SourceKind::Mock),
            "lines" | "csv" | "serial" => Ok(SourceKind::Lines),
            "json" | "jsonl" | "mqtt" => Ok(SourceKind::Json),
            other => Err(format!("unknown source kind '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSettings {
    pub kind: SourceKind,
    /// Input file; empty reads stdin
    pub path: PathBuf,
    /// Mock source rate
    pub rate_hz: f64,
    /// Lines carry a leading device timestamp column
    pub timestamp_column: bool,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            kind: SourceKind::Mock,
            path: PathBuf::new(),
            rate_hz: 50.0,
            timestamp_column: false,
        }
    }
}

impl SourceSettings {
    /// Whether the source reads stdin
    pub fn reads_stdin(&self) -> bool {
        self.kind != SourceKind::Mock && self.path.as_os_str().is_empty()
    }

    /// Mock sample period derived from `rate_hz`
    pub fn sample_period(&self) -> Result<Duration> {
        timer_duration(1.0 / self.rate_hz).ok_or_else(|| {
            MotionVisError::Config(format!(
                "source.rate_hz must give a positive sample period, got {} Hz",
                self.rate_hz
            ))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub filter: String,
    /// Directory for a daily rolling log file; empty disables it
    pub file: PathBuf,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: "info,motionvis_rs=debug".into(),
            file: PathBuf::new(),
        }
    }
}

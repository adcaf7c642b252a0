//! JsonWindowSink: one JSON document per window, appended to a JSON Lines file.

use super::{Sink, SinkReport};
use crate::analysis::{summarize, ChannelSummary};
use crate::error::{Result, ResultExt};
use crate::types::{iso_millis, FlushReason, FlushedWindow};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub const DEFAULT_JSONL_FILE: &str = "windows.jsonl";

/// Serialized form of one flushed window
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WindowDocument {
    pub reason: FlushReason,
    pub flushed_at: String,
    pub channels: Vec<String>,
    pub samples: Vec<SampleDocument>,
    pub summary: Vec<ChannelSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SampleDocument {
    pub ts_iso: String,
    /// Seconds since the stream epoch
    pub t: f64,
    pub values: Vec<f64>,
}

impl WindowDocument {
    pub fn from_window(window: &FlushedWindow) -> Self {
        Self {
            reason: window.reason,
            flushed_at: iso_millis(&window.flushed_at),
            channels: window.channels.names().to_vec(),
            samples: window
                .samples()
                .iter()
                .map(|s| SampleDocument {
                    ts_iso: iso_millis(&window.wall_time(s)),
                    t: s.timestamp().as_secs_f64(),
                    values: s.values().to_vec(),
                })
                .collect(),
            summary: summarize(&window.channels, window.samples()),
        }
    }
}

pub struct JsonWindowSink {
    path: PathBuf,
}

impl JsonWindowSink {
    /// Append to `windows.jsonl` inside `dir`
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(dir.as_ref().join(DEFAULT_JSONL_FILE))
    }

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Sink for JsonWindowSink {
    fn name(&self) -> &'static str {
        "JsonWindowSink"
    }

    fn deliver(&mut self, window: &FlushedWindow) -> Result<SinkReport> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let document = WindowDocument::from_window(window);
        let line = serde_json::to_string(&document)?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open {}", self.path.display()))?;
        let mut writer = BufWriter::new(file);
        writeln!(writer, "{}", line)?;
        writer.flush()?;

        tracing::debug!(
            "Appended {} window ({} samples) to {}",
            window.reason,
            window.len(),
            self.path.display()
        );
        Ok(SinkReport::rows(window.len()).with_artifact(self.path.clone()))
    }
}

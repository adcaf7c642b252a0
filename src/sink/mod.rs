//! Window sinks: durable destinations for flushed windows.
//!
//! A sink receives each flushed window exactly once. Delivery is
//! fire-and-forget from the flush controller's point of view: a failure is
//! reported and logged, but the window is not re-buffered.
//!
//! # Built-in sinks
//!
//! - [`CsvWindowSink`] - one sequence-numbered CSV file per window, plus an
//!   `annotations.csv` index for later labelling
//! - [`JsonWindowSink`] - one JSON document per window appended to a
//!   `.jsonl` file
//! - [`MultiSink`] - fan a window out to several sinks

pub mod csv;
pub mod json;

pub use self::csv::CsvWindowSink;
pub use self::json::JsonWindowSink;

use crate::error::{MotionVisError, Result};
use crate::types::FlushedWindow;
use std::fmt;
use std::path::PathBuf;

/// What a sink produced for one window
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SinkReport {
    /// Files written or appended to
    pub artifacts: Vec<PathBuf>,
    /// Rows persisted
    pub rows: usize,
}

impl SinkReport {
    /// Report without file artifacts
    pub fn rows(rows: usize) -> Self {
        Self {
            artifacts: Vec::new(),
            rows,
        }
    }

    pub fn with_artifact(mut self, path: impl Into<PathBuf>) -> Self {
        self.artifacts.push(path.into());
        self
    }

    fn merge(&mut self, other: SinkReport) {
        self.artifacts.extend(other.artifacts);
        self.rows = self.rows.max(other.rows);
    }
}

impl fmt::Display for SinkReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.artifacts.is_empty() {
            return write!(f, "{} rows", self.rows);
        }
        let names: Vec<String> = self
            .artifacts
            .iter()
            .map(|p| {
                p.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| p.display().to_string())
            })
            .collect();
        write!(f, "{}", names.join(", "))
    }
}

/// Destination for flushed windows
#[cfg_attr(test, mockall::automock)]
pub trait Sink: Send {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Persist one window
    fn deliver(&mut self, window: &FlushedWindow) -> Result<SinkReport>;
}

/// Delivers each window to every inner sink in order.
///
/// Every sink is attempted even if an earlier one fails; the delivery
/// fails if any inner sink failed.
#[derive(Default)]
pub struct MultiSink {
    sinks: Vec<Box<dyn Sink>>,
}

impl MultiSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: impl Sink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    pub fn push(&mut self, sink: Box<dyn Sink>) {
        self.sinks.push(sink);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl Sink for MultiSink {
    fn name(&self) -> &'static str {
        "MultiSink"
    }

    fn deliver(&mut self, window: &FlushedWindow) -> Result<SinkReport> {
        let mut report = SinkReport::default();
        let mut failures = Vec::new();

        for sink in &mut self.sinks {
            match sink.deliver(window) {
                Ok(r) => report.merge(r),
                Err(e) => {
                    tracing::warn!("{} failed to persist window: {}", sink.name(), e);
                    failures.push(format!("{}: {}", sink.name(), e));
                }
            }
        }

        if failures.is_empty() {
            Ok(report)
        } else {
            Err(MotionVisError::Sink(failures.join("; ")))
        }
    }
}

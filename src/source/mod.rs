//! Sample sources: producers that feed a [`StreamIngest`].
//!
//! Each source runs on its own thread and pushes samples as they arrive.
//! Sources never see the render or flush sides of the stream.
//!
//! - [`MockSource`] - synthetic waveforms at a fixed rate
//! - [`LineSource`] - comma-separated text lines (serial capture, files, stdin)
//! - [`JsonSource`] - JSON messages, whole-sample or one channel at a time

pub mod json;
pub mod lines;
pub mod mock;

pub use json::JsonSource;
pub use lines::LineSource;
pub use mock::{MockChannel, MockPattern, MockSource};

use crate::config::{SourceKind, SourceSettings};
use crate::error::{Result, ResultExt};
use crate::stream::StreamIngest;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::sync::atomic::AtomicBool;

/// Counters reported by a source when it stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceStats {
    /// Samples pushed into the stream
    pub produced: u64,
    /// Inputs that could not be turned into a sample
    pub malformed: u64,
}

impl fmt::Display for SourceStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} samples, {} malformed", self.produced, self.malformed)
    }
}

/// A producer of samples.
pub trait SampleSource: Send {
    fn name(&self) -> &'static str;

    /// Push samples into `ingest` until the input ends or `running` is
    /// cleared.
    ///
    /// Sources that block on input (stdin, a serial port) only notice
    /// `running` between reads.
    fn run(self: Box<Self>, ingest: &StreamIngest, running: &AtomicBool) -> Result<SourceStats>;
}

/// Build the source described by `settings` for a stream of `channel_count`
/// channels. Line and JSON sources read `settings.path`, or stdin when it is
/// empty.
pub fn from_settings(
    settings: &SourceSettings,
    channel_count: usize,
) -> Result<Box<dyn SampleSource>> {
    if settings.kind == SourceKind::Mock {
        return Ok(Box::new(MockSource::for_channels(channel_count, settings.rate_hz)));
    }

    let reader: Box<dyn BufRead + Send> = if settings.reads_stdin() {
        Box::new(BufReader::new(std::io::stdin()))
    } else {
        let file = File::open(&settings.path)
            .with_context(|| format!("Failed to open input {:?}", settings.path))?;
        Box::new(BufReader::new(file))
    };

    let source: Box<dyn SampleSource> = match settings.kind {
        SourceKind::Json => Box::new(JsonSource::new(reader)),
        _ => Box::new(LineSource::new(reader).with_timestamp_column(settings.timestamp_column)),
    };
    Ok(source)
}

/// Parse a numeric field, tolerating surrounding whitespace.
pub(crate) fn parse_field(field: &str) -> Option<f64> {
    let value: f64 = field.trim().parse().ok()?;
    value.is_finite().then_some(value)
}

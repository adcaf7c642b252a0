//! Comma-separated line source.
//!
//! Accepts `v1,...,vn` lines, or `ts,v1,...,vn` when the device prefixes a
//! timestamp column. Blank lines, `#` comments and header lines (no digits
//! at all) are ignored. Anything else that does not parse is counted as
//! malformed and skipped.

use super::{parse_field, SampleSource, SourceStats};
use crate::error::{MotionVisError, Result, ResultExt};
use crate::stream::StreamIngest;
use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Malformed lines logged at warn level before dropping to debug.
const MALFORMED_WARN_LIMIT: u64 = 5;

/// One successfully parsed line
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedLine {
    /// Device timestamp in seconds, when a timestamp column is present
    pub device_time: Option<f64>,
    pub values: Vec<f64>,
}

/// Parse one line into `arity` channel values.
///
/// Returns `Ok(None)` for lines that carry no data.
pub fn parse_line(line: &str, arity: usize, timestamp_column: bool) -> Result<Option<ParsedLine>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') || !line.bytes().any(|b| b.is_ascii_digit()) {
        return Ok(None);
    }

    let fields: Vec<&str> = line.split(',').collect();
    let expected = arity + usize::from(timestamp_column);
    if fields.len() != expected {
        return Err(MotionVisError::Parse(format!(
            "expected {} fields, got {}: {:?}",
            expected,
            fields.len(),
            line
        )));
    }

    let numbers = fields
        .iter()
        .map(|f| {
            parse_field(f)
                .ok_or_else(|| MotionVisError::Parse(format!("bad number {:?}", f.trim())))
        })
        .collect::<Result<Vec<f64>>>()?;

    Ok(Some(if timestamp_column {
        ParsedLine {
            device_time: numbers.first().copied(),
            values: numbers[1..].to_vec(),
        }
    } else {
        ParsedLine {
            device_time: None,
            values: numbers,
        }
    }))
}

/// Maps device timestamps onto the stream clock.
///
/// The first device time is anchored at its arrival offset; later samples
/// keep the device's spacing. Stamps never go backwards. A device time too
/// far from the anchor to fit in a `Duration` is an error.
#[derive(Debug, Default)]
struct DeviceTimeline {
    anchor: Option<(f64, Duration)>,
    last: Duration,
}

impl DeviceTimeline {
    fn stamp(&mut self, device_time: f64, arrival: Duration) -> Result<Duration> {
        let (device0, arrival0) = *self.anchor.get_or_insert((device_time, arrival));
        let delta = device_time - device0;
        let offset = if delta > 0.0 {
            Duration::try_from_secs_f64(delta)
                .ok()
                .and_then(|d| arrival0.checked_add(d))
                .ok_or_else(|| {
                    MotionVisError::Parse(format!("device timestamp {} out of range", device_time))
                })?
        } else {
            arrival0
        };
        self.last = self.last.max(offset);
        Ok(self.last)
    }
}

/// Reads samples from any buffered reader (serial capture, file, stdin).
pub struct LineSource<R> {
    reader: R,
    timestamp_column: bool,
}

impl<R: BufRead + Send> LineSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            timestamp_column: false,
        }
    }

    /// Treat the first column as a device timestamp in seconds
    pub fn with_timestamp_column(mut self, enabled: bool) -> Self {
        self.timestamp_column = enabled;
        self
    }
}

impl<R: BufRead + Send> SampleSource for LineSource<R> {
    fn name(&self) -> &'static str {
        "LineSource"
    }

    fn run(
        mut self: Box<Self>,
        ingest: &StreamIngest,
        running: &AtomicBool,
    ) -> Result<SourceStats> {
        let arity = ingest.channels().len();
        let mut stats = SourceStats::default();
        let mut timeline = DeviceTimeline::default();
        let mut line = String::new();
        tracing::info!(
            "Line source started ({} channels, timestamp column: {})",
            arity,
            self.timestamp_column
        );

        while running.load(Ordering::Relaxed) {
            line.clear();
            let read = self
                .reader
                .read_line(&mut line)
                .context("Failed to read sample line")?;
            if read == 0 {
                tracing::debug!("Line source reached end of input");
                break;
            }

            let stamped = parse_line(&line, arity, self.timestamp_column).and_then(|parsed| {
                parsed
                    .map(|parsed| -> Result<(Duration, Vec<f64>)> {
                        let arrival = ingest.clock().elapsed();
                        let timestamp = match parsed.device_time {
                            Some(device_time) => timeline.stamp(device_time, arrival)?,
                            None => arrival,
                        };
                        Ok((timestamp, parsed.values))
                    })
                    .transpose()
            });

            match stamped {
                Ok(None) => {}
                Ok(Some((timestamp, values))) => {
                    ingest.push_at(timestamp, values)?;
                    stats.produced += 1;
                }
                Err(e) => {
                    stats.malformed += 1;
                    if stats.malformed <= MALFORMED_WARN_LIMIT {
                        tracing::warn!("Skipping malformed line: {}", e);
                    } else {
                        tracing::debug!("Skipping malformed line: {}", e);
                    }
                }
            }
        }

        tracing::info!("Line source stopped: {}", stats);
        Ok(stats)
    }
}

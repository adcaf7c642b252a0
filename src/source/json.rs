//! JSON message source (one message per line, as relayed from a broker).
//!
//! Two message shapes are understood:
//!
//! - a full sample, with one key per channel: `{"x": 0.1, "y": 0.2, "z": 9.8}`
//! - a single channel update: `{"channel": "x", "value": 0.1}`; these go
//!   through a [`ChannelAssembler`] and become a sample once every channel
//!   has reported
//!
//! Keys match channel names case-insensitively. Numeric strings are
//! accepted as values.

use super::{parse_field, SampleSource, SourceStats};
use crate::error::{MotionVisError, Result, ResultExt};
use crate::stream::{ChannelAssembler, StreamIngest};
use crate::types::ChannelSet;
use serde_json::{Map, Value};
use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};

const CHANNEL_KEYS: [&str; 3] = ["channel", "name", "variable"];

/// What a single message contributed
#[derive(Debug, Clone, PartialEq)]
pub enum JsonMessage {
    /// Every channel present
    Sample(Vec<f64>),
    /// One channel's value
    Channel { index: usize, value: f64 },
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => parse_field(s),
        _ => None,
    }
}

fn lookup<'a>(object: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    object
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| v)
}

/// Interpret one decoded JSON message against `channels`.
pub fn parse_message(message: &Value, channels: &ChannelSet) -> Result<JsonMessage> {
    let object = message
        .as_object()
        .ok_or_else(|| MotionVisError::Parse("message is not a JSON object".into()))?;

    let full: Option<Vec<f64>> = channels
        .names()
        .iter()
        .map(|name| lookup(object, name).and_then(number))
        .collect();
    if let Some(values) = full {
        return Ok(JsonMessage::Sample(values));
    }

    let name = CHANNEL_KEYS
        .iter()
        .find_map(|key| lookup(object, key))
        .and_then(Value::as_str)
        .ok_or_else(|| {
            MotionVisError::Parse(format!(
                "message has neither all channels nor a channel key: {}",
                message
            ))
        })?;
    let index = channels
        .index_of(name)
        .ok_or_else(|| MotionVisError::UnknownChannel(name.to_string()))?;
    let value = lookup(object, "value")
        .and_then(number)
        .ok_or_else(|| {
            MotionVisError::Parse(format!("missing numeric value for channel {}", name))
        })?;

    Ok(JsonMessage::Channel { index, value })
}

/// Reads JSON messages line by line from any buffered reader.
pub struct JsonSource<R> {
    reader: R,
}

impl<R: BufRead + Send> JsonSource<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R: BufRead + Send> SampleSource for JsonSource<R> {
    fn name(&self) -> &'static str {
        "JsonSource"
    }

    fn run(
        mut self: Box<Self>,
        ingest: &StreamIngest,
        running: &AtomicBool,
    ) -> Result<SourceStats> {
        let assembler = ChannelAssembler::new(ingest.channels().clone());
        let mut stats = SourceStats::default();
        let mut line = String::new();
        tracing::info!("JSON source started");

        while running.load(Ordering::Relaxed) {
            line.clear();
            let read = self
                .reader
                .read_line(&mut line)
                .context("Failed to read JSON message")?;
            if read == 0 {
                break;
            }
            if line.trim().is_empty() {
                continue;
            }

            let parsed = serde_json::from_str::<Value>(&line)
                .map_err(MotionVisError::from)
                .and_then(|v| parse_message(&v, ingest.channels()));

            let values = match parsed {
                Ok(JsonMessage::Sample(values)) => Some(values),
                Ok(JsonMessage::Channel { index, value }) => assembler.offer(index, value)?,
                Err(e) => {
                    stats.malformed += 1;
                    tracing::warn!("Skipping message: {}", e);
                    None
                }
            };

            if let Some(values) = values {
                ingest.push_now(values)?;
                stats.produced += 1;
            }
        }

        if assembler.filled() > 0 {
            tracing::debug!(
                "JSON source discarding {} partially assembled channels",
                assembler.filled()
            );
        }
        tracing::info!("JSON source stopped: {}", stats);
        Ok(stats)
    }
}

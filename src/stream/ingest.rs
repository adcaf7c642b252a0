//! Producer-side fan-out.
//!
//! Every arriving sample goes to both the render buffer and the window
//! accumulator. Arity is checked once, before either structure is touched,
//! so a rejected sample is seen by neither. Both structures are built here
//! from one channel set, so they always agree on arity.

use super::{StreamBuffer, WindowAccumulator};
use crate::error::Result;
use crate::types::{ChannelSet, Sample, StreamClock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Cloneable producer handle shared by all sample sources.
#[derive(Debug, Clone)]
pub struct StreamIngest {
    buffer: Arc<StreamBuffer>,
    accumulator: Arc<WindowAccumulator>,
    clock: StreamClock,
    accepted: Arc<AtomicU64>,
    rejected: Arc<AtomicU64>,
}

impl StreamIngest {
    /// Create the render buffer and window accumulator for `channels` and a
    /// producer handle feeding both.
    pub fn new(channels: ChannelSet, clock: StreamClock) -> Self {
        Self {
            buffer: Arc::new(StreamBuffer::new(channels.clone())),
            accumulator: Arc::new(WindowAccumulator::new(channels)),
            clock,
            accepted: Arc::new(AtomicU64::new(0)),
            rejected: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn channels(&self) -> &ChannelSet {
        self.buffer.channels()
    }

    pub fn buffer(&self) -> &Arc<StreamBuffer> {
        &self.buffer
    }

    pub fn accumulator(&self) -> &Arc<WindowAccumulator> {
        &self.accumulator
    }

    pub fn clock(&self) -> &StreamClock {
        &self.clock
    }

    /// Push a pre-stamped sample to both consumers.
    pub fn push(&self, sample: Sample) -> Result<()> {
        if let Err(e) = self.channels().check_arity(sample.arity()) {
            self.rejected.fetch_add(1, Ordering::Relaxed);
            return Err(e);
        }
        self.accumulator.add(sample.clone())?;
        self.buffer.push(sample)?;
        self.accepted.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Push values stamped with an explicit timestamp.
    pub fn push_at(&self, timestamp: Duration, values: impl Into<Vec<f64>>) -> Result<()> {
        self.push(Sample::new(timestamp, values))
    }

    /// Push values stamped with the stream clock.
    pub fn push_now(&self, values: impl Into<Vec<f64>>) -> Result<()> {
        self.push(self.clock.stamp(values))
    }

    /// Samples accepted so far
    pub fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    /// Samples rejected for arity so far
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }
}

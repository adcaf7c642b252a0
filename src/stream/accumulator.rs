//! Open-window accumulation for durable flushing.
//!
//! The accumulator is logically independent of [`StreamBuffer`](super::StreamBuffer):
//! it sees every sample, but rendering drains never remove from it.

use crate::error::Result;
use crate::types::{ChannelSet, Sample, Window};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct OpenWindow {
    started: Option<Instant>,
    samples: Vec<Sample>,
}

/// Peek at the open window without mutating it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccumulatorStatus {
    pub count: usize,
    pub started: Option<Instant>,
}

impl AccumulatorStatus {
    /// Time since the window opened, or `None` while idle
    pub fn elapsed_at(&self, now: Instant) -> Option<Duration> {
        self.started.map(|s| now.saturating_duration_since(s))
    }

    pub fn is_idle(&self) -> bool {
        self.started.is_none()
    }
}

/// Thread-safe accumulation of samples since the last flush.
#[derive(Debug)]
pub struct WindowAccumulator {
    channels: ChannelSet,
    open: Mutex<OpenWindow>,
}

impl WindowAccumulator {
    pub fn new(channels: ChannelSet) -> Self {
        Self {
            channels,
            open: Mutex::new(OpenWindow::default()),
        }
    }

    pub fn channels(&self) -> &ChannelSet {
        &self.channels
    }

    /// Append a sample to the open window, opening it now if idle.
    pub fn add(&self, sample: Sample) -> Result<()> {
        self.add_at(sample, Instant::now())
    }

    /// Append a sample, using `now` as the window start if idle.
    pub fn add_at(&self, sample: Sample, now: Instant) -> Result<()> {
        self.channels.check_arity(sample.arity())?;
        let mut open = self.lock();
        if open.started.is_none() {
            open.started = Some(now);
        }
        open.samples.push(sample);
        Ok(())
    }

    /// Capture the open window and reset to idle in one step.
    ///
    /// Returns `None` if no sample arrived since the last reset.
    pub fn snapshot_and_reset(&self) -> Option<Window> {
        let mut open = self.lock();
        Self::take(&mut open)
    }

    /// Capture and reset only if the open window holds at least `min_samples`.
    ///
    /// On refusal the window is left untouched and the current count is
    /// returned. The check and the capture happen under the same lock.
    pub fn take_if_at_least(&self, min_samples: usize) -> std::result::Result<Window, usize> {
        let mut open = self.lock();
        let count = open.samples.len();
        if count == 0 || count < min_samples {
            return Err(count);
        }
        Self::take(&mut open).ok_or(count)
    }

    pub fn status(&self) -> AccumulatorStatus {
        let open = self.lock();
        AccumulatorStatus {
            count: open.samples.len(),
            started: open.started,
        }
    }

    pub fn len(&self) -> usize {
        self.lock().samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().samples.is_empty()
    }

    fn take(open: &mut OpenWindow) -> Option<Window> {
        let started = open.started.take()?;
        let samples = std::mem::take(&mut open.samples);
        Some(Window { started, samples })
    }

    fn lock(&self) -> MutexGuard<'_, OpenWindow> {
        self.open.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

//! Channel-complete detector.
//!
//! Some sources deliver one channel at a time (a cloud callback per axis).
//! `ChannelAssembler` collects those per-channel values into slots and
//! releases a full value vector once every slot is filled, then starts over.

use crate::error::{MotionVisError, Result};
use crate::types::ChannelSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
struct Slots {
    values: Vec<Option<f64>>,
    filled: usize,
}

impl Slots {
    fn new(n: usize) -> Self {
        Self {
            values: vec![None; n],
            filled: 0,
        }
    }
}

/// Thread-safe per-channel slot filler.
#[derive(Debug)]
pub struct ChannelAssembler {
    channels: ChannelSet,
    slots: Mutex<Slots>,
}

impl ChannelAssembler {
    pub fn new(channels: ChannelSet) -> Self {
        let n = channels.len();
        Self {
            channels,
            slots: Mutex::new(Slots::new(n)),
        }
    }

    pub fn channels(&self) -> &ChannelSet {
        &self.channels
    }

    /// Fill the slot for `channel`.
    ///
    /// Returns the complete value vector when this offer filled the last
    /// empty slot. Offering a channel that is already filled overwrites it.
    pub fn offer(&self, channel: usize, value: f64) -> Result<Option<Vec<f64>>> {
        if channel >= self.channels.len() {
            return Err(MotionVisError::UnknownChannel(format!(
                "index {} (have {} channels)",
                channel,
                self.channels.len()
            )));
        }

        let mut slots = self.lock();
        if slots.values[channel].replace(value).is_none() {
            slots.filled += 1;
        }
        if slots.filled < slots.values.len() {
            return Ok(None);
        }

        let complete = slots.values.iter_mut().filter_map(Option::take).collect();
        slots.filled = 0;
        Ok(Some(complete))
    }

    /// Fill the slot for a channel given by name (case-insensitive).
    pub fn offer_named(&self, name: &str, value: f64) -> Result<Option<Vec<f64>>> {
        let index = self
            .channels
            .index_of(name)
            .ok_or_else(|| MotionVisError::UnknownChannel(name.to_string()))?;
        self.offer(index, value)
    }

    /// Number of slots currently filled
    pub fn filled(&self) -> usize {
        self.lock().filled
    }

    /// Discard any partially assembled values
    pub fn reset(&self) {
        let mut slots = self.lock();
        *slots = Slots::new(self.channels.len());
    }

    fn lock(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

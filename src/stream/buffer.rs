//! Thread-safe FIFO of multi-channel samples.
//!
//! `StreamBuffer` is the hand-off point between producers (sensor callbacks
//! on arbitrary threads) and the render tick. Pushes never wait for a
//! consumer; the queue grows without bound if nobody drains it.

use crate::error::Result;
use crate::types::{ChannelSet, Sample};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Unbounded FIFO of [`Sample`]s guarded by a single mutex.
#[derive(Debug)]
pub struct StreamBuffer {
    channels: ChannelSet,
    queue: Mutex<VecDeque<Sample>>,
}

impl StreamBuffer {
    pub fn new(channels: ChannelSet) -> Self {
        Self {
            channels,
            queue: Mutex::new(VecDeque::new()),
        }
    }

    pub fn channels(&self) -> &ChannelSet {
        &self.channels
    }

    /// Append a sample to the tail.
    ///
    /// Rejects samples whose value count differs from the channel count;
    /// a rejected sample is never stored.
    pub fn push(&self, sample: Sample) -> Result<()> {
        self.channels.check_arity(sample.arity())?;
        self.lock().push_back(sample);
        Ok(())
    }

    /// Remove and return up to `max_items` samples from the head, oldest first.
    ///
    /// An empty buffer yields an empty batch.
    pub fn drain(&self, max_items: usize) -> Vec<Sample> {
        let mut queue = self.lock();
        let take = max_items.min(queue.len());
        queue.drain(..take).collect()
    }

    /// Remove and return everything currently queued.
    pub fn drain_all(&self) -> Vec<Sample> {
        let mut queue = self.lock();
        queue.drain(..).collect()
    }

    /// Number of queued samples.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    // Poison is ignored: no critical section leaves the deque half-modified.
    fn lock(&self) -> MutexGuard<'_, VecDeque<Sample>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

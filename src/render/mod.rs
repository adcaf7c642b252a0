//! Render consumers for [`RenderUpdate`]s produced by the batch drainer.
//!
//! - [`SlidingWindowView`] keeps the last `window_len` points of every
//!   channel, ready to hand to a plotting widget.
//! - [`ChannelRenderConsumer`] forwards appends to another thread (a UI
//!   loop) without ever blocking the drainer.

use crate::stream::{AppendBatch, RenderConsumer, RenderUpdate};
use crate::types::ChannelSet;
use crossbeam_channel::{Sender, TrySendError};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Per-channel `[t, value]` history truncated to the target window length.
#[derive(Debug, Clone)]
pub struct SlidingWindowView {
    channels: ChannelSet,
    traces: Vec<VecDeque<[f64; 2]>>,
    window_len: usize,
    updates: u64,
}

impl SlidingWindowView {
    pub fn new(channels: ChannelSet, window_len: usize) -> Self {
        let window_len = window_len.max(1);
        Self {
            traces: (0..channels.len())
                .map(|_| VecDeque::with_capacity(window_len))
                .collect(),
            channels,
            window_len,
            updates: 0,
        }
    }

    pub fn channels(&self) -> &ChannelSet {
        &self.channels
    }

    pub fn window_len(&self) -> usize {
        self.window_len
    }

    /// Append updates applied so far
    pub fn updates(&self) -> u64 {
        self.updates
    }

    /// Points currently held for `channel`
    pub fn len(&self, channel: usize) -> usize {
        self.traces.get(channel).map_or(0, VecDeque::len)
    }

    pub fn is_empty(&self) -> bool {
        self.traces.iter().all(VecDeque::is_empty)
    }

    pub fn apply_batch(&mut self, batch: &AppendBatch) {
        // The batch may carry a newer target length than we were built with
        self.window_len = batch.window_len.max(1);

        for (column, &channel) in batch.values.iter().zip(&batch.channel_indices) {
            let Some(trace) = self.traces.get_mut(channel) else {
                continue;
            };
            for (t, v) in batch.times.iter().zip(column) {
                trace.push_back([t.as_secs_f64(), *v]);
            }
        }
        for trace in &mut self.traces {
            while trace.len() > self.window_len {
                trace.pop_front();
            }
        }
        self.updates += 1;
    }

    /// `[t, value]` points for plotting
    pub fn as_plot_points(&self, channel: usize) -> Vec<[f64; 2]> {
        self.traces
            .get(channel)
            .map(|t| t.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Most recent value of every channel, if any point has arrived
    pub fn latest(&self) -> Option<Vec<f64>> {
        self.traces
            .iter()
            .map(|t| t.back().map(|p| p[1]))
            .collect()
    }

    pub fn clear(&mut self) {
        for trace in &mut self.traces {
            trace.clear();
        }
    }
}

impl RenderConsumer for SlidingWindowView {
    fn apply(&mut self, update: RenderUpdate) {
        if let RenderUpdate::Append(batch) = update {
            self.apply_batch(&batch);
        }
    }
}

/// Forwards appends over a bounded channel.
///
/// `NoUpdate` is not forwarded. When the receiver falls behind the update
/// is dropped and counted; the drainer is never blocked.
pub struct ChannelRenderConsumer {
    tx: Sender<AppendBatch>,
    dropped: Arc<AtomicU64>,
    disconnected: bool,
}

impl ChannelRenderConsumer {
    pub fn new(tx: Sender<AppendBatch>) -> Self {
        Self {
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
            disconnected: false,
        }
    }

    /// Shared drop counter, readable after the consumer moved into a drainer
    pub fn dropped_counter(&self) -> Arc<AtomicU64> {
        self.dropped.clone()
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl RenderConsumer for ChannelRenderConsumer {
    fn apply(&mut self, update: RenderUpdate) {
        let RenderUpdate::Append(batch) = update else {
            return;
        };
        match self.tx.try_send(batch) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
            Err(TrySendError::Disconnected(_)) => {
                if !self.disconnected {
                    tracing::debug!("Render receiver disconnected, discarding updates");
                    self.disconnected = true;
                }
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

impl Drop for ChannelRenderConsumer {
    fn drop(&mut self) {
        let dropped = self.dropped();
        if dropped > 0 {
            tracing::warn!("Render consumer dropped {} updates due to backpressure", dropped);
        }
    }
}

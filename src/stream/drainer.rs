//! Render-tick batch draining.
//!
//! On every tick the drainer pulls at most `max_step` samples from the
//! [`StreamBuffer`], reshapes them column-wise and hands an incremental
//! append to the render consumer. Drained samples are gone for good.

use super::ticker::FixedTicker;
use super::StreamBuffer;
use crate::types::Sample;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Incremental append instruction for a live chart.
#[derive(Debug, Clone, PartialEq)]
pub struct AppendBatch {
    /// New points, one vector per channel (`values[channel][i]`)
    pub values: Vec<Vec<f64>>,
    /// Shared time axis for the new points
    pub times: Vec<Duration>,
    /// Which channels (traces) the vectors in `values` belong to
    pub channel_indices: Vec<usize>,
    /// Sliding window length the consumer should keep per channel
    pub window_len: usize,
}

impl AppendBatch {
    /// Reshape row-major samples into per-channel columns.
    pub fn from_samples(samples: &[Sample], channel_count: usize, window_len: usize) -> Self {
        let mut values: Vec<Vec<f64>> = (0..channel_count)
            .map(|_| Vec::with_capacity(samples.len()))
            .collect();
        let mut times = Vec::with_capacity(samples.len());

        for sample in samples {
            times.push(sample.timestamp());
            for (column, value) in values.iter_mut().zip(sample.values()) {
                column.push(*value);
            }
        }

        Self {
            values,
            times,
            channel_indices: (0..channel_count).collect(),
            window_len,
        }
    }

    /// Number of new points per channel
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
}

/// What a render consumer receives on each tick.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderUpdate {
    /// Nothing new; the consumer must keep its current state
    NoUpdate,
    Append(AppendBatch),
}

/// Receiver of render updates (a chart, a channel to a UI thread, ...).
pub trait RenderConsumer: Send {
    fn apply(&mut self, update: RenderUpdate);
}

impl<F> RenderConsumer for F
where
    F: FnMut(RenderUpdate) + Send,
{
    fn apply(&mut self, update: RenderUpdate) {
        self(update)
    }
}

/// Outcome of one render tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickStatus {
    /// Buffer was empty
    Waiting,
    /// `count` samples were dispatched, `pending` remain queued
    Appended { count: usize, pending: usize },
}

impl fmt::Display for TickStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TickStatus::Waiting => write!(f, "Waiting... inbox=0"),
            TickStatus::Appended { count, pending } => {
                write!(f, "Appended {} | inbox={}", count, pending)
            }
        }
    }
}

/// Periodic drainer feeding a [`RenderConsumer`].
pub struct BatchDrainer {
    buffer: Arc<StreamBuffer>,
    consumer: Box<dyn RenderConsumer>,
    max_step: usize,
    window_len: usize,
    ticks: u64,
}

impl BatchDrainer {
    pub fn new(
        buffer: Arc<StreamBuffer>,
        consumer: Box<dyn RenderConsumer>,
        max_step: usize,
        window_len: usize,
    ) -> Self {
        Self {
            buffer,
            consumer,
            max_step: max_step.max(1),
            window_len: window_len.max(1),
            ticks: 0,
        }
    }

    pub fn max_step(&self) -> usize {
        self.max_step
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Run a single tick: drain, reshape, dispatch.
    pub fn tick(&mut self) -> TickStatus {
        self.ticks += 1;
        let batch = self.buffer.drain(self.max_step);
        if batch.is_empty() {
            self.consumer.apply(RenderUpdate::NoUpdate);
            return TickStatus::Waiting;
        }

        let count = batch.len();
        let update =
            AppendBatch::from_samples(&batch, self.buffer.channels().len(), self.window_len);
        self.consumer.apply(RenderUpdate::Append(update));

        TickStatus::Appended {
            count,
            pending: self.buffer.len(),
        }
    }

    /// Tick every `period` until `running` is cleared.
    ///
    /// Ticks run on the calling thread, so at most one is in flight;
    /// overruns skip deadlines instead of queuing them.
    pub fn run(&mut self, running: &AtomicBool, period: Duration) {
        tracing::info!(
            "Render drainer started (period {:?}, max_step {})",
            period,
            self.max_step
        );
        let mut ticker = FixedTicker::new(period);

        while running.load(Ordering::Relaxed) {
            let skipped = ticker.wait();
            if skipped > 0 {
                tracing::debug!("Render tick overran, skipped {} ticks", skipped);
            }
            if !running.load(Ordering::Relaxed) {
                break;
            }
            let status = self.tick();
            tracing::trace!("{}", status);
        }

        tracing::info!(
            "Render drainer exiting after {} ticks ({} skipped)",
            self.ticks,
            ticker.skipped()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChannelSet;
    use std::sync::Mutex;

    fn recording_drainer(
        max_step: usize,
    ) -> (BatchDrainer, Arc<StreamBuffer>, Arc<Mutex<Vec<RenderUpdate>>>) {
        let buffer = Arc::new(StreamBuffer::new(ChannelSet::xyz()));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let drainer = BatchDrainer::new(
            buffer.clone(),
            Box::new(move |u: RenderUpdate| sink.lock().unwrap().push(u)),
            max_step,
            600,
        );
        (drainer, buffer, seen)
    }

    #[test]
    fn test_empty_tick_emits_no_update() {
        let (mut drainer, _buffer, seen) = recording_drainer(20);
        assert_eq!(drainer.tick(), TickStatus::Waiting);
        assert_eq!(seen.lock().unwrap().as_slice(), &[RenderUpdate::NoUpdate]);
    }

    #[test]
    fn test_tick_caps_batch_and_reshapes() {
        let (mut drainer, buffer, seen) = recording_drainer(2);
        for t in 0..3u64 {
            buffer
                .push(Sample::new(
                    Duration::from_secs(t),
                    vec![t as f64, 10.0 + t as f64, 20.0 + t as f64],
                ))
                .unwrap();
        }

        assert_eq!(drainer.tick(), TickStatus::Appended { count: 2, pending: 1 });
        assert_eq!(drainer.tick(), TickStatus::Appended { count: 1, pending: 0 });
        assert_eq!(drainer.tick(), TickStatus::Waiting);

        let seen = seen.lock().unwrap();
        let RenderUpdate::Append(first) = &seen[0] else {
            panic!("expected append");
        };
        assert_eq!(first.times, vec![Duration::from_secs(0), Duration::from_secs(1)]);
        assert_eq!(first.values[0], vec![0.0, 1.0]);
        assert_eq!(first.values[1], vec![10.0, 11.0]);
        assert_eq!(first.values[2], vec![20.0, 21.0]);
        assert_eq!(first.channel_indices, vec![0, 1, 2]);
        assert_eq!(first.window_len, 600);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(TickStatus::Waiting.to_string(), "Waiting... inbox=0");
        assert_eq!(
            TickStatus::Appended { count: 20, pending: 3 }.to_string(),
            "Appended 20 | inbox=3"
        );
    }

    #[test]
    fn test_run_stops_when_flag_cleared() {
        let (mut drainer, buffer, _seen) = recording_drainer(5);
        buffer
            .push(Sample::new(Duration::ZERO, vec![1.0, 2.0, 3.0]))
            .unwrap();
        let running = Arc::new(AtomicBool::new(true));
        let flag = running.clone();

        let handle = std::thread::spawn(move || {
            drainer.run(&flag, Duration::from_millis(5));
            drainer
        });
        std::thread::sleep(Duration::from_millis(50));
        running.store(false, Ordering::Relaxed);
        let drainer = handle.join().unwrap();

        assert!(drainer.ticks() >= 1);
        assert!(buffer.is_empty());
    }
}

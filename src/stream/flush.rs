//! Window flush policy and the controller that runs it.
//!
//! # State machine
//!
//! ```text
//! IDLE ──add──► ACCUMULATING ──elapsed ≥ window / count ≥ max / manual──► attempt
//!   ▲                                                                   │
//!   └───────────── count ≥ min_samples: snapshot, hand to sink ◄────────┘
//!                  count < min_samples: skipped, keep accumulating
//! ```
//!
//! The elapsed-time check runs on a fixed poll interval, so timer flushes
//! land up to one poll interval late. Manual requests are served as soon as
//! they arrive.
//!
//! Delivery is at-most-once: once a window is snapshotted it is consumed,
//! whether or not the sink manages to persist it.

use super::ticker::FixedTicker;
use super::WindowAccumulator;
use crate::sink::{Sink, SinkReport};
use crate::types::{ChannelSet, FlushReason, FlushedWindow, Window};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Tunables for [`WindowFlushPolicy`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlushSettings {
    /// Flush once the open window is at least this old
    pub window_duration: Duration,
    /// Windows smaller than this are never handed to the sink
    pub min_samples: usize,
    /// Flush once the open window holds this many samples
    pub max_samples: Option<usize>,
}

impl Default for FlushSettings {
    fn default() -> Self {
        Self {
            window_duration: Duration::from_secs(10),
            min_samples: 15,
            max_samples: None,
        }
    }
}

/// Observable policy state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyState {
    Idle,
    Accumulating { count: usize, elapsed: Duration },
}

/// Result of asking the policy to release a window
#[derive(Debug, Clone, PartialEq)]
pub enum FlushAttempt {
    Ready(Window),
    /// Too few samples; the open window was left as is
    Skipped { count: usize },
}

/// Decides when the accumulated window is due and releases it.
#[derive(Debug, Clone)]
pub struct WindowFlushPolicy {
    accumulator: Arc<WindowAccumulator>,
    settings: FlushSettings,
}

impl WindowFlushPolicy {
    pub fn new(accumulator: Arc<WindowAccumulator>, settings: FlushSettings) -> Self {
        Self {
            accumulator,
            settings,
        }
    }

    pub fn settings(&self) -> &FlushSettings {
        &self.settings
    }

    pub fn accumulator(&self) -> &Arc<WindowAccumulator> {
        &self.accumulator
    }

    pub fn state_at(&self, now: Instant) -> PolicyState {
        let status = self.accumulator.status();
        match status.elapsed_at(now) {
            Some(elapsed) if status.count > 0 => PolicyState::Accumulating {
                count: status.count,
                elapsed,
            },
            _ => PolicyState::Idle,
        }
    }

    /// Which automatic trigger, if any, has fired at `now`.
    pub fn due_at(&self, now: Instant) -> Option<FlushReason> {
        match self.state_at(now) {
            PolicyState::Idle => None,
            PolicyState::Accumulating { elapsed, .. }
                if elapsed >= self.settings.window_duration =>
            {
                Some(FlushReason::Timer)
            }
            PolicyState::Accumulating { count, .. } => match self.settings.max_samples {
                Some(max) if max > 0 && count >= max => Some(FlushReason::Size),
                _ => None,
            },
        }
    }

    /// Release the open window if it meets `min_samples`.
    pub fn attempt(&self) -> FlushAttempt {
        match self.accumulator.take_if_at_least(self.settings.min_samples) {
            Ok(window) => FlushAttempt::Ready(window),
            Err(count) => FlushAttempt::Skipped { count },
        }
    }
}

/// Reported result of one flush attempt
#[derive(Debug, Clone, PartialEq)]
pub enum FlushOutcome {
    /// Window handed to the sink and persisted
    Flushed {
        reason: FlushReason,
        samples: usize,
        report: SinkReport,
    },
    /// Window handed to the sink, which failed; the window is not retried
    Failed {
        reason: FlushReason,
        samples: usize,
        error: String,
    },
    /// Too few samples; accumulation continues
    Skipped { reason: FlushReason, samples: usize },
}

impl FlushOutcome {
    pub fn reason(&self) -> FlushReason {
        match self {
            FlushOutcome::Flushed { reason, .. }
            | FlushOutcome::Failed { reason, .. }
            | FlushOutcome::Skipped { reason, .. } => *reason,
        }
    }

    pub fn is_flushed(&self) -> bool {
        matches!(self, FlushOutcome::Flushed { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, FlushOutcome::Skipped { .. })
    }
}

impl fmt::Display for FlushOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlushOutcome::Flushed {
                reason,
                samples,
                report,
            } => write!(f, "[{}] {} samples -> {}", reason, samples, report),
            FlushOutcome::Failed {
                reason,
                samples,
                error,
            } => write!(f, "[{}] {} samples not persisted: {}", reason, samples, error),
            FlushOutcome::Skipped { reason, samples } => {
                write!(f, "[{}] skipped: only {} samples", reason, samples)
            }
        }
    }
}

/// Messages accepted by a running [`FlushController`]
#[derive(Debug)]
pub enum FlushRequest {
    /// Manual flush; the outcome is sent back on `reply` if present
    FlushNow {
        reply: Option<Sender<FlushOutcome>>,
    },
    /// Stop the poll loop
    Shutdown,
}

/// Channel capacity for manual flush requests.
const REQUEST_CHANNEL_CAPACITY: usize = 16;

/// Cloneable handle for triggering flushes from other threads.
#[derive(Debug, Clone)]
pub struct FlushHandle {
    tx: Sender<FlushRequest>,
}

impl FlushHandle {
    /// Create a handle and the request receiver the controller listens on.
    pub fn new() -> (Self, Receiver<FlushRequest>) {
        let (tx, rx) = bounded(REQUEST_CHANNEL_CAPACITY);
        (Self { tx }, rx)
    }

    /// Queue a manual flush without waiting for the outcome.
    pub fn request_flush(&self) -> bool {
        self.tx
            .try_send(FlushRequest::FlushNow { reply: None })
            .is_ok()
    }

    /// Request a manual flush and wait up to `timeout` for its outcome.
    pub fn flush_now(&self, timeout: Duration) -> Option<FlushOutcome> {
        let (reply_tx, reply_rx) = bounded(1);
        self.tx
            .send_timeout(
                FlushRequest::FlushNow {
                    reply: Some(reply_tx),
                },
                timeout,
            )
            .ok()?;
        reply_rx.recv_timeout(timeout).ok()
    }

    pub fn shutdown(&self) {
        let _ = self.tx.send(FlushRequest::Shutdown);
    }
}

/// Runs a [`WindowFlushPolicy`] against a [`Sink`].
pub struct FlushController {
    policy: WindowFlushPolicy,
    sink: Box<dyn Sink>,
    channels: ChannelSet,
    epoch: chrono::DateTime<chrono::Local>,
    status_tx: Option<Sender<FlushOutcome>>,
    flush_on_shutdown: bool,
    flushed: u64,
}

impl FlushController {
    pub fn new(
        policy: WindowFlushPolicy,
        sink: Box<dyn Sink>,
        epoch: chrono::DateTime<chrono::Local>,
    ) -> Self {
        let channels = policy.accumulator().channels().clone();
        Self {
            policy,
            sink,
            channels,
            epoch,
            status_tx: None,
            flush_on_shutdown: false,
            flushed: 0,
        }
    }

    /// Report every outcome on `tx` (best effort, never blocks)
    pub fn with_status(mut self, tx: Sender<FlushOutcome>) -> Self {
        self.status_tx = Some(tx);
        self
    }

    /// Make one last manual attempt when the poll loop stops
    pub fn with_flush_on_shutdown(mut self, enabled: bool) -> Self {
        self.flush_on_shutdown = enabled;
        self
    }

    pub fn policy(&self) -> &WindowFlushPolicy {
        &self.policy
    }

    /// Windows successfully delivered so far
    pub fn flushed(&self) -> u64 {
        self.flushed
    }

    /// Attempt a flush for `reason` and deliver the window if released.
    pub fn flush(&mut self, reason: FlushReason) -> FlushOutcome {
        let outcome = match self.policy.attempt() {
            FlushAttempt::Skipped { count } => FlushOutcome::Skipped {
                reason,
                samples: count,
            },
            FlushAttempt::Ready(window) => self.deliver(reason, window),
        };

        match &outcome {
            FlushOutcome::Flushed { .. } => tracing::info!("{}", outcome),
            FlushOutcome::Failed { .. } => tracing::warn!("{}", outcome),
            FlushOutcome::Skipped { .. } if reason == FlushReason::Manual => {
                tracing::info!("{}", outcome)
            }
            FlushOutcome::Skipped { .. } => tracing::debug!("{}", outcome),
        }

        if let Some(tx) = &self.status_tx {
            let _ = tx.try_send(outcome.clone());
        }
        outcome
    }

    /// Flush if an automatic trigger is due at `now`.
    pub fn poll_at(&mut self, now: Instant) -> Option<FlushOutcome> {
        let reason = self.policy.due_at(now)?;
        Some(self.flush(reason))
    }

    pub fn poll(&mut self) -> Option<FlushOutcome> {
        self.poll_at(Instant::now())
    }

    /// Poll every `poll_interval` and serve manual requests until
    /// `running` is cleared or a shutdown request arrives.
    pub fn run(
        &mut self,
        running: &AtomicBool,
        poll_interval: Duration,
        requests: Receiver<FlushRequest>,
    ) {
        tracing::info!(
            "Flush controller started (window {:?}, min {} samples, poll {:?}, sink {})",
            self.policy.settings().window_duration,
            self.policy.settings().min_samples,
            poll_interval,
            self.sink.name()
        );
        let mut ticker = FixedTicker::new(poll_interval);
        let mut requests = requests;

        while running.load(Ordering::Relaxed) {
            let deadline = ticker.deadline();
            match requests.recv_deadline(deadline) {
                Ok(FlushRequest::FlushNow { reply }) => {
                    let outcome = self.flush(FlushReason::Manual);
                    if let Some(reply) = reply {
                        let _ = reply.try_send(outcome);
                    }
                }
                Ok(FlushRequest::Shutdown) => break,
                Err(RecvTimeoutError::Timeout) => {
                    ticker.fire(Instant::now());
                    self.poll();
                }
                Err(RecvTimeoutError::Disconnected) => {
                    tracing::debug!("All flush handles dropped, polling only");
                    requests = crossbeam_channel::never();
                }
            }
        }

        if self.flush_on_shutdown {
            self.flush(FlushReason::Manual);
        }
        tracing::info!(
            "Flush controller exiting after {} delivered windows",
            self.flushed
        );
    }

    // Runs with no lock held: the window was moved out of the accumulator.
    fn deliver(&mut self, reason: FlushReason, window: Window) -> FlushOutcome {
        let samples = window.len();
        let flushed = FlushedWindow {
            reason,
            channels: self.channels.clone(),
            window,
            epoch: self.epoch,
            flushed_at: chrono::Local::now(),
        };

        match self.sink.deliver(&flushed) {
            Ok(report) => {
                self.flushed += 1;
                FlushOutcome::Flushed {
                    reason,
                    samples,
                    report,
                }
            }
            Err(e) => FlushOutcome::Failed {
                reason,
                samples,
                error: e.to_string(),
            },
        }
    }
}

//! Session wiring: one stream, its render and flush threads, and its sources.
//!
//! # Threads
//!
//! - `render` - runs the [`BatchDrainer`] at the render tick period
//! - `flush` - runs the [`FlushController`] poll loop and serves manual
//!   flush requests
//! - one thread per [`SampleSource`]
//!
//! # Shutdown
//!
//! Sources are stopped first and given a short grace period, so the final
//! window contains everything they produced. Sources blocked on input that
//! never arrives (an idle stdin) are detached. Then the render and flush
//! loops stop; the flush loop makes its final attempt if configured.

use crate::config::{AppConfig, OutputSettings};
use crate::error::{MotionVisError, Result};
use crate::sink::{CsvWindowSink, JsonWindowSink, MultiSink, Sink};
use crate::source::{SampleSource, SourceStats};
use crate::stream::{
    BatchDrainer, FlushController, FlushHandle, FlushOutcome, FlushSettings, RenderConsumer,
    StreamBuffer, StreamIngest, WindowAccumulator, WindowFlushPolicy,
};
use crate::types::{ChannelSet, StreamClock};
use crossbeam_channel::{bounded, Receiver};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Capacity of the flush outcome channel
const OUTCOME_CHANNEL_CAPACITY: usize = 64;

/// How long shutdown waits for sources to notice the stop flag
const SOURCE_GRACE_PERIOD: Duration = Duration::from_millis(500);

/// Timing and sizing for a running session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOptions {
    pub render_period: Duration,
    pub max_step: usize,
    pub window_len: usize,
    pub flush: FlushSettings,
    pub poll_interval: Duration,
    pub flush_on_shutdown: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::with_flush(&AppConfig::default(), FlushSettings::default())
    }
}

impl SessionOptions {
    /// Options from a config; fails if the flush window is not a usable
    /// duration
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Ok(Self::with_flush(config, config.flush.to_settings()?))
    }

    fn with_flush(config: &AppConfig, flush: FlushSettings) -> Self {
        Self {
            render_period: config.render.tick_period(),
            max_step: config.render.max_step,
            window_len: config.render.window_points,
            flush,
            poll_interval: config.flush.poll_interval(),
            flush_on_shutdown: config.flush.on_shutdown,
        }
    }
}

/// Build the sink described by the output section
pub fn build_sink(output: &OutputSettings) -> Box<dyn Sink> {
    let csv = || {
        CsvWindowSink::new(&output.dir)
            .with_prefix(output.prefix.clone())
            .with_annotations(output.annotations)
    };
    let jsonl = || JsonWindowSink::in_dir(&output.dir);

    let sink: Box<dyn Sink> = match (output.format.writes_csv(), output.format.writes_jsonl()) {
        (true, true) => Box::new(MultiSink::new().with(csv()).with(jsonl())),
        (false, true) => Box::new(jsonl()),
        _ => Box::new(csv()),
    };
    sink
}

/// The shared state of one stream, before any thread is started
pub struct StreamSession {
    ingest: StreamIngest,
}

impl StreamSession {
    pub fn new(channels: ChannelSet) -> Self {
        Self {
            ingest: StreamIngest::new(channels, StreamClock::new()),
        }
    }

    pub fn channels(&self) -> &ChannelSet {
        self.ingest.channels()
    }

    pub fn buffer(&self) -> &Arc<StreamBuffer> {
        self.ingest.buffer()
    }

    pub fn accumulator(&self) -> &Arc<WindowAccumulator> {
        self.ingest.accumulator()
    }

    /// Producer handle; clone freely
    pub fn ingest(&self) -> StreamIngest {
        self.ingest.clone()
    }

    pub fn drainer(
        &self,
        consumer: Box<dyn RenderConsumer>,
        options: &SessionOptions,
    ) -> BatchDrainer {
        BatchDrainer::new(
            self.buffer().clone(),
            consumer,
            options.max_step,
            options.window_len,
        )
    }

    pub fn flush_controller(
        &self,
        sink: Box<dyn Sink>,
        options: &SessionOptions,
    ) -> FlushController {
        FlushController::new(
            WindowFlushPolicy::new(self.accumulator().clone(), options.flush),
            sink,
            self.ingest.clock().wall_start(),
        )
        .with_flush_on_shutdown(options.flush_on_shutdown)
    }

    /// Start the render and flush threads.
    pub fn start(
        self,
        options: SessionOptions,
        consumer: Box<dyn RenderConsumer>,
        sink: Box<dyn Sink>,
    ) -> Result<SessionHandle> {
        let running = Arc::new(AtomicBool::new(true));
        let (flush, requests) = FlushHandle::new();
        let (outcome_tx, outcomes) = bounded(OUTCOME_CHANNEL_CAPACITY);

        let mut drainer = self.drainer(consumer, &options);
        let render_running = running.clone();
        let render_period = options.render_period;
        let render = std::thread::Builder::new()
            .name("render".into())
            .spawn(move || {
                drainer.run(&render_running, render_period);
                drainer.ticks()
            })?;

        let mut controller = self
            .flush_controller(sink, &options)
            .with_status(outcome_tx);
        let flush_running = running.clone();
        let poll_interval = options.poll_interval;
        let flusher = std::thread::Builder::new()
            .name("flush".into())
            .spawn(move || {
                controller.run(&flush_running, poll_interval, requests);
                controller.flushed()
            })
            .map_err(|e| {
                // Render thread is already up: stop it before bailing out
                running.store(false, Ordering::Relaxed);
                MotionVisError::from(e)
            })?;

        tracing::info!(
            "Session started ({} channels, window {:?}, min {} samples)",
            self.channels().len(),
            options.flush.window_duration,
            options.flush.min_samples
        );

        Ok(SessionHandle {
            ingest: self.ingest,
            flush,
            outcomes,
            running,
            sources_running: Arc::new(AtomicBool::new(true)),
            render: Some(render),
            flusher: Some(flusher),
            sources: Vec::new(),
        })
    }
}

/// Totals reported when a session shuts down
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSummary {
    pub render_ticks: u64,
    pub windows_flushed: u64,
    pub accepted: u64,
    pub rejected: u64,
    /// Stats of the sources that stopped within the grace period
    pub sources: Vec<SourceStats>,
}

/// A running session
pub struct SessionHandle {
    ingest: StreamIngest,
    flush: FlushHandle,
    outcomes: Receiver<FlushOutcome>,
    running: Arc<AtomicBool>,
    sources_running: Arc<AtomicBool>,
    render: Option<JoinHandle<u64>>,
    flusher: Option<JoinHandle<u64>>,
    sources: Vec<(&'static str, JoinHandle<Result<SourceStats>>)>,
}

impl SessionHandle {
    pub fn ingest(&self) -> &StreamIngest {
        &self.ingest
    }

    pub fn flush_handle(&self) -> FlushHandle {
        self.flush.clone()
    }

    /// Queue a manual flush; the outcome arrives on [`outcomes`](Self::outcomes)
    pub fn request_flush(&self) -> bool {
        self.flush.request_flush()
    }

    /// Manual flush, waiting up to `timeout` for the outcome
    pub fn flush_now(&self, timeout: Duration) -> Option<FlushOutcome> {
        self.flush.flush_now(timeout)
    }

    /// Every flush attempt's outcome, in order
    pub fn outcomes(&self) -> &Receiver<FlushOutcome> {
        &self.outcomes
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Run `source` on its own thread until it ends or the session stops.
    pub fn spawn_source(&mut self, source: Box<dyn SampleSource>) -> Result<()> {
        let name = source.name();
        let ingest = self.ingest.clone();
        let running = self.sources_running.clone();
        let handle = std::thread::Builder::new()
            .name(format!("source-{}", name))
            .spawn(move || {
                let result = source.run(&ingest, &running);
                if let Err(e) = &result {
                    tracing::error!("{} failed: {}", name, e);
                }
                result
            })?;
        self.sources.push((name, handle));
        Ok(())
    }

    /// Whether every spawned source has ended on its own
    pub fn sources_finished(&self) -> bool {
        self.sources.iter().all(|(_, h)| h.is_finished())
    }

    /// Stop everything and wait for the render and flush threads.
    pub fn shutdown(mut self) -> SessionSummary {
        tracing::info!("Shutting down session");
        let mut summary = SessionSummary::default();

        self.sources_running.store(false, Ordering::Relaxed);
        let deadline = Instant::now() + SOURCE_GRACE_PERIOD;
        while !self.sources_finished() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        for (name, handle) in self.sources.drain(..) {
            if !handle.is_finished() {
                tracing::debug!("{} still blocked on input, detaching", name);
                continue;
            }
            match handle.join() {
                Ok(Ok(stats)) => summary.sources.push(stats),
                Ok(Err(_)) => {}
                Err(_) => tracing::error!("{} thread panicked", name),
            }
        }

        self.running.store(false, Ordering::Relaxed);
        self.flush.shutdown();
        if let Some(render) = self.render.take() {
            summary.render_ticks = render.join().unwrap_or_else(|_| {
                tracing::error!("Render thread panicked");
                0
            });
        }
        if let Some(flusher) = self.flusher.take() {
            summary.windows_flushed = flusher.join().unwrap_or_else(|_| {
                tracing::error!("Flush thread panicked");
                0
            });
        }

        summary.accepted = self.ingest.accepted();
        summary.rejected = self.ingest.rejected();
        tracing::info!(
            "Session stopped: {} samples accepted, {} rejected, {} windows flushed",
            summary.accepted,
            summary.rejected,
            summary.windows_flushed
        );
        summary
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.sources_running.store(false, Ordering::Relaxed);
        self.running.store(false, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutputFormat;
    use crate::sink::{MockSink, SinkReport};
    use crate::stream::RenderUpdate;
    use crate::types::FlushReason;

    fn fast_options(min_samples: usize) -> SessionOptions {
        SessionOptions {
            render_period: Duration::from_millis(5),
            max_step: 10,
            window_len: 100,
            flush: FlushSettings {
                window_duration: Duration::from_secs(60),
                min_samples,
                max_samples: None,
            },
            poll_interval: Duration::from_millis(10),
            flush_on_shutdown: false,
        }
    }

    #[test]
    fn test_options_from_default_config() {
        let options = SessionOptions::default();
        assert_eq!(options.render_period, Duration::from_millis(120));
        assert_eq!(options.max_step, 20);
        assert_eq!(options.window_len, 800);
        assert_eq!(options.flush.window_duration, Duration::from_secs(10));
        assert_eq!(options.poll_interval, Duration::from_secs(1));
        assert!(options.flush_on_shutdown);
    }

    #[test]
    fn test_options_from_config() {
        let mut config = AppConfig::default();
        let options = SessionOptions::from_config(&config).unwrap();
        assert_eq!(options.flush, SessionOptions::default().flush);

        config.flush.window_secs = 1e20;
        assert!(SessionOptions::from_config(&config).is_err());
    }

    #[test]
    fn test_build_sink_by_format() {
        let mut output = OutputSettings::default();
        assert_eq!(build_sink(&output).name(), "CsvWindowSink");
        output.format = OutputFormat::Jsonl;
        assert_eq!(build_sink(&output).name(), "JsonWindowSink");
        output.format = OutputFormat::Both;
        assert_eq!(build_sink(&output).name(), "MultiSink");
    }

    #[test]
    fn test_manual_flush_through_handle() {
        let mut sink = MockSink::new();
        sink.expect_name().return_const("mock");
        sink.expect_deliver()
            .times(1)
            .returning(|w| Ok(SinkReport::rows(w.len())));

        let session = StreamSession::new(ChannelSet::xyz());
        let handle = session
            .start(fast_options(2), Box::new(|_: RenderUpdate| {}), Box::new(sink))
            .unwrap();

        handle.ingest().push_now(vec![1.0, 2.0, 3.0]).unwrap();
        let skipped = handle.flush_now(Duration::from_secs(2)).unwrap();
        assert!(skipped.is_skipped());

        handle.ingest().push_now(vec![4.0, 5.0, 6.0]).unwrap();
        let flushed = handle.flush_now(Duration::from_secs(2)).unwrap();
        assert!(flushed.is_flushed());
        assert_eq!(flushed.reason(), FlushReason::Manual);

        let summary = handle.shutdown();
        assert_eq!(summary.windows_flushed, 1);
        assert_eq!(summary.accepted, 2);
    }
}

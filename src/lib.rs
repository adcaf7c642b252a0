//! # MotionVis-RS: live motion-sensor streaming
//!
//! Streams multi-channel motion samples (accelerometer / gyroscope axes)
//! from any number of producer threads to two independent consumers:
//!
//! - a live chart, fed in small capped batches on a fixed render tick
//! - durable storage, fed whole time windows once they are old enough
//!   and large enough
//!
//! ## Architecture
//!
//! - **Stream**: [`stream::StreamBuffer`] (render FIFO) and
//!   [`stream::WindowAccumulator`] (open window) each sit behind their own
//!   lock; [`stream::StreamIngest`] feeds both
//! - **Render**: [`stream::BatchDrainer`] dispatches [`stream::RenderUpdate`]s
//!   to a [`stream::RenderConsumer`] such as [`render::SlidingWindowView`]
//! - **Flush**: [`stream::FlushController`] runs the
//!   [`stream::WindowFlushPolicy`] and hands windows to a [`sink::Sink`]
//! - **Sources**: [`source::SampleSource`] implementations push samples
//!   from synthetic generators, text lines, or JSON messages
//!
//! ## Configuration
//!
//! Settings are read from a TOML file, by default under the platform config
//! directory in `dev.motionvis.motionvis-rs/config.toml`. See [`config`].
//!
//! ## Example
//!
//! ```no_run
//! use motionvis_rs::{
//!     render::SlidingWindowView, session::build_sink, source::MockSource, AppConfig,
//!     SessionOptions, StreamSession,
//! };
//!
//! fn main() -> motionvis_rs::Result<()> {
//!     let config = AppConfig::default();
//!     let session = StreamSession::new(config.channel_set()?);
//!     let view = SlidingWindowView::new(session.channels().clone(), config.render.window_points);
//!
//!     let mut handle = session.start(
//!         SessionOptions::from_config(&config)?,
//!         Box::new(view),
//!         build_sink(&config.output),
//!     )?;
//!     handle.spawn_source(Box::new(MockSource::motion(50.0)))?;
//!
//!     std::thread::sleep(std::time::Duration::from_secs(30));
//!     handle.shutdown();
//!     Ok(())
//! }
//! ```

pub mod analysis;
pub mod config;
pub mod error;
pub mod render;
pub mod session;
pub mod sink;
pub mod source;
pub mod stream;
pub mod types;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{MotionVisError, Result, ResultExt};
pub use session::{SessionHandle, SessionOptions, SessionSummary, StreamSession};
pub use stream::{FlushOutcome, FlushSettings, StreamBuffer, StreamIngest, WindowAccumulator};
pub use types::{ChannelSet, FlushReason, FlushedWindow, Sample, StreamClock, Window};

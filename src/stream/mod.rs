//! Streaming core: buffering, render draining and windowed flushing.
//!
//! # Architecture
//!
//! ```text
//!                 ┌──► [StreamBuffer] ──tick──► [BatchDrainer] ──► RenderConsumer
//! SampleSource ──►│
//!  (any thread)   └──► [WindowAccumulator] ──poll──► [FlushController] ──► Sink
//! ```
//!
//! - **Independent locks**: the buffer and the accumulator each own one
//!   mutex; neither is held across rendering or sink I/O.
//! - **No back-pressure**: producers never wait; the render buffer is
//!   unbounded and relies on the drainer keeping pace.
//! - **Fixed-period ticks**: render and flush loops skip overrun deadlines
//!   rather than queueing work.

pub mod accumulator;
pub mod assembler;
pub mod buffer;
pub mod drainer;
pub mod flush;
pub mod ingest;
pub mod ticker;

pub use accumulator::{AccumulatorStatus, WindowAccumulator};
pub use assembler::ChannelAssembler;
pub use buffer::StreamBuffer;
pub use drainer::{AppendBatch, BatchDrainer, RenderConsumer, RenderUpdate, TickStatus};
pub use flush::{
    FlushAttempt, FlushController, FlushHandle, FlushOutcome, FlushRequest, FlushSettings,
    PolicyState, WindowFlushPolicy,
};
pub use ingest::StreamIngest;
pub use ticker::FixedTicker;

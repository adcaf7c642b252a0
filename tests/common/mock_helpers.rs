//! Recording test doubles for sinks and render consumers

use motionvis_rs::sink::{Sink, SinkReport};
use motionvis_rs::stream::RenderUpdate;
use motionvis_rs::{FlushedWindow, MotionVisError, Result};
use std::sync::{Arc, Mutex};

/// Sink that keeps every delivered window; can be told to fail
#[derive(Clone, Default)]
pub struct RecordingSink {
    windows: Arc<Mutex<Vec<FlushedWindow>>>,
    fail: bool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn windows(&self) -> Vec<FlushedWindow> {
        self.windows.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.windows.lock().unwrap().len()
    }
}

impl Sink for RecordingSink {
    fn name(&self) -> &'static str {
        "RecordingSink"
    }

    fn deliver(&mut self, window: &FlushedWindow) -> Result<SinkReport> {
        self.windows.lock().unwrap().push(window.clone());
        if self.fail {
            return Err(MotionVisError::Sink("simulated failure".into()));
        }
        Ok(SinkReport::rows(window.len()))
    }
}

/// Render consumer that records every update it receives
pub fn recording_consumer() -> (
    impl FnMut(RenderUpdate) + Send + 'static,
    Arc<Mutex<Vec<RenderUpdate>>>,
) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    (move |u: RenderUpdate| sink.lock().unwrap().push(u), seen)
}

//! Test data builders for creating stream objects

use motionvis_rs::{ChannelSet, Sample, StreamBuffer, StreamIngest, StreamClock, WindowAccumulator};
use std::sync::Arc;
use std::time::Duration;

/// Builder for creating test Samples
pub struct SampleBuilder {
    timestamp: Duration,
    values: Vec<f64>,
}

impl SampleBuilder {
    pub fn new() -> Self {
        Self {
            timestamp: Duration::ZERO,
            values: vec![0.0, 0.0, 0.0],
        }
    }

    pub fn at_millis(mut self, ms: u64) -> Self {
        self.timestamp = Duration::from_millis(ms);
        self
    }

    pub fn at_secs(mut self, secs: u64) -> Self {
        self.timestamp = Duration::from_secs(secs);
        self
    }

    pub fn values(mut self, values: &[f64]) -> Self {
        self.values = values.to_vec();
        self
    }

    pub fn build(self) -> Sample {
        Sample::new(self.timestamp, self.values)
    }
}

/// A sample whose values encode the producer and sequence number
pub fn tagged_sample(producer: usize, seq: usize) -> Sample {
    Sample::new(
        Duration::from_micros(seq as u64),
        vec![producer as f64, seq as f64, 0.0],
    )
}

/// Buffer, accumulator and ingest wired for X/Y/Z
pub struct TestStream {
    pub buffer: Arc<StreamBuffer>,
    pub accumulator: Arc<WindowAccumulator>,
    pub ingest: StreamIngest,
}

impl TestStream {
    pub fn xyz() -> Self {
        let ingest = StreamIngest::new(ChannelSet::xyz(), StreamClock::new());
        Self {
            buffer: ingest.buffer().clone(),
            accumulator: ingest.accumulator().clone(),
            ingest,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_builder() {
        let sample = SampleBuilder::new().at_secs(2).values(&[1.0, 2.0, 3.0]).build();
        assert_eq!(sample.timestamp(), Duration::from_secs(2));
        assert_eq!(sample.values(), &[1.0, 2.0, 3.0]);
    }
}

//! Synthetic motion source for demos and tests.
//!
//! Each channel runs its own waveform generator. The default set mimics a
//! gently rocking accelerometer: two slow sines on X/Y and gravity on Z.

use super::{SampleSource, SourceStats};
use crate::config::settings::timer_duration;
use crate::error::{MotionVisError, Result};
use crate::stream::{FixedTicker, StreamIngest};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Waveform for one mock channel
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockPattern {
    Constant(f64),
    Sine {
        frequency: f64,
        amplitude: f64,
        offset: f64,
    },
    /// Incrementing counter wrapping within `[min, max]`
    Counter { step: f64, min: f64, max: f64 },
    /// Uniform values within `[min, max]`
    Random { min: f64, max: f64 },
    Sawtooth { period: f64, amplitude: f64 },
    Square { period: f64, amplitude: f64 },
    Triangle { period: f64, amplitude: f64 },
}

impl Default for MockPattern {
    fn default() -> Self {
        MockPattern::Sine {
            frequency: 1.0,
            amplitude: 1.0,
            offset: 0.0,
        }
    }
}

/// Xorshift generator; deterministic per seed
#[derive(Debug, Clone)]
struct Xorshift(u64);

impl Xorshift {
    fn new(seed: u64) -> Self {
        Self(seed.max(1))
    }

    /// Uniform in `[0, 1]`
    fn next_f64(&mut self) -> f64 {
        let mut s = self.0;
        s ^= s << 13;
        s ^= s >> 7;
        s ^= s << 17;
        self.0 = s;
        (s as f64) / (u64::MAX as f64)
    }
}

/// Generator state for one channel
#[derive(Debug, Clone)]
pub struct MockChannel {
    pattern: MockPattern,
    noise: f64,
    counter: f64,
}

impl MockChannel {
    pub fn new(pattern: MockPattern) -> Self {
        let counter = match pattern {
            MockPattern::Counter { min, step, .. } => min - step,
            _ => 0.0,
        };
        Self {
            pattern,
            noise: 0.0,
            counter,
        }
    }

    /// Add uniform noise in `[-amplitude, amplitude]`
    pub fn with_noise(mut self, amplitude: f64) -> Self {
        self.noise = amplitude.abs();
        self
    }

    pub fn pattern(&self) -> MockPattern {
        self.pattern
    }

    fn generate(&mut self, t: f64, rng: &mut Xorshift) -> f64 {
        let base = match self.pattern {
            MockPattern::Constant(v) => v,
            MockPattern::Sine {
                frequency,
                amplitude,
                offset,
            } => offset + amplitude * (2.0 * std::f64::consts::PI * frequency * t).sin(),
            MockPattern::Counter { step, min, max } => {
                self.counter += step;
                if self.counter > max {
                    self.counter = min;
                } else if self.counter < min {
                    self.counter = max;
                }
                self.counter
            }
            MockPattern::Random { min, max } => min + rng.next_f64() * (max - min),
            MockPattern::Sawtooth { period, amplitude } => amplitude * ((t % period) / period),
            MockPattern::Square { period, amplitude } => {
                if t % period < period / 2.0 {
                    amplitude
                } else {
                    -amplitude
                }
            }
            MockPattern::Triangle { period, amplitude } => {
                let phase = t % period;
                let half = period / 2.0;
                if phase < half {
                    amplitude * (2.0 * phase / half - 1.0)
                } else {
                    amplitude * (1.0 - 2.0 * (phase - half) / half)
                }
            }
        };

        if self.noise > 0.0 {
            base + (rng.next_f64() - 0.5) * 2.0 * self.noise
        } else {
            base
        }
    }
}

/// Fixed-rate synthetic source
pub struct MockSource {
    channels: Vec<MockChannel>,
    rate_hz: f64,
    limit: Option<u64>,
    rng: Xorshift,
}

impl MockSource {
    pub fn new(channels: Vec<MockChannel>, rate_hz: f64) -> Self {
        Self {
            channels,
            rate_hz,
            limit: None,
            rng: Xorshift::new(12345),
        }
    }

    /// Accelerometer-like X/Y/Z at `rate_hz`
    pub fn motion(rate_hz: f64) -> Self {
        Self::new(
            vec![
                MockChannel::new(MockPattern::Sine {
                    frequency: 0.5,
                    amplitude: 1.5,
                    offset: 0.0,
                })
                .with_noise(0.05),
                MockChannel::new(MockPattern::Sine {
                    frequency: 0.2,
                    amplitude: 1.0,
                    offset: 0.0,
                })
                .with_noise(0.05),
                MockChannel::new(MockPattern::Constant(9.81)).with_noise(0.1),
            ],
            rate_hz,
        )
    }

    /// Like [`MockSource::motion`], sized to `count` channels
    pub fn for_channels(count: usize, rate_hz: f64) -> Self {
        let mut source = Self::motion(rate_hz);
        source.channels.resize_with(count, || {
            MockChannel::new(MockPattern::default()).with_noise(0.05)
        });
        source
    }

    /// Stop after producing `limit` samples
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Xorshift::new(seed);
        self
    }

    /// One value per channel at `t` seconds
    pub fn next_values(&mut self, t: f64) -> Vec<f64> {
        let rng = &mut self.rng;
        self.channels.iter_mut().map(|c| c.generate(t, rng)).collect()
    }

    fn period(&self) -> Result<Duration> {
        timer_duration(1.0 / self.rate_hz).ok_or_else(|| {
            MotionVisError::Config(format!("Unusable mock sample rate: {} Hz", self.rate_hz))
        })
    }
}

impl SampleSource for MockSource {
    fn name(&self) -> &'static str {
        "MockSource"
    }

    fn run(
        mut self: Box<Self>,
        ingest: &StreamIngest,
        running: &AtomicBool,
    ) -> Result<SourceStats> {
        ingest.channels().check_arity(self.channels.len())?;
        let period = self.period()?;
        tracing::info!(
            "Mock source started ({} channels at {} Hz)",
            self.channels.len(),
            self.rate_hz
        );

        let mut ticker = FixedTicker::new(period);
        let mut stats = SourceStats::default();

        while running.load(Ordering::Relaxed) {
            if self.limit.is_some_and(|limit| stats.produced >= limit) {
                break;
            }
            ticker.wait();
            let timestamp = ingest.clock().elapsed();
            let values = self.next_values(timestamp.as_secs_f64());
            ingest.push_at(timestamp, values)?;
            stats.produced += 1;
        }

        tracing::info!("Mock source stopped: {}", stats);
        Ok(stats)
    }
}

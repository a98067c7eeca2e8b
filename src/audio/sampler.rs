//! Per-tick input level estimation.
//!
//! The sampler converts one PCM frame into a normalized `[0, 1]` energy
//! reading and mirrors it to the notification sink so the presentation layer
//! can render a meter. It must survive teardown races: an empty frame (the
//! device handle was already released) reads as 0.0, never an error.

use crate::notify::NotificationSink;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Level reported when no signal is available.
const NO_SIGNAL: f32 = 0.0;

/// Computes normalized RMS levels and publishes them once per call.
pub struct LevelSampler {
    sink: Arc<dyn NotificationSink>,
    meter: LiveMeter,
}

impl LevelSampler {
    pub fn new(sink: Arc<dyn NotificationSink>) -> Self {
        Self {
            sink,
            meter: LiveMeter::new(),
        }
    }

    /// Shared cell holding the most recent level for poll-style consumers.
    pub fn meter(&self) -> LiveMeter {
        self.meter.clone()
    }

    /// RMS of the frame, clamped to `[0, 1]`. Allocation-free; notifies the
    /// sink with the same value before returning.
    pub fn sample(&self, frame: &[f32]) -> f32 {
        let level = normalized_rms(frame);
        self.meter.set_level(level);
        self.sink.on_level(level);
        level
    }
}

/// Latest level as an atomic f32 cell, cloneable across threads.
#[derive(Clone, Debug)]
pub struct LiveMeter {
    level_bits: Arc<AtomicU32>,
}

impl LiveMeter {
    pub fn new() -> Self {
        Self {
            level_bits: Arc::new(AtomicU32::new(NO_SIGNAL.to_bits())),
        }
    }

    pub fn set_level(&self, level: f32) {
        self.level_bits.store(level.to_bits(), Ordering::Relaxed);
    }

    pub fn level(&self) -> f32 {
        f32::from_bits(self.level_bits.load(Ordering::Relaxed))
    }
}

impl Default for LiveMeter {
    fn default() -> Self {
        Self::new()
    }
}

/// Root-mean-square of mono PCM in `[-1, 1]`, clamped to `[0, 1]`.
pub(crate) fn normalized_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return NO_SIGNAL;
    }
    let energy: f32 = samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32;
    energy.sqrt().clamp(0.0, 1.0)
}

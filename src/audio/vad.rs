//! Voice Activity Detection (VAD) for speech/silence classification.
//!
//! Classifies each normalized level reading against a single energy
//! threshold and tracks how long silence has persisted. There is no
//! smoothing: one voiced sample fully resets the silence clock.

use std::time::{Duration, Instant};

/// Per-session detection parameters. Immutable once a session starts.
#[derive(Debug, Clone, Copy)]
pub struct VadParams {
    /// Normalized energy level above which a sample counts as voiced.
    pub energy_threshold: f32,
    /// Continuous sub-threshold time required to end the session.
    pub silence_timeout: Duration,
    /// Hard cap on session length regardless of activity.
    pub max_duration: Duration,
}

impl Default for VadParams {
    fn default() -> Self {
        Self {
            energy_threshold: 0.1,
            silence_timeout: Duration::from_millis(1_500),
            max_duration: Duration::from_millis(30_000),
        }
    }
}

/// Binary classification of one level reading.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Classification {
    Voiced,
    Silent,
}

/// Tracks the running silence window across level observations.
#[derive(Debug, Clone)]
pub struct VoiceActivityDetector {
    energy_threshold: f32,
    silence_started: Option<Instant>,
}

impl VoiceActivityDetector {
    pub fn new(energy_threshold: f32) -> Self {
        Self {
            energy_threshold,
            silence_started: None,
        }
    }

    /// Classify a reading taken at `now`. A voiced reading clears the silence
    /// start; a silent one records `now` as the start if none is set.
    pub fn observe(&mut self, level: f32, now: Instant) -> Classification {
        if level > self.energy_threshold {
            self.silence_started = None;
            Classification::Voiced
        } else {
            if self.silence_started.is_none() {
                self.silence_started = Some(now);
            }
            Classification::Silent
        }
    }

    /// Time since the current silence window began, or zero while voiced.
    pub fn silence_elapsed(&self, now: Instant) -> Duration {
        match self.silence_started {
            Some(start) => now.saturating_duration_since(start),
            None => Duration::ZERO,
        }
    }

    pub fn reset(&mut self) {
        self.silence_started = None;
    }
}

//! Pure tick state machine for a recording session.
//!
//! All timing decisions take an injected `now`, so silence-timeout and
//! max-duration behavior is testable without a microphone or a wall clock.

use crate::audio::{Classification, VadParams, VoiceActivityDetector};
use std::time::{Duration, Instant};

/// Lifecycle of one recording session.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    AcquiringDevice,
    Recording,
    Finalizing,
    Complete,
    Failed,
}

impl SessionState {
    pub fn label(self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::AcquiringDevice => "acquiring_device",
            SessionState::Recording => "recording",
            SessionState::Finalizing => "finalizing",
            SessionState::Complete => "complete",
            SessionState::Failed => "failed",
        }
    }
}

/// Explains why capture left the Recording state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    SilenceTimeout { tail: Duration },
    MaxDuration,
    Cancelled,
    Error(String),
}

impl StopReason {
    pub fn label(&self) -> &'static str {
        match self {
            StopReason::SilenceTimeout { .. } => "silence_timeout",
            StopReason::MaxDuration => "max_duration",
            StopReason::Cancelled => "cancelled",
            StopReason::Error(_) => "error",
        }
    }
}

/// Metrics collected during capture for observability and debugging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureMetrics {
    pub capture_ms: u64,
    pub voiced_ms: u64,
    pub silence_tail_ms: u64,
    pub frames_processed: usize,
    pub frames_dropped: usize,
    pub stop_reason: StopReason,
}

impl Default for CaptureMetrics {
    fn default() -> Self {
        Self {
            capture_ms: 0,
            voiced_ms: 0,
            silence_tail_ms: 0,
            frames_processed: 0,
            frames_dropped: 0,
            stop_reason: StopReason::MaxDuration,
        }
    }
}

/// Outcome of feeding one level reading through the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickOutcome {
    pub classification: Classification,
    pub stop: Option<StopReason>,
}

/// Drives VAD classification and the two termination conditions.
///
/// Within one tick the ordering is fixed: the level is observed by the VAD
/// before any termination check, so the tick whose sample crosses the
/// silence threshold is the tick that stops the session. The max-duration
/// cap is evaluated before the silence timeout to guarantee termination
/// even if the VAD misbehaves.
pub struct CaptureState {
    params: VadParams,
    vad: VoiceActivityDetector,
    started_at: Instant,
    last_voice_at: Option<Instant>,
    voiced_frames: usize,
    frames_processed: usize,
}

impl CaptureState {
    pub fn new(params: VadParams, started_at: Instant) -> Self {
        Self {
            vad: VoiceActivityDetector::new(params.energy_threshold),
            params,
            started_at,
            last_voice_at: None,
            voiced_frames: 0,
            frames_processed: 0,
        }
    }

    /// Process one level reading taken at `now`.
    pub fn on_tick(&mut self, level: f32, now: Instant) -> TickOutcome {
        let classification = self.vad.observe(level, now);
        if classification == Classification::Voiced {
            self.last_voice_at = Some(now);
            self.voiced_frames += 1;
        }
        self.frames_processed += 1;

        TickOutcome {
            classification,
            stop: self.check_stop(now),
        }
    }

    /// Re-evaluate the termination conditions without a new sample. Used when
    /// a tick elapses with no frame available: the silence clock and the
    /// session clock keep running regardless.
    pub fn on_idle_tick(&mut self, now: Instant) -> Option<StopReason> {
        self.check_stop(now)
    }

    fn check_stop(&self, now: Instant) -> Option<StopReason> {
        if now.saturating_duration_since(self.started_at) >= self.params.max_duration {
            return Some(StopReason::MaxDuration);
        }
        let tail = self.vad.silence_elapsed(now);
        if tail >= self.params.silence_timeout {
            return Some(StopReason::SilenceTimeout { tail });
        }
        None
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.started_at)
    }

    pub fn last_voice_at(&self) -> Option<Instant> {
        self.last_voice_at
    }

    pub fn silence_tail(&self, now: Instant) -> Duration {
        self.vad.silence_elapsed(now)
    }

    pub fn voiced_frames(&self) -> usize {
        self.voiced_frames
    }

    /// Total voiced time given the fixed tick cadence.
    pub fn voiced_time(&self, frame_interval: Duration) -> Duration {
        frame_interval * self.voiced_frames as u32
    }

    pub fn frames_processed(&self) -> usize {
        self.frames_processed
    }
}

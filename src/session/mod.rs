//! Recording session controller.
//!
//! Owns the capture worker thread: acquires the input device, drives the
//! level sampler and VAD once per tick, accumulates encoded fragments, and
//! stops on silence, the max-duration cap, or cancellation. The microphone
//! is a singleton resource; a second `start()` while a session is active
//! fails fast instead of queueing.

mod state;
#[cfg(test)]
mod tests;

pub use state::{CaptureMetrics, CaptureState, SessionState, StopReason, TickOutcome};

use crate::audio::{LevelSampler, Recorder, VadParams, WavEncoder};
use crate::notify::NotificationSink;
use crate::{log_debug, lock_or_recover};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Typed session failures surfaced to the caller. Cancellation is a
/// distinguished outcome, not a fault.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("audio input unavailable: {0}")]
    DeviceUnavailable(String),
    #[error("a recording session is already active")]
    AlreadyRecording,
    #[error("recording cancelled")]
    Cancelled,
    #[error("failed to finalize audio: {0}")]
    Encoder(String),
}

/// Finished clip: WAV bytes ready for upload plus capture metrics.
#[derive(Debug, Clone)]
pub struct RecordedClip {
    pub wav: Vec<u8>,
    pub sample_rate: u32,
    pub metrics: CaptureMetrics,
}

/// Shared cancellation token; setting it is observable within one tick.
#[derive(Clone, Debug)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Knobs for one capture worker; derived from `AppConfig` by the binary.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub vad: VadParams,
    pub frame_interval: Duration,
    pub channel_capacity: usize,
    pub input_device: Option<String>,
    pub log_timings: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            vad: VadParams::default(),
            frame_interval: Duration::from_millis(20),
            channel_capacity: 64,
            input_device: None,
            log_timings: false,
        }
    }
}

/// Handle to an in-flight recording session.
pub struct SessionJob {
    receiver: Receiver<Result<RecordedClip, SessionError>>,
    handle: Option<JoinHandle<()>>,
    cancel_token: CancelToken,
    state: Arc<Mutex<SessionState>>,
}

impl SessionJob {
    /// Request cancellation. Idempotent; the worker observes the token within
    /// one tick, releases the device, and reports `SessionError::Cancelled`.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    /// Current lifecycle state, for presenters that render it.
    pub fn state(&self) -> SessionState {
        *lock_or_recover(&self.state, "session state")
    }

    /// Block until the worker finishes and all resources are released.
    pub fn join(mut self) -> Result<RecordedClip, SessionError> {
        let outcome = self
            .receiver
            .recv()
            .unwrap_or(Err(SessionError::DeviceUnavailable(
                "capture worker exited without reporting".to_string(),
            )));
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        outcome
    }

    /// Cancel and wait for resource release before returning. Calling this
    /// after an earlier `cancel()` reaches the same end state.
    pub fn cancel_and_join(self) -> Result<RecordedClip, SessionError> {
        self.cancel();
        self.join()
    }
}

/// Singleton gate over the capture device plus the session configuration.
pub struct RecordingSession {
    config: SessionConfig,
    sink: Arc<dyn NotificationSink>,
    active: Arc<AtomicBool>,
    state: Arc<Mutex<SessionState>>,
}

impl RecordingSession {
    pub fn new(config: SessionConfig, sink: Arc<dyn NotificationSink>) -> Self {
        Self {
            config,
            sink,
            active: Arc::new(AtomicBool::new(false)),
            state: Arc::new(Mutex::new(SessionState::Idle)),
        }
    }

    /// Observable state of the most recent session.
    pub fn state(&self) -> SessionState {
        *lock_or_recover(&self.state, "session state")
    }

    /// Start a capture worker. Fails fast with `AlreadyRecording` while a
    /// previous session is still active; never blocks or queues.
    pub fn start(&self) -> Result<SessionJob, SessionError> {
        if self
            .active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(SessionError::AlreadyRecording);
        }

        let (tx, rx) = bounded(1);
        let cancel_token = CancelToken::new();
        let worker_cancel = cancel_token.clone();
        let config = self.config.clone();
        let sink = self.sink.clone();
        let state = self.state.clone();
        let guard = ActiveGuard {
            active: self.active.clone(),
            state: state.clone(),
        };

        let handle = thread::spawn(move || {
            // Guard must outlive the send so Idle is restored only after the
            // outcome (and thus resource release) is observable.
            let _guard = guard;
            let outcome = run_capture(&config, sink, &worker_cancel, &state);
            set_state(
                &state,
                match outcome {
                    Ok(_) => SessionState::Complete,
                    Err(_) => SessionState::Failed,
                },
            );
            let _ = tx.send(outcome);
        });

        Ok(SessionJob {
            receiver: rx,
            handle: Some(handle),
            cancel_token,
            state: self.state.clone(),
        })
    }
}

/// Clears the singleton flag and parks the state back at Idle, on every exit
/// path including panics.
struct ActiveGuard {
    active: Arc<AtomicBool>,
    state: Arc<Mutex<SessionState>>,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        set_state(&self.state, SessionState::Idle);
        self.active.store(false, Ordering::SeqCst);
    }
}

fn set_state(state: &Arc<Mutex<SessionState>>, next: SessionState) {
    *lock_or_recover(state, "session state") = next;
}

/// The capture worker body. The cpal stream is created and dropped on this
/// thread (streams are not `Send`); every exit path closes it before the
/// outcome is returned.
fn run_capture(
    config: &SessionConfig,
    sink: Arc<dyn NotificationSink>,
    cancel: &CancelToken,
    state: &Arc<Mutex<SessionState>>,
) -> Result<RecordedClip, SessionError> {
    set_state(state, SessionState::AcquiringDevice);
    sink.on_status("Acquiring microphone...");

    let recorder = Recorder::new(config.input_device.as_deref())
        .map_err(|err| SessionError::DeviceUnavailable(format!("{err:#}")))?;
    log_debug(&format!("capture device: {}", recorder.device_name()));

    let stream = recorder
        .open_frame_stream(config.frame_interval.as_millis() as u64, config.channel_capacity)
        .map_err(|err| SessionError::DeviceUnavailable(format!("{err:#}")))?;

    set_state(state, SessionState::Recording);
    sink.on_status("Listening...");

    let sampler = LevelSampler::new(sink.clone());
    let mut encoder = WavEncoder::new(stream.sample_rate());
    let started_at = Instant::now();
    let mut capture = CaptureState::new(config.vad, started_at);
    let mut stop_reason = StopReason::MaxDuration;

    loop {
        if cancel.is_cancelled() {
            stop_reason = StopReason::Cancelled;
            break;
        }
        match stream.receiver().recv_timeout(config.frame_interval) {
            Ok(frame) => {
                let now = Instant::now();
                // Tick ordering contract: sample, then VAD, then append,
                // then the termination check — the triggering frame is
                // always part of the clip.
                let level = sampler.sample(&frame);
                let outcome = capture.on_tick(level, now);
                encoder.write_fragment(&frame);
                if let Some(reason) = outcome.stop {
                    stop_reason = reason;
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                if let Some(reason) = capture.on_idle_tick(Instant::now()) {
                    stop_reason = reason;
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => {
                stop_reason = StopReason::Error("audio stream disconnected".to_string());
                break;
            }
        }
    }

    set_state(state, SessionState::Finalizing);
    let ended_at = Instant::now();
    let sample_rate = stream.sample_rate();
    let frames_dropped = stream.frames_dropped();
    // Release the device before any outcome becomes observable.
    stream.close();
    sink.on_level(0.0);

    // The token stays live through Finalizing: a cancel that lands after
    // the loop breaks still discards the buffer.
    let stop_reason = resolve_stop_reason(stop_reason, cancel.is_cancelled());

    let metrics = CaptureMetrics {
        capture_ms: capture.elapsed(ended_at).as_millis() as u64,
        voiced_ms: capture.voiced_time(config.frame_interval).as_millis() as u64,
        silence_tail_ms: capture.silence_tail(ended_at).as_millis() as u64,
        frames_processed: capture.frames_processed(),
        frames_dropped,
        stop_reason: stop_reason.clone(),
    };
    log_capture_metrics(&metrics);
    if config.log_timings {
        tracing::info!(
            capture_ms = metrics.capture_ms,
            frames = metrics.frames_processed,
            stop = metrics.stop_reason.label(),
            "capture finished"
        );
    }

    match stop_reason {
        StopReason::Cancelled => {
            sink.on_status("Cancelled");
            Err(SessionError::Cancelled)
        }
        StopReason::Error(msg) => {
            sink.on_status("Recording failed");
            Err(SessionError::DeviceUnavailable(msg))
        }
        StopReason::SilenceTimeout { .. } | StopReason::MaxDuration => {
            sink.on_status("Finalizing...");
            let wav = encoder
                .finalize()
                .map_err(|err| SessionError::Encoder(format!("{err:#}")))?;
            Ok(RecordedClip {
                wav,
                sample_rate,
                metrics,
            })
        }
    }
}

/// Cancellation outranks any stop reason decided by the capture loop.
fn resolve_stop_reason(stop_reason: StopReason, cancelled: bool) -> StopReason {
    if cancelled {
        StopReason::Cancelled
    } else {
        stop_reason
    }
}

/// Emit structured capture metrics for log scraping.
/// Format: `capture_metrics|capture_ms=...|voiced_ms=...|silence_tail_ms=...|frames_processed=...|frames_dropped=...|stop=...`
fn log_capture_metrics(metrics: &CaptureMetrics) {
    log_debug(&format!(
        "capture_metrics|capture_ms={}|voiced_ms={}|silence_tail_ms={}|frames_processed={}|frames_dropped={}|stop={}",
        metrics.capture_ms,
        metrics.voiced_ms,
        metrics.silence_tail_ms,
        metrics.frames_processed,
        metrics.frames_dropped,
        metrics.stop_reason.label()
    ));
}

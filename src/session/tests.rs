use super::state::{CaptureState, SessionState, StopReason};
use super::{resolve_stop_reason, CancelToken, RecordingSession, SessionConfig, SessionError};
use crate::audio::{Classification, VadParams};
use crate::notify::NullNotificationSink;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

const FRAME: Duration = Duration::from_millis(20);

fn params(threshold: f32, silence_ms: u64, max_ms: u64) -> VadParams {
    VadParams {
        energy_threshold: threshold,
        silence_timeout: Duration::from_millis(silence_ms),
        max_duration: Duration::from_millis(max_ms),
    }
}

/// Feeds ticks at a fixed cadence against a synthetic clock until the state
/// machine stops or `limit` ticks elapse. Returns the stop reason and the
/// number of ticks consumed.
fn drive(
    capture: &mut CaptureState,
    base: Instant,
    limit: usize,
    level_at: impl Fn(usize) -> f32,
) -> (Option<StopReason>, usize) {
    for i in 0..limit {
        let now = base + FRAME * (i as u32 + 1);
        let outcome = capture.on_tick(level_at(i), now);
        if outcome.stop.is_some() {
            return (outcome.stop, i + 1);
        }
    }
    (None, limit)
}

#[test]
fn speech_then_silence_stops_on_silence_timeout() {
    let base = Instant::now();
    let mut capture = CaptureState::new(params(0.1, 1_500, 30_000), base);

    // 2s of speech, then sustained silence below the threshold.
    let (stop, ticks) = drive(&mut capture, base, 2_000, |i| if i < 100 { 0.5 } else { 0.05 });

    // Silence starts at t=2020ms, so the timeout lands on the t=3520ms tick.
    assert_eq!(ticks, 176);
    match stop {
        Some(StopReason::SilenceTimeout { tail }) => {
            assert_eq!(tail, Duration::from_millis(1_500));
        }
        other => panic!("expected silence timeout, got {other:?}"),
    }
    assert_eq!(capture.voiced_frames(), 100);
    assert_eq!(capture.frames_processed(), 176);
    assert_eq!(
        capture.elapsed(base + FRAME * 176),
        Duration::from_millis(3_520)
    );
}

#[test]
fn continuous_speech_stops_at_max_duration() {
    let base = Instant::now();
    let mut capture = CaptureState::new(params(0.1, 1_500, 30_000), base);

    let (stop, ticks) = drive(&mut capture, base, 2_000, |_| 0.5);

    assert_eq!(stop, Some(StopReason::MaxDuration));
    assert_eq!(ticks, 1_500);
    assert_eq!(capture.voiced_frames(), 1_500);
    assert_eq!(
        capture.elapsed(base + FRAME * 1_500),
        Duration::from_millis(30_000)
    );
}

#[test]
fn max_duration_wins_when_both_conditions_trigger() {
    let base = Instant::now();
    // Speech for 1s, then silence: both the silence timeout and the cap
    // land on the t=2000ms tick. The cap must win.
    let mut capture = CaptureState::new(params(0.1, 1_000, 2_000), base);

    let (stop, ticks) = drive(&mut capture, base, 1_000, |i| if i < 49 { 0.5 } else { 0.05 });

    assert_eq!(stop, Some(StopReason::MaxDuration));
    assert_eq!(ticks, 100);
}

#[test]
fn stopping_tick_is_counted_as_processed() {
    let base = Instant::now();
    let mut capture = CaptureState::new(params(0.1, 100, 60_000), base);

    let (stop, ticks) = drive(&mut capture, base, 100, |_| 0.0);

    assert!(matches!(stop, Some(StopReason::SilenceTimeout { .. })));
    assert_eq!(capture.frames_processed(), ticks);
}

#[test]
fn level_on_threshold_boundary_counts_as_silent() {
    let base = Instant::now();
    let mut capture = CaptureState::new(params(0.1, 1_500, 30_000), base);

    let outcome = capture.on_tick(0.1, base + FRAME);
    assert_eq!(outcome.classification, Classification::Silent);
    let outcome = capture.on_tick(0.100_1, base + FRAME * 2);
    assert_eq!(outcome.classification, Classification::Voiced);
}

#[test]
fn idle_ticks_enforce_max_duration() {
    let base = Instant::now();
    let mut capture = CaptureState::new(params(0.1, 10_000, 500), base);

    assert_eq!(capture.on_idle_tick(base + Duration::from_millis(499)), None);
    assert_eq!(
        capture.on_idle_tick(base + Duration::from_millis(500)),
        Some(StopReason::MaxDuration)
    );
}

#[test]
fn idle_ticks_do_not_start_the_silence_clock() {
    let base = Instant::now();
    // The silence clock only runs once a frame has been classified; a stream
    // that never delivers frames must fall through to the cap instead.
    let mut capture = CaptureState::new(params(0.1, 100, 10_000), base);

    assert_eq!(capture.on_idle_tick(base + Duration::from_millis(5_000)), None);
    assert_eq!(capture.silence_tail(base + Duration::from_millis(5_000)), Duration::ZERO);
}

#[test]
fn voiced_frame_resets_silence_tail() {
    let base = Instant::now();
    let mut capture = CaptureState::new(params(0.1, 1_500, 30_000), base);

    capture.on_tick(0.05, base + FRAME);
    assert!(capture.silence_tail(base + FRAME * 2) > Duration::ZERO);
    capture.on_tick(0.5, base + FRAME * 2);
    assert_eq!(capture.silence_tail(base + FRAME * 2), Duration::ZERO);
    assert_eq!(capture.last_voice_at(), Some(base + FRAME * 2));
}

#[test]
fn cancellation_during_finalizing_discards_the_clip() {
    // A token set after the capture loop has already chosen a stop reason
    // must still win, so the finished buffer is never handed out.
    assert_eq!(
        resolve_stop_reason(StopReason::MaxDuration, true),
        StopReason::Cancelled
    );
    assert_eq!(
        resolve_stop_reason(
            StopReason::SilenceTimeout {
                tail: Duration::from_millis(1_500)
            },
            true
        ),
        StopReason::Cancelled
    );
    assert_eq!(
        resolve_stop_reason(StopReason::Error("stream lost".to_string()), true),
        StopReason::Cancelled
    );
    assert_eq!(
        resolve_stop_reason(StopReason::MaxDuration, false),
        StopReason::MaxDuration
    );
}

#[test]
fn voiced_time_follows_the_tick_cadence() {
    let base = Instant::now();
    let mut capture = CaptureState::new(params(0.1, 1_500, 30_000), base);
    drive(&mut capture, base, 2_000, |i| if i < 100 { 0.5 } else { 0.05 });
    assert_eq!(capture.voiced_time(FRAME), Duration::from_millis(2_000));
}

#[test]
fn cancel_token_is_idempotent() {
    let token = CancelToken::new();
    assert!(!token.is_cancelled());
    token.cancel();
    token.cancel();
    assert!(token.is_cancelled());
    let clone = token.clone();
    assert!(clone.is_cancelled());
}

#[test]
fn second_start_fails_fast_while_active() {
    let session = RecordingSession::new(SessionConfig::default(), Arc::new(NullNotificationSink));

    session.active.store(true, Ordering::SeqCst);
    match session.start() {
        Err(SessionError::AlreadyRecording) => {}
        other => panic!("expected AlreadyRecording, got {:?}", other.map(|_| ())),
    }
    session.active.store(false, Ordering::SeqCst);
}

#[test]
fn session_returns_to_idle_after_completion() {
    // Device-tolerant: on machines without an input device the worker fails
    // with DeviceUnavailable, otherwise the tiny cap stops it almost
    // immediately. Either way the singleton must reset.
    let config = SessionConfig {
        vad: params(0.1, 50, 100),
        ..SessionConfig::default()
    };
    let session = RecordingSession::new(config, Arc::new(NullNotificationSink));

    let job = session.start().expect("first start must be accepted");
    let outcome = job.join();
    match outcome {
        Ok(clip) => {
            assert!(matches!(
                clip.metrics.stop_reason,
                StopReason::SilenceTimeout { .. } | StopReason::MaxDuration
            ));
            assert!(clip.sample_rate > 0);
        }
        Err(SessionError::DeviceUnavailable(_)) => {}
        Err(other) => panic!("unexpected session error: {other}"),
    }

    assert_eq!(session.state(), SessionState::Idle);
    assert!(!session.active.load(Ordering::SeqCst));

    // The gate reopens for the next session.
    let job = session.start().expect("gate must reopen after join");
    let _ = job.cancel_and_join();
    assert_eq!(session.state(), SessionState::Idle);
}

#[test]
fn cancel_and_join_reports_cancellation() {
    let config = SessionConfig {
        vad: params(0.1, 10_000, 60_000),
        ..SessionConfig::default()
    };
    let session = RecordingSession::new(config, Arc::new(NullNotificationSink));

    let job = session.start().expect("start must be accepted");
    job.cancel();
    let outcome = job.cancel_and_join();
    match outcome {
        Err(SessionError::Cancelled) | Err(SessionError::DeviceUnavailable(_)) => {}
        Ok(_) => panic!("cancelled session must not produce a clip"),
        Err(other) => panic!("unexpected session error: {other}"),
    }
    assert_eq!(session.state(), SessionState::Idle);
}

#[test]
fn stop_reason_labels_are_stable() {
    assert_eq!(StopReason::MaxDuration.label(), "max_duration");
    assert_eq!(
        StopReason::SilenceTimeout { tail: Duration::ZERO }.label(),
        "silence_timeout"
    );
    assert_eq!(StopReason::Cancelled.label(), "cancelled");
    assert_eq!(StopReason::Error(String::new()).label(), "error");
    assert_eq!(SessionState::Recording.label(), "recording");
}

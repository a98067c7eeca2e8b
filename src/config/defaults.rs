//! Default values shared by the CLI definition and its validation rules.

/// Normalized energy level above which a sample counts as voiced.
pub const DEFAULT_VAD_THRESHOLD: f32 = 0.1;

/// Continuous sub-threshold audio required before the session finalizes (ms).
pub const DEFAULT_SILENCE_TIMEOUT_MS: u64 = 1_500;

/// Hard cap on session length regardless of voice activity (ms).
pub const DEFAULT_MAX_DURATION_MS: u64 = 30_000;

/// Capture tick interval; one VAD frame per tick (ms).
pub const DEFAULT_FRAME_MS: u64 = 20;

/// Frame channel capacity between the cpal callback and the session worker.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// How long the supervisor waits for the backend's `PORT <n>` line (ms).
pub const DEFAULT_BACKEND_STARTUP_TIMEOUT_MS: u64 = 15_000;

/// Upper bound accepted for `--max-duration-ms`.
pub const MAX_DURATION_HARD_LIMIT_MS: u64 = 600_000;

/// Tick bounds; the upper bound keeps the cadence at or above 10 Hz so
/// cancellation stays observable within one tick.
pub const MIN_FRAME_MS: u64 = 5;
pub const MAX_FRAME_MS: u64 = 100;

/// Device names containing these would break logging and shell diagnostics.
pub const FORBIDDEN_DEVICE_CHARS: &[char] = &['\n', '\r', '\0'];

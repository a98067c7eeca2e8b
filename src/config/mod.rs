//! Command-line parsing and validation helpers.

mod defaults;
mod validation;

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

pub use defaults::{
    DEFAULT_BACKEND_STARTUP_TIMEOUT_MS, DEFAULT_CHANNEL_CAPACITY, DEFAULT_FRAME_MS,
    DEFAULT_MAX_DURATION_MS, DEFAULT_SILENCE_TIMEOUT_MS, DEFAULT_VAD_THRESHOLD, MAX_FRAME_MS,
    MIN_FRAME_MS,
};

use crate::audio::VadParams;

/// CLI options for the capture host. Validated values keep the audio worker
/// and the spawned backend safe.
#[derive(Debug, Parser, Clone)]
#[command(about = "Jarvis voice capture", author, version)]
pub struct AppConfig {
    /// Preferred audio input device name
    #[arg(long)]
    pub input_device: Option<String>,

    /// Print detected audio input devices and exit
    #[arg(long = "list-input-devices", default_value_t = false)]
    pub list_input_devices: bool,

    /// Voice activity threshold (normalized energy, 0.0-1.0)
    #[arg(long = "vad-threshold", default_value_t = DEFAULT_VAD_THRESHOLD, allow_negative_numbers = true)]
    pub vad_threshold: f32,

    /// Trailing silence required before stopping capture (milliseconds)
    #[arg(long = "silence-timeout-ms", default_value_t = DEFAULT_SILENCE_TIMEOUT_MS)]
    pub silence_timeout_ms: u64,

    /// Maximum capture duration before a hard stop (milliseconds)
    #[arg(long = "max-duration-ms", default_value_t = DEFAULT_MAX_DURATION_MS)]
    pub max_duration_ms: u64,

    /// Capture tick / VAD frame size (milliseconds)
    #[arg(long = "frame-ms", default_value_t = DEFAULT_FRAME_MS)]
    pub frame_ms: u64,

    /// Frame channel capacity between capture callback and session worker
    #[arg(long = "channel-capacity", default_value_t = DEFAULT_CHANNEL_CAPACITY)]
    pub channel_capacity: usize,

    /// Explicit path to the transcription backend executable
    #[arg(long = "backend-bin", env = "JARVIS_BACKEND_BIN")]
    pub backend_bin: Option<PathBuf>,

    /// Skip launching the transcription backend
    #[arg(long = "no-backend", default_value_t = false)]
    pub no_backend: bool,

    /// How long to wait for the backend to announce its port (milliseconds)
    #[arg(
        long = "backend-startup-timeout-ms",
        default_value_t = DEFAULT_BACKEND_STARTUP_TIMEOUT_MS
    )]
    pub backend_startup_timeout_ms: u64,

    /// Where to write the finished WAV clip
    #[arg(long, default_value = "capture.wav")]
    pub output: PathBuf,

    /// Enable file logging (debug)
    #[arg(long = "logs", env = "JARVIS_LOGS", default_value_t = false)]
    pub logs: bool,

    /// Disable all file logging (overrides --logs and log env vars)
    #[arg(long = "no-logs", env = "JARVIS_NO_LOGS", default_value_t = false)]
    pub no_logs: bool,

    /// Enable verbose timing logs
    #[arg(long)]
    pub log_timings: bool,
}

impl AppConfig {
    /// VAD parameters for one recording session; immutable once handed out.
    pub fn vad_params(&self) -> VadParams {
        VadParams {
            energy_threshold: self.vad_threshold,
            silence_timeout: Duration::from_millis(self.silence_timeout_ms),
            max_duration: Duration::from_millis(self.max_duration_ms),
        }
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_ms)
    }

    pub fn backend_startup_timeout(&self) -> Duration {
        Duration::from_millis(self.backend_startup_timeout_ms)
    }
}

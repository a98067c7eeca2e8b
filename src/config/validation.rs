use super::defaults::{FORBIDDEN_DEVICE_CHARS, MAX_DURATION_HARD_LIMIT_MS};
use super::{AppConfig, MAX_FRAME_MS, MIN_FRAME_MS};
use anyhow::{bail, Result};
use clap::Parser;

impl AppConfig {
    /// Parse CLI arguments and validate them right away.
    pub fn parse_args() -> Result<Self> {
        let mut config = Self::parse();
        config.validate()?;
        Ok(config)
    }

    /// Check CLI values and normalize paths.
    pub fn validate(&mut self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.vad_threshold) || !self.vad_threshold.is_finite() {
            bail!(
                "--vad-threshold must be between 0.0 and 1.0, got {}",
                self.vad_threshold
            );
        }
        if self.max_duration_ms == 0 || self.max_duration_ms > MAX_DURATION_HARD_LIMIT_MS {
            bail!(
                "--max-duration-ms must be between 1 and {MAX_DURATION_HARD_LIMIT_MS} ms, got {}",
                self.max_duration_ms
            );
        }
        if self.silence_timeout_ms < 200 || self.silence_timeout_ms > self.max_duration_ms {
            bail!(
                "--silence-timeout-ms must be >=200 and <= --max-duration-ms ({})",
                self.max_duration_ms
            );
        }
        if !(MIN_FRAME_MS..=MAX_FRAME_MS).contains(&self.frame_ms) {
            bail!(
                "--frame-ms must be between {MIN_FRAME_MS} and {MAX_FRAME_MS}, got {}",
                self.frame_ms
            );
        }
        if !(8..=1024).contains(&self.channel_capacity) {
            bail!(
                "--channel-capacity must be between 8 and 1024, got {}",
                self.channel_capacity
            );
        }
        if self.backend_startup_timeout_ms == 0 {
            bail!("--backend-startup-timeout-ms must be greater than zero");
        }
        if let Some(device) = &self.input_device {
            if device.trim().is_empty() {
                bail!("--input-device must not be empty");
            }
            if device.chars().any(|c| FORBIDDEN_DEVICE_CHARS.contains(&c)) {
                bail!("--input-device contains control characters");
            }
        }
        if let Some(backend_bin) = &self.backend_bin {
            if backend_bin.as_os_str().is_empty() {
                bail!("--backend-bin must not be empty");
            }
        }
        Ok(())
    }
}

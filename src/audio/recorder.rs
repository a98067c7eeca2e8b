//! System microphone access via cpal.
//!
//! Handles device enumeration, acquisition, and format conversion. The open
//! stream delivers fixed-size mono f32 frames over a bounded channel so the
//! session worker can tick at its own cadence.

use super::dispatch::FrameDispatcher;
use crate::log_debug;
use anyhow::{anyhow, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, StreamConfig};
use crossbeam_channel::{bounded, Receiver};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Audio input device wrapper.
///
/// Acquiring the device may block on the platform permission prompt; this is
/// the only unbounded wait in the capture path.
pub struct Recorder {
    device: cpal::Device,
}

impl Recorder {
    /// List microphone names so the CLI can expose a human-friendly selector.
    pub fn list_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();
        let devices = host.input_devices().context("no input devices available")?;
        let mut names = Vec::new();
        for device in devices {
            if let Ok(name) = device.name() {
                names.push(name);
            }
        }
        Ok(names)
    }

    /// Acquire a device, optionally forcing a specific one so users can pick
    /// the right microphone when a laptop exposes multiple inputs.
    pub fn new(preferred_device: Option<&str>) -> Result<Self> {
        let host = cpal::default_host();
        let device = match preferred_device {
            Some(name) => {
                let mut devices = host.input_devices().context("no input devices available")?;
                devices
                    .find(|d| d.name().map(|n| n == name).unwrap_or(false))
                    .ok_or_else(|| anyhow!("input device '{name}' not found"))?
            }
            None => host
                .default_input_device()
                .with_context(|| format!("no default input device. {}", mic_permission_hint()))?,
        };
        Ok(Self { device })
    }

    /// Get the name of the active recording device.
    pub fn device_name(&self) -> String {
        self.device
            .name()
            .unwrap_or_else(|_| "Unknown Device".to_string())
    }

    /// Open the input stream and start delivering `frame_ms`-sized mono
    /// frames. The returned handle owns the stream; dropping it releases the
    /// device. Must be called on the thread that will also drop it (cpal
    /// streams are not `Send`).
    pub fn open_frame_stream(&self, frame_ms: u64, channel_capacity: usize) -> Result<FrameStream> {
        let default_config = self
            .device
            .default_input_config()
            .with_context(|| format!("failed to query input format. {}", mic_permission_hint()))?;
        let format = default_config.sample_format();
        let device_config: StreamConfig = default_config.into();
        let sample_rate = device_config.sample_rate.0;
        let channels = usize::from(device_config.channels.max(1));
        let frame_samples = ((u64::from(sample_rate) * frame_ms) / 1000).max(1) as usize;

        log_debug(&format!(
            "Recorder config: format={format:?} sample_rate={sample_rate}Hz channels={channels} frame_samples={frame_samples}"
        ));

        let (sender, receiver) = bounded::<Vec<f32>>(channel_capacity.max(1));
        let dropped = Arc::new(AtomicUsize::new(0));
        let dispatcher = Arc::new(Mutex::new(FrameDispatcher::new(
            frame_samples,
            sender,
            dropped.clone(),
        )));

        // Keep the error callback quiet on the console and mirror issues
        // into the debug log.
        let err_fn = |err| log_debug(&format!("audio_stream_error: {err}"));

        // Convert every supported sample type to f32 up front so the rest of
        // the pipeline stays format-agnostic.
        let stream = match format {
            SampleFormat::F32 => {
                let dispatcher = dispatcher.clone();
                let dropped = dropped.clone();
                self.device.build_input_stream(
                    &device_config,
                    move |data: &[f32], _| {
                        if let Ok(mut pump) = dispatcher.try_lock() {
                            pump.push(data, channels, |sample| sample);
                        } else {
                            dropped.fetch_add(1, Ordering::Relaxed);
                        }
                    },
                    err_fn,
                    None,
                )?
            }
            SampleFormat::I16 => {
                let dispatcher = dispatcher.clone();
                let dropped = dropped.clone();
                self.device.build_input_stream(
                    &device_config,
                    move |data: &[i16], _| {
                        if let Ok(mut pump) = dispatcher.try_lock() {
                            pump.push(data, channels, |sample| sample as f32 / 32_768.0);
                        } else {
                            dropped.fetch_add(1, Ordering::Relaxed);
                        }
                    },
                    err_fn,
                    None,
                )?
            }
            SampleFormat::U16 => {
                let dispatcher = dispatcher.clone();
                let dropped = dropped.clone();
                self.device.build_input_stream(
                    &device_config,
                    move |data: &[u16], _| {
                        if let Ok(mut pump) = dispatcher.try_lock() {
                            pump.push(data, channels, |sample| {
                                (sample as f32 - 32_768.0) / 32_768.0
                            });
                        } else {
                            dropped.fetch_add(1, Ordering::Relaxed);
                        }
                    },
                    err_fn,
                    None,
                )?
            }
            other => return Err(anyhow!("unsupported sample format: {other:?}")),
        };

        stream.play().context("failed to start audio stream")?;

        Ok(FrameStream {
            stream,
            receiver,
            dropped,
            sample_rate,
        })
    }
}

/// Scoped handle over an open input stream. Dropping it (or calling `close`)
/// pauses the stream and releases the device.
pub struct FrameStream {
    stream: cpal::Stream,
    receiver: Receiver<Vec<f32>>,
    dropped: Arc<AtomicUsize>,
    sample_rate: u32,
}

impl FrameStream {
    pub fn receiver(&self) -> &Receiver<Vec<f32>> {
        &self.receiver
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn frames_dropped(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Explicit release so callers can guarantee the device is free before
    /// reporting an outcome.
    pub fn close(self) {
        if let Err(err) = self.stream.pause() {
            log_debug(&format!("failed to pause audio stream: {err}"));
        }
        drop(self.stream);
    }
}

fn mic_permission_hint() -> &'static str {
    #[cfg(target_os = "macos")]
    {
        "macOS: System Settings > Privacy & Security > Microphone (enable your terminal)."
    }
    #[cfg(target_os = "linux")]
    {
        "Linux: check PipeWire/PulseAudio permissions and ensure the device is not muted."
    }
    #[cfg(target_os = "windows")]
    {
        "Windows: Settings > Privacy & Security > Microphone (allow access for your terminal)."
    }
    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
    {
        "Check OS microphone permissions."
    }
}

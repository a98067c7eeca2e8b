//! Headless capture host: supervises the transcription backend and runs one
//! record-until-silence session from the default (or selected) microphone.
//!
//! The window/hotkey presentation layer lives elsewhere and talks to this
//! core through the sink traits; running the binary directly exercises the
//! same path with stderr status lines and a WAV written to disk.

use anyhow::{Context, Result};
use jarvis_capture::audio::Recorder;
use jarvis_capture::config::AppConfig;
use jarvis_capture::notify::StderrSink;
use jarvis_capture::{
    init_logging, init_tracing, log_debug, log_panic, BackendSupervisor, LifecycleState,
    RecordingSession, SessionConfig, SessionError, SupervisorConfig, SupervisorError,
};
use std::fs;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn main() -> Result<()> {
    let config = AppConfig::parse_args()?;
    init_logging(&config);
    init_tracing(&config);
    std::panic::set_hook(Box::new(|info| log_panic(info)));

    if config.list_input_devices {
        return list_input_devices();
    }

    let sink = Arc::new(StderrSink);

    let supervisor = BackendSupervisor::new(sink.clone());
    if config.no_backend {
        log_debug("backend disabled by --no-backend");
    } else {
        let supervisor_config = SupervisorConfig {
            backend_bin: config.backend_bin.clone(),
            startup_timeout: Some(config.backend_startup_timeout()),
        };
        match supervisor.start(&supervisor_config) {
            Ok(()) => wait_for_endpoint(&supervisor, config.backend_startup_timeout()),
            // Degraded mode: recording still works, upload will not.
            Err(SupervisorError::BinaryNotFound) => {
                eprintln!("backend binary not found; continuing without transcription");
            }
            Err(err) => {
                eprintln!("backend could not be launched ({err}); continuing without transcription");
            }
        }
    }

    let session = RecordingSession::new(
        SessionConfig {
            vad: config.vad_params(),
            frame_interval: config.frame_interval(),
            channel_capacity: config.channel_capacity,
            input_device: config.input_device.clone(),
            log_timings: config.log_timings,
        },
        sink,
    );

    let outcome = session
        .start()
        .map_err(anyhow::Error::from)
        .and_then(|job| job.join().map_err(anyhow::Error::from));

    supervisor.stop();

    match outcome {
        Ok(clip) => {
            fs::write(&config.output, &clip.wav)
                .with_context(|| format!("failed to write {}", config.output.display()))?;
            eprintln!(
                "wrote {} ({} ms of audio, stopped: {})",
                config.output.display(),
                clip.metrics.capture_ms,
                clip.metrics.stop_reason.label()
            );
            Ok(())
        }
        Err(err) => match err.downcast_ref::<SessionError>() {
            Some(SessionError::Cancelled) => {
                eprintln!("recording cancelled");
                Ok(())
            }
            _ => Err(err),
        },
    }
}

fn list_input_devices() -> Result<()> {
    match Recorder::list_devices() {
        Ok(names) if names.is_empty() => println!("No audio input devices detected."),
        Ok(names) => {
            println!("Detected audio input devices:");
            for name in names {
                println!("  {name}");
            }
        }
        Err(err) => println!("Failed to list audio input devices: {err:#}"),
    }
    Ok(())
}

/// Block until the backend announces its endpoint or gives up. The
/// supervisor's own watchdog enforces the same deadline on the child; this
/// just keeps the status output honest.
fn wait_for_endpoint(supervisor: &BackendSupervisor, timeout: Duration) {
    let deadline = Instant::now() + timeout;
    loop {
        match supervisor.lifecycle() {
            LifecycleState::Listening => return,
            LifecycleState::Exited | LifecycleState::SpawnFailed | LifecycleState::Stopped => {
                eprintln!("backend did not come up; continuing without transcription");
                return;
            }
            LifecycleState::Starting => {
                if Instant::now() >= deadline {
                    eprintln!("backend startup timed out; continuing without transcription");
                    return;
                }
                thread::sleep(Duration::from_millis(50));
            }
        }
    }
}

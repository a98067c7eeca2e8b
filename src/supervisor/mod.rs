//! Backend process supervisor.
//!
//! Spawns the local transcription service, discovers its listening endpoint
//! from the `PORT <n>` line it prints on stdout, and republishes endpoint
//! availability to the presentation layer. The supervisor owns the child
//! process handle exclusively; nothing else signals or awaits it. It never
//! restarts the child on its own — a fresh `start()` is required.


use crate::log_debug;
use crate::lock_or_recover;
use crate::notify::EndpointSink;
use regex::Regex;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex, OnceLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;

/// How long `stop()` waits after a graceful termination request before
/// escalating to a hard kill.
const STOP_GRACE: Duration = Duration::from_secs(2);
const STOP_POLL: Duration = Duration::from_millis(50);

/// Lifecycle of the supervised backend process.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LifecycleState {
    Stopped,
    Starting,
    Listening,
    Exited,
    SpawnFailed,
}

impl LifecycleState {
    pub fn label(self) -> &'static str {
        match self {
            LifecycleState::Stopped => "stopped",
            LifecycleState::Starting => "starting",
            LifecycleState::Listening => "listening",
            LifecycleState::Exited => "exited",
            LifecycleState::SpawnFailed => "spawn_failed",
        }
    }
}

/// Failures launching the backend. Never fatal to the host: the caller logs
/// them and continues in degraded mode with no endpoint.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("backend binary not found in any candidate location")]
    BinaryNotFound,
    #[error("failed to spawn backend: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Where to look for the backend executable and how long to wait for its
/// port announcement.
#[derive(Debug, Clone, Default)]
pub struct SupervisorConfig {
    /// Explicit override (`--backend-bin` / `JARVIS_BACKEND_BIN`).
    pub backend_bin: Option<PathBuf>,
    /// Startup deadline for the `PORT <n>` line; `None` waits forever.
    pub startup_timeout: Option<Duration>,
}

struct SupervisorState {
    lifecycle: LifecycleState,
    endpoint: Option<String>,
    child: Option<Child>,
}

struct Inner {
    state: Mutex<SupervisorState>,
    delivery: Mutex<()>,
    sink: Arc<dyn EndpointSink>,
}

impl Inner {
    /// Lifecycle transitions are decided under the state lock; the matching
    /// notification is delivered under a dedicated delivery lock acquired
    /// before the state lock is released. Observers therefore see events in
    /// transition order, and sinks may read the supervisor (`endpoint()`,
    /// `lifecycle()`) from inside the callback without deadlocking.
    fn transition(&self, next: LifecycleState, endpoint: Option<String>) {
        let mut state = lock_or_recover(&self.state, "supervisor state");
        let endpoint_changed = state.endpoint != endpoint;
        log_debug(&format!(
            "backend lifecycle: {} -> {}",
            state.lifecycle.label(),
            next.label()
        ));
        state.lifecycle = next;
        state.endpoint = endpoint.clone();
        let event = match next {
            LifecycleState::Listening => Some(endpoint),
            // "No value" means unusable, not an error; always announced.
            LifecycleState::Exited | LifecycleState::SpawnFailed => Some(None),
            LifecycleState::Stopped if endpoint_changed => Some(None),
            _ => None,
        };
        let Some(event) = event else {
            return;
        };
        let delivery = lock_or_recover(&self.delivery, "supervisor delivery");
        drop(state);
        self.sink.on_endpoint_changed(event.as_deref());
        drop(delivery);
    }

    /// Hand the slot back after a launch attempt that failed before any
    /// notifiable transition.
    fn release_reservation(&self, lifecycle: LifecycleState) {
        let mut state = lock_or_recover(&self.state, "supervisor state");
        if state.lifecycle == LifecycleState::Starting {
            state.lifecycle = lifecycle;
        }
    }
}

/// Supervises one backend child process for the lifetime of the host.
pub struct BackendSupervisor {
    inner: Arc<Inner>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl BackendSupervisor {
    pub fn new(sink: Arc<dyn EndpointSink>) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(SupervisorState {
                    lifecycle: LifecycleState::Stopped,
                    endpoint: None,
                    child: None,
                }),
                delivery: Mutex::new(()),
                sink,
            }),
            reader: Mutex::new(None),
        }
    }

    pub fn lifecycle(&self) -> LifecycleState {
        lock_or_recover(&self.inner.state, "supervisor state").lifecycle
    }

    /// Discovered endpoint URL; `Some` exactly while `Listening`.
    pub fn endpoint(&self) -> Option<String> {
        lock_or_recover(&self.inner.state, "supervisor state")
            .endpoint
            .clone()
    }

    /// Locate and spawn the backend, then watch its stdout for the port
    /// announcement on a reader thread.
    pub fn start(&self, config: &SupervisorConfig) -> Result<(), SupervisorError> {
        // Check-and-reserve is one critical section: the slot is claimed as
        // Starting under the lock, so concurrent starts cannot both spawn.
        let reserved_from = {
            let mut state = lock_or_recover(&self.inner.state, "supervisor state");
            if matches!(
                state.lifecycle,
                LifecycleState::Starting | LifecycleState::Listening
            ) {
                log_debug("backend already running");
                return Ok(());
            }
            let previous = state.lifecycle;
            log_debug(&format!(
                "backend lifecycle: {} -> starting",
                previous.label()
            ));
            state.lifecycle = LifecycleState::Starting;
            previous
        };

        let binary = match find_backend_binary(config.backend_bin.as_deref()) {
            Some(path) => path,
            None => {
                self.inner.release_reservation(reserved_from);
                log_debug("backend binary not found; continuing without transcription service");
                return Err(SupervisorError::BinaryNotFound);
            }
        };
        log_debug(&format!("starting backend: {}", binary.display()));
        tracing::info!(binary = %binary.display(), "starting backend");

        // The child binds an ephemeral port and reports it on stdout; its
        // stderr goes straight to ours for diagnostics.
        let spawned = Command::new(&binary)
            .args(["--port", "0"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn();

        let mut child = match spawned {
            Ok(child) => child,
            Err(err) => {
                self.inner.transition(LifecycleState::SpawnFailed, None);
                return Err(SupervisorError::Spawn(err));
            }
        };

        let stdout = match child.stdout.take() {
            Some(stdout) => stdout,
            None => {
                let _ = child.kill();
                let _ = child.wait();
                self.inner.transition(LifecycleState::SpawnFailed, None);
                return Err(SupervisorError::Spawn(std::io::Error::other(
                    "backend stdout was not captured",
                )));
            }
        };

        {
            let mut state = lock_or_recover(&self.inner.state, "supervisor state");
            state.child = Some(child);
        }

        let inner = self.inner.clone();
        let deadline = config.startup_timeout.map(|timeout| Instant::now() + timeout);
        if let Some(deadline) = deadline {
            spawn_startup_watchdog(self.inner.clone(), deadline);
        }
        let handle = thread::spawn(move || read_backend_output(inner, stdout));
        *lock_or_recover(&self.reader, "supervisor reader handle") = Some(handle);
        Ok(())
    }

    /// Graceful shutdown: termination request, bounded grace window, then a
    /// hard kill. Idempotent if the backend is already gone.
    pub fn stop(&self) {
        let child = {
            let mut state = lock_or_recover(&self.inner.state, "supervisor state");
            state.child.take()
        };
        if let Some(mut child) = child {
            terminate_child(&mut child);
            self.inner.transition(LifecycleState::Stopped, None);
        }
        // Reader thread sees EOF once the child dies; reap it so stop()
        // returns only after the last notification was delivered.
        let handle = lock_or_recover(&self.reader, "supervisor reader handle").take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }
}

impl Drop for BackendSupervisor {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Reads the child's stdout line by line. The first `PORT <n>` line yields
/// the loopback endpoint; EOF means the child is gone and gets reaped here
/// unless `stop()` already took it.
fn read_backend_output(inner: Arc<Inner>, stdout: std::process::ChildStdout) {
    let reader = BufReader::new(stdout);
    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                log_debug(&format!("backend stdout read error: {err}"));
                break;
            }
        };
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            log_debug(&format!("backend: {trimmed}"));
        }
        let already_listening = lock_or_recover(&inner.state, "supervisor state").lifecycle
            == LifecycleState::Listening;
        if already_listening {
            continue;
        }
        if let Some(port) = parse_port_line(trimmed) {
            let url = format!("http://127.0.0.1:{port}");
            tracing::info!(%url, "backend listening");
            inner.transition(LifecycleState::Listening, Some(url));
        }
    }

    // EOF: reap and announce, unless stop() already owns the shutdown.
    let child = {
        let mut state = lock_or_recover(&inner.state, "supervisor state");
        state.child.take()
    };
    let Some(mut child) = child else {
        return;
    };
    let status = child.wait();
    match &status {
        Ok(status) => log_debug(&format!("backend exited with {status}")),
        Err(err) => log_debug(&format!("backend wait failed: {err}")),
    }
    tracing::info!(status = ?status.ok(), "backend exited");
    inner.transition(LifecycleState::Exited, None);
}

/// Kills a child still `Starting` once the deadline passes; the reader's
/// normal EOF path then reports the service unusable.
fn spawn_startup_watchdog(inner: Arc<Inner>, deadline: Instant) {
    thread::spawn(move || {
        loop {
            let now = Instant::now();
            {
                let state = lock_or_recover(&inner.state, "supervisor state");
                if state.lifecycle != LifecycleState::Starting || state.child.is_none() {
                    return;
                }
            }
            if now >= deadline {
                break;
            }
            thread::sleep(STOP_POLL.min(deadline - now));
        }
        let mut state = lock_or_recover(&inner.state, "supervisor state");
        if state.lifecycle != LifecycleState::Starting {
            return;
        }
        if let Some(child) = state.child.as_mut() {
            log_debug("backend startup deadline elapsed; terminating child");
            tracing::warn!("backend startup deadline elapsed");
            request_termination(child);
        }
    });
}

/// First existing candidate wins: explicit override, the development
/// launcher script, the packaged binary next to the host executable, then a
/// local dist tree.
fn find_backend_binary(override_path: Option<&Path>) -> Option<PathBuf> {
    let mut candidates: Vec<PathBuf> = Vec::new();
    if let Some(path) = override_path {
        candidates.push(path.to_path_buf());
    }
    if let Ok(cwd) = std::env::current_dir() {
        candidates.push(cwd.join("backend").join("start-backend.sh"));
    }
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            candidates.push(dir.join("backend").join("jarvis-backend"));
        }
    }
    if let Ok(cwd) = std::env::current_dir() {
        candidates.push(cwd.join("dist").join("backend").join("jarvis-backend"));
    }
    candidates
        .into_iter()
        .find(|candidate| candidate.is_file())
}

/// Matches the launch contract line: a literal `PORT` marker followed by the
/// bound port number.
fn parse_port_line(line: &str) -> Option<u16> {
    static PORT_RE: OnceLock<Regex> = OnceLock::new();
    let re = PORT_RE.get_or_init(|| Regex::new(r"PORT (\d+)").expect("port regex should compile"));
    re.captures(line)
        .and_then(|caps| caps.get(1))
        .and_then(|digits| digits.as_str().parse().ok())
}

/// Ask the child to exit; SIGTERM on unix so it can shut down cleanly,
/// straight kill elsewhere.
fn request_termination(child: &mut Child) {
    #[cfg(unix)]
    {
        let pid = child.id() as libc::pid_t;
        // SAFETY: signalling a pid we own; worst case the signal races the
        // child's own exit and is ignored.
        unsafe {
            libc::kill(pid, libc::SIGTERM);
        }
    }
    #[cfg(not(unix))]
    {
        let _ = child.kill();
    }
}

/// Graceful request, bounded wait, then hard kill and reap.
fn terminate_child(child: &mut Child) {
    request_termination(child);
    let deadline = Instant::now() + STOP_GRACE;
    loop {
        match child.try_wait() {
            Ok(Some(_)) => return,
            Ok(None) => {
                if Instant::now() >= deadline {
                    break;
                }
                thread::sleep(STOP_POLL);
            }
            Err(err) => {
                log_debug(&format!("backend try_wait failed: {err}"));
                break;
            }
        }
    }
    let _ = child.kill();
    let _ = child.wait();
}

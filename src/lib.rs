pub mod audio;
pub mod config;
mod lock;
mod logging;
pub mod notify;
pub mod session;
pub mod supervisor;
mod telemetry;

pub(crate) use lock::lock_or_recover;
pub use logging::{crash_log_path, init_logging, log_debug, log_file_path, log_panic};
pub use telemetry::init_tracing;
pub use session::{
    CaptureMetrics, RecordedClip, RecordingSession, SessionConfig, SessionError, SessionJob,
    SessionState, StopReason,
};
pub use supervisor::{BackendSupervisor, LifecycleState, SupervisorConfig, SupervisorError};

//! Notification seams between the capture core and the presentation layer.
//!
//! The core never talks to a UI directly; it pushes level readings, status
//! strings, and endpoint changes through these traits. Callers that do not
//! care about a channel plug in the null-object sinks instead of ad-hoc
//! empty closures.

use std::io::Write;

/// Receives session-side events: live input level and human-readable status.
///
/// Implementations must be cheap and non-blocking; `on_level` fires once per
/// capture tick (&ge;10 Hz) and is best-effort with no delivery guarantee.
pub trait NotificationSink: Send + Sync {
    /// Normalized input level in `[0, 1]`.
    fn on_level(&self, level: f32);

    /// Human-readable status text, not machine-parsed.
    fn on_status(&self, text: &str);
}

/// Receives backend endpoint availability changes.
///
/// `None` means "service currently unusable", not an error. Notifications
/// arrive in the order the underlying lifecycle transitions occur.
pub trait EndpointSink: Send + Sync {
    fn on_endpoint_changed(&self, url: Option<&str>);
}

/// Sink that drops everything. Default when no presenter is attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotificationSink;

impl NotificationSink for NullNotificationSink {
    fn on_level(&self, _level: f32) {}
    fn on_status(&self, _text: &str) {}
}

/// Endpoint sink that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEndpointSink;

impl EndpointSink for NullEndpointSink {
    fn on_endpoint_changed(&self, _url: Option<&str>) {}
}

/// Writes status lines to stderr so headless runs still show progress.
/// Level updates are intentionally not echoed (they arrive every tick).
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrSink;

impl NotificationSink for StderrSink {
    fn on_level(&self, _level: f32) {}

    fn on_status(&self, text: &str) {
        let mut stderr = std::io::stderr().lock();
        let _ = writeln!(stderr, "{text}");
    }
}

impl EndpointSink for StderrSink {
    fn on_endpoint_changed(&self, url: Option<&str>) {
        let mut stderr = std::io::stderr().lock();
        match url {
            Some(url) => {
                let _ = writeln!(stderr, "backend listening at {url}");
            }
            None => {
                let _ = writeln!(stderr, "backend unavailable");
            }
        }
    }
}

//! Notification port
//!
//! User-facing feedback only — notifications carry no control-flow
//! significance. The surrounding application decides how a message reaches
//! the operator (toast, websocket push, …); the engine only emits.

use parking_lot::Mutex;

/// Notification sink injected into the services
pub trait Notifier: Send + Sync {
    /// Report a completed operation
    fn notify_success(&self, message: &str);

    /// Report a failed operation (one line, operator-readable)
    fn notify_error(&self, message: &str);
}

/// Default sink — routes notifications to the tracing pipeline
#[derive(Debug, Clone, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify_success(&self, message: &str) {
        tracing::info!(target: "notify", "{message}");
    }

    fn notify_error(&self, message: &str) {
        tracing::error!(target: "notify", "{message}");
    }
}

/// Notification kind recorded by [`RecordingNotifier`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Success,
    Error,
}

/// A captured notification
#[derive(Debug, Clone)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
}

/// Capturing sink for tests and in-process inspection
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    entries: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain all captured notifications
    pub fn take(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.entries.lock())
    }

    /// Messages of the captured error notifications
    pub fn error_messages(&self) -> Vec<String> {
        self.entries
            .lock()
            .iter()
            .filter(|n| n.kind == NotificationKind::Error)
            .map(|n| n.message.clone())
            .collect()
    }

    /// Messages of the captured success notifications
    pub fn success_messages(&self) -> Vec<String> {
        self.entries
            .lock()
            .iter()
            .filter(|n| n.kind == NotificationKind::Success)
            .map(|n| n.message.clone())
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify_success(&self, message: &str) {
        self.entries.lock().push(Notification {
            kind: NotificationKind::Success,
            message: message.to_string(),
        });
    }

    fn notify_error(&self, message: &str) {
        self.entries.lock().push(Notification {
            kind: NotificationKind::Error,
            message: message.to_string(),
        });
    }
}

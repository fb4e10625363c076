//! Diagnostic telemetry the library emits about *itself* — not the log
//! records it is watching for. Every state transition a test-harness author
//! would want while debugging a flaky wait goes through this trait, mirroring
//! the injectable-events pattern used elsewhere in this codebase for
//! observability surfaces that must stay decoupled from any one tracing
//! backend.

use std::io;
use std::path::Path;
use std::time::Duration;

pub trait WatcherInternalEvents: Send + Sync + Clone + 'static {
    fn emit_file_discovered(&self, path: &Path);

    fn emit_file_watch_error(&self, path: &Path, error: &io::Error);

    fn emit_file_rotated(&self, path: &Path);

    fn emit_file_deleted(&self, path: &Path);

    fn emit_parse_error(&self, message: &str, raw_line: &str);

    fn emit_pattern_violation_appended(&self, raw_line: &str);

    fn emit_retention_flushed(&self, reason: &'static str);

    fn emit_waiter_armed(&self, timeout: Duration, strict: bool);

    fn emit_waiter_completed(&self, outcome: &'static str);
}

/// Default implementation that forwards every event to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEvents;

impl WatcherInternalEvents for TracingEvents {
    fn emit_file_discovered(&self, path: &Path) {
        tracing::debug!(message = "Found file to watch.", ?path);
    }

    fn emit_file_watch_error(&self, path: &Path, error: &io::Error) {
        tracing::warn!(message = "Error watching file.", ?path, %error);
    }

    fn emit_file_rotated(&self, path: &Path) {
        tracing::debug!(message = "Detected file truncation or rotation.", ?path);
    }

    fn emit_file_deleted(&self, path: &Path) {
        tracing::debug!(message = "Watched file disappeared.", ?path);
    }

    fn emit_parse_error(&self, message: &str, raw_line: &str) {
        tracing::trace!(message = "Failed to parse line.", error = %message, raw_line);
    }

    fn emit_pattern_violation_appended(&self, raw_line: &str) {
        tracing::trace!(
            message = "Appended non-matching line to previous record.",
            raw_line
        );
    }

    fn emit_retention_flushed(&self, reason: &'static str) {
        tracing::trace!(message = "Flushed retained record.", reason);
    }

    fn emit_waiter_armed(&self, timeout: Duration, strict: bool) {
        tracing::trace!(message = "Armed waitForMatch.", ?timeout, strict);
    }

    fn emit_waiter_completed(&self, outcome: &'static str) {
        tracing::trace!(message = "waitForMatch completed.", outcome);
    }
}

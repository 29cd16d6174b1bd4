//! # Diagnostics Sink
//!
//! Components report recoverable conditions (unmapped decoder access, bus
//! contention, reset-vector fallback) and lifecycle events through a
//! [`Diagnostics`] implementation injected at assembly time. Nothing in the
//! simulator depends on what the sink does with an entry.
//!
//! - [`TracingDiagnostics`] forwards every entry to the `tracing` macros. The
//!   application decides which subscriber, if any, receives them.
//! - [`CapturedDiagnostics`] keeps entries in memory so tests and harnesses can
//!   assert on them.

use std::fmt;
use std::sync::{Arc, Mutex};

/// Severity of a diagnostic entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::Debug => "debug",
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        f.write_str(label)
    }
}

/// Logging capability shared by every component.
///
/// `component` names the emitting chip or subsystem (e.g. `"cpu"`,
/// `"decoder"`, `"AT28C256"`).
pub trait Diagnostics: Send + Sync {
    fn log(&self, severity: Severity, component: &str, message: &str);

    /// Whether entries of `severity` are recorded at all. Callers may skip
    /// formatting a message the sink would drop.
    fn enabled(&self, _severity: Severity) -> bool {
        true
    }

    fn debug(&self, component: &str, message: &str) {
        self.log(Severity::Debug, component, message);
    }

    fn info(&self, component: &str, message: &str) {
        self.log(Severity::Info, component, message);
    }

    fn warning(&self, component: &str, message: &str) {
        self.log(Severity::Warning, component, message);
    }

    fn error(&self, component: &str, message: &str) {
        self.log(Severity::Error, component, message);
    }
}

/// Sink that forwards to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
    fn log(&self, severity: Severity, component: &str, message: &str) {
        match severity {
            Severity::Debug => tracing::debug!(component, "{message}"),
            Severity::Info => tracing::info!(component, "{message}"),
            Severity::Warning => tracing::warn!(component, "{message}"),
            Severity::Error => tracing::error!(component, "{message}"),
        }
    }

    fn enabled(&self, severity: Severity) -> bool {
        match severity {
            Severity::Debug => tracing::enabled!(tracing::Level::DEBUG),
            Severity::Info => tracing::enabled!(tracing::Level::INFO),
            Severity::Warning => tracing::enabled!(tracing::Level::WARN),
            Severity::Error => tracing::enabled!(tracing::Level::ERROR),
        }
    }
}

/// Returns the default sink as a shareable handle.
pub fn tracing_sink() -> Arc<dyn Diagnostics> {
    Arc::new(TracingDiagnostics)
}

/// A single captured diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub severity: Severity,
    pub component: String,
    pub message: String,
}

/// Sink that records every entry in memory.
///
/// # Examples
///
/// ```
/// use sim65c02::{CapturedDiagnostics, Diagnostics, Severity};
///
/// let sink = CapturedDiagnostics::new();
/// sink.error("decoder", "Unmapped read at 0x5000");
///
/// assert!(sink.contains(Severity::Error, "0x5000"));
/// assert_eq!(sink.entries().len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct CapturedDiagnostics {
    entries: Mutex<Vec<Entry>>,
}

impl CapturedDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of everything recorded so far.
    pub fn entries(&self) -> Vec<Entry> {
        self.lock().clone()
    }

    /// Returns true if an entry of `severity` contains `needle` in its message.
    pub fn contains(&self, severity: Severity, needle: &str) -> bool {
        self.lock()
            .iter()
            .any(|e| e.severity == severity && e.message.contains(needle))
    }

    /// Number of entries recorded at `severity`.
    pub fn count(&self, severity: Severity) -> usize {
        self.lock().iter().filter(|e| e.severity == severity).count()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Entry>> {
        // A panicking test thread must not hide what was logged before it.
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Diagnostics for CapturedDiagnostics {
    fn log(&self, severity: Severity, component: &str, message: &str) {
        self.lock().push(Entry {
            severity,
            component: component.to_string(),
            message: message.to_string(),
        });
    }
}

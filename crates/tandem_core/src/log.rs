//! Process-wide logging sink.
//!
//! The sink is a minimum level plus a callback `(level, message)`. The
//! default callback forwards to [`tracing`] events so a host that has a
//! subscriber installed picks the lines up; embedders that want the raw
//! stream replace the callback with [`set_callback`].
//!
//! Both knobs are process-lifetime state with last-writer-wins
//! semantics. This module does not synchronize configuration changes
//! against concurrent emission; callers needing a strict ordering must
//! serialize externally.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicU8, Ordering};

/// Severity of a log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogLevel {
    /// Verbose diagnostics.
    Debug = 0,
    /// Informational messages.
    Info = 1,
    /// Something unexpected but survivable.
    Warning = 2,
    /// An operation failed.
    Error = 3,
}

impl LogLevel {
    /// Short name used by the default callback.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Debug,
            1 => Self::Info,
            2 => Self::Warning,
            _ => Self::Error,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A replacement log callback.
pub type LogCallback = Box<dyn Fn(LogLevel, &str) + Send + Sync>;

enum Sink {
    Default,
    Custom(LogCallback),
    Disabled,
}

static MIN_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Warning as u8);
static SINK: RwLock<Sink> = RwLock::new(Sink::Default);

/// Sets the minimum level a line must have to reach the callback.
pub fn set_level(level: LogLevel) {
    MIN_LEVEL.store(level as u8, Ordering::Relaxed);
}

/// Returns the current minimum level.
#[must_use]
pub fn level() -> LogLevel {
    LogLevel::from_u8(MIN_LEVEL.load(Ordering::Relaxed))
}

/// Replaces the log callback.
pub fn set_callback<F>(callback: F)
where
    F: Fn(LogLevel, &str) + Send + Sync + 'static,
{
    *SINK.write() = Sink::Custom(Box::new(callback));
}

/// Restores the default callback (tracing events).
pub fn reset_callback() {
    *SINK.write() = Sink::Default;
}

/// Removes the callback entirely. Only assertion failures still reach
/// the process error stream.
pub fn disable_callback() {
    *SINK.write() = Sink::Disabled;
}

/// Emits a line if it passes the level gate and a callback is present.
pub fn write(level: LogLevel, message: &str) {
    if level < self::level() {
        return;
    }
    write_unfiltered(level, message);
}

/// Emits a line regardless of the level gate, falling back to the
/// process error stream when no callback can take it. Used for
/// assertion failures, which must never be silently lost.
pub(crate) fn write_always(level: LogLevel, message: &str) {
    if !sink_present() || level < self::level() {
        eprintln!("{message}");
    }
    write_unfiltered(level, message);
}

pub(crate) fn sink_present() -> bool {
    !matches!(*SINK.read(), Sink::Disabled)
}

fn write_unfiltered(level: LogLevel, message: &str) {
    match &*SINK.read() {
        Sink::Default => emit_tracing(level, message),
        Sink::Custom(callback) => callback(level, message),
        Sink::Disabled => {}
    }
}

fn emit_tracing(level: LogLevel, message: &str) {
    match level {
        LogLevel::Debug => tracing::debug!(target: "tandem", "{message}"),
        LogLevel::Info => tracing::info!(target: "tandem", "{message}"),
        LogLevel::Warning => tracing::warn!(target: "tandem", "{message}"),
        LogLevel::Error => tracing::error!(target: "tandem", "{message}"),
    }
}

/// Serializes tests that reconfigure the process-wide sink.
#[cfg(test)]
pub(crate) fn test_lock() -> parking_lot::MutexGuard<'static, ()> {
    static GUARD: parking_lot::Mutex<()> = parking_lot::Mutex::new(());
    GUARD.lock()
}

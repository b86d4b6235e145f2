//! Logging sink used by the guard and its failure actions.

use std::fmt;

/// Log level understood by [`Logger`] implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warning,
    Error,
    Fatal,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
            LogLevel::Fatal => "FATAL",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Host-provided log sink.
pub trait Logger: Send + Sync {
    fn log(&self, level: LogLevel, message: &str);
}

/// Forwards to `tracing` events under the `csrfguard` target.
///
/// `Fatal` has no tracing counterpart and is emitted as an error with
/// `fatal = true`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Trace => tracing::trace!(target: "csrfguard", "{}", message),
            LogLevel::Debug => tracing::debug!(target: "csrfguard", "{}", message),
            LogLevel::Info => tracing::info!(target: "csrfguard", "{}", message),
            LogLevel::Warning => tracing::warn!(target: "csrfguard", "{}", message),
            LogLevel::Error => tracing::error!(target: "csrfguard", "{}", message),
            LogLevel::Fatal => tracing::error!(target: "csrfguard", fatal = true, "{}", message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering() {
        assert!(LogLevel::Trace < LogLevel::Debug);
        assert!(LogLevel::Warning < LogLevel::Error);
        assert!(LogLevel::Error < LogLevel::Fatal);
    }

    #[test]
    fn test_level_names() {
        assert_eq!(LogLevel::Warning.to_string(), "WARNING");
        assert_eq!(LogLevel::Fatal.as_str(), "FATAL");
    }

    #[test]
    fn test_tracing_logger_accepts_all_levels() {
        let logger = TracingLogger;
        for level in [
            LogLevel::Trace,
            LogLevel::Debug,
            LogLevel::Info,
            LogLevel::Warning,
            LogLevel::Error,
            LogLevel::Fatal,
        ] {
            logger.log(level, "message");
        }
    }
}

//! Structured logging, collected in-process rather than emitted through
//! `log`/`tracing`.
//!
//! A bounded ring of [`LogEntry`] values filtered by level and subsystem, so
//! a host (the CLI, a test) can pull entries back out rather than the
//! library dictating a global logging backend.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "TRACE"),
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: LogLevel,
    pub enable_detector: bool,
    pub enable_framing: bool,
    pub enable_timing: bool,
    pub max_entries: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            enable_detector: true,
            enable_framing: true,
            enable_timing: true,
            max_entries: 1000,
        }
    }
}

impl LogConfig {
    pub fn verbose() -> Self {
        Self { level: LogLevel::Debug, max_entries: 5000, ..Default::default() }
    }

    pub fn quiet() -> Self {
        Self {
            level: LogLevel::Warn,
            enable_detector: false,
            enable_framing: false,
            enable_timing: false,
            max_entries: 100,
        }
    }

    pub fn disabled() -> Self {
        Self { level: LogLevel::Error, max_entries: 0, ..Self::quiet() }
    }
}

#[derive(Debug, Clone)]
pub struct LogEntry {
    pub level: LogLevel,
    pub subsystem: &'static str,
    pub message: String,
}

/// Bounded in-process log, filtered by level and subsystem.
#[derive(Debug, Clone)]
pub struct DecoderLogger {
    config: LogConfig,
    entries: Vec<LogEntry>,
}

impl DecoderLogger {
    pub fn new(config: LogConfig) -> Self {
        let capacity = config.max_entries.min(1000);
        Self { config, entries: Vec::with_capacity(capacity) }
    }

    fn subsystem_enabled(&self, subsystem: &str) -> bool {
        match subsystem {
            "SFE" | "BITRATE" => self.config.enable_timing,
            "NFCA" | "NFCB" | "NFCF" | "ISO7816" => self.config.enable_detector,
            "FRAME" | "DISPATCH" => self.config.enable_framing,
            _ => true,
        }
    }

    pub fn log(&mut self, level: LogLevel, subsystem: &'static str, message: impl fmt::Display) {
        if level < self.config.level || !self.subsystem_enabled(subsystem) {
            return;
        }
        if self.config.max_entries == 0 {
            return;
        }
        if self.entries.len() >= self.config.max_entries {
            self.entries.remove(0);
        }
        self.entries.push(LogEntry { level, subsystem, message: message.to_string() });
    }

    pub fn trace(&mut self, subsystem: &'static str, message: impl fmt::Display) {
        self.log(LogLevel::Trace, subsystem, message);
    }
    pub fn debug(&mut self, subsystem: &'static str, message: impl fmt::Display) {
        self.log(LogLevel::Debug, subsystem, message);
    }
    pub fn info(&mut self, subsystem: &'static str, message: impl fmt::Display) {
        self.log(LogLevel::Info, subsystem, message);
    }
    pub fn warn(&mut self, subsystem: &'static str, message: impl fmt::Display) {
        self.log(LogLevel::Warn, subsystem, message);
    }
    pub fn error(&mut self, subsystem: &'static str, message: impl fmt::Display) {
        self.log(LogLevel::Error, subsystem, message);
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_below_configured_level_are_dropped() {
        let mut logger = DecoderLogger::new(LogConfig { level: LogLevel::Warn, ..Default::default() });
        logger.debug("NFCA", "locked rate 0");
        logger.warn("NFCA", "lock lost");
        assert_eq!(logger.entries().len(), 1);
        assert_eq!(logger.entries()[0].level, LogLevel::Warn);
    }

    #[test]
    fn bounded_log_drops_oldest() {
        let mut logger = DecoderLogger::new(LogConfig { max_entries: 2, ..LogConfig::verbose() });
        logger.info("FRAME", "one");
        logger.info("FRAME", "two");
        logger.info("FRAME", "three");
        assert_eq!(logger.entries().len(), 2);
        assert_eq!(logger.entries()[0].message, "two");
    }
}

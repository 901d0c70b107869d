//! Log sink shared by the protocol engine.
//!
//! Callers can install a callback receiving `(message, level)` pairs, e.g.
//! to forward protocol traces to connected clients. Without a callback the
//! messages go to the `log` facade.

use serde::{Deserialize, Serialize};

/// Verbosity levels, from silent to protocol traces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    None,
    Error,
    Warn,
    Info,
    #[default]
    Debug,
}

/// Callback receiving log messages.
pub type LogCallback = Box<dyn FnMut(&str, LogLevel) + Send>;

pub struct Logger {
    callback: Option<LogCallback>,
    level: LogLevel,
}

impl Logger {
    pub fn new(level: LogLevel) -> Self {
        Self {
            callback: None,
            level,
        }
    }

    pub fn set_callback(&mut self, callback: LogCallback) {
        self.callback = Some(callback);
    }

    pub fn set_level(&mut self, level: LogLevel) {
        self.level = level;
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    /// Whether messages at `level` would be emitted.
    pub fn enabled(&self, level: LogLevel) -> bool {
        level != LogLevel::None && level <= self.level
    }

    pub fn log(&mut self, message: &str, level: LogLevel) {
        if !self.enabled(level) {
            return;
        }
        match self.callback.as_mut() {
            Some(callback) => callback(message, level),
            None => match level {
                LogLevel::Error => log::error!("{}", message),
                LogLevel::Warn => log::warn!("{}", message),
                LogLevel::Info => log::info!("{}", message),
                LogLevel::Debug => log::debug!("{}", message),
                LogLevel::None => {}
            },
        }
    }

    pub fn error(&mut self, message: &str) {
        self.log(message, LogLevel::Error);
    }

    pub fn warn(&mut self, message: &str) {
        self.log(message, LogLevel::Warn);
    }

    pub fn info(&mut self, message: &str) {
        self.log(message, LogLevel::Info);
    }

    pub fn debug(&mut self, message: &str) {
        self.log(message, LogLevel::Debug);
    }

    /// Log a hex dump of raw bus data. The dump is only built when Debug
    /// output is enabled.
    pub fn hex(&mut self, prefix: &str, data: &[u8]) {
        if !self.enabled(LogLevel::Debug) {
            return;
        }
        let dump: String = data.iter().map(|b| format!("{:02X} ", b)).collect();
        self.debug(&format!("{}{}", prefix, dump));
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new(LogLevel::default())
    }
}

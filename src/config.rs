//! Construction-time configuration of the battery interface.

use serde::{Deserialize, Serialize};

use crate::logger::LogLevel;

/// Settings fixed when the interface is built.
///
/// The pin numbers identify the wiring for logs and for callers that build
/// their HAL pins from configuration; the engine itself owns the pin
/// objects handed to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BmsConfig {
    #[serde(default = "default_onewire_pin")]
    pub onewire_pin: u8,

    #[serde(default = "default_enable_pin")]
    pub enable_pin: u8,

    #[serde(default)]
    pub log_level: LogLevel,

    /// Probe each hidden register twice and discard disagreeing readings
    #[serde(default)]
    pub verify_reads: bool,
}

fn default_onewire_pin() -> u8 {
    4
}

fn default_enable_pin() -> u8 {
    5
}

impl Default for BmsConfig {
    fn default() -> Self {
        Self {
            onewire_pin: default_onewire_pin(),
            enable_pin: default_enable_pin(),
            log_level: LogLevel::default(),
            verify_reads: false,
        }
    }
}

//! Error types for Makita battery operations.

use thiserror::Error;

/// Result type alias for battery operations.
pub type Result<T> = std::result::Result<T, BmsError>;

/// Outcomes the protocol engine reports to its caller.
///
/// Bit and byte level transport problems never show up here: a bad bus
/// yields bad data, which the decoders catch through sentinel values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BmsError {
    /// Bus never went idle, or no presence pulse followed the reset
    #[error("Bus timeout: no battery responded to reset")]
    BusTimeout,

    /// A data or action command was issued before identification
    #[error("Battery not identified, read static data first")]
    Unidentified,

    /// The identified controller does not support the command
    #[error("Operation not supported by this controller: {operation}")]
    UnsupportedOperation {
        /// Name of the rejected operation
        operation: &'static str,
    },
}

//! Error types shared by the workspace crates.

use thiserror::Error;

/// Error types covering configuration, hardware setup, and timing faults.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SbcError {
    /// Configuration or initialization error.
    #[error("configuration error: {0}")]
    Config(String),

    /// GPIO chip open or pin claim/read/write failure.
    #[error("GPIO error on pin {pin}: {message}")]
    Gpio {
        /// BCM pin number, or `u8::MAX` for chip-level failures.
        pin: u8,
        /// Description of the failure.
        message: String,
    },

    /// I2C bus open, address, or transfer failure.
    #[error("I2C error: {0}")]
    I2c(String),

    /// Monotonic clock read or absolute wait failure.
    #[error("clock error: {0}")]
    Clock(String),

    /// I/O operation error.
    #[error("I/O error: {0}")]
    Io(String),

    /// Invalid state transition attempted.
    #[error("invalid state transition from {from} to {to}")]
    InvalidStateTransition {
        /// Source state.
        from: String,
        /// Attempted target state.
        to: String,
    },
}

/// Pin value used in [`SbcError::Gpio`] for failures that are not tied to a pin.
pub const CHIP_LEVEL: u8 = u8::MAX;

impl SbcError {
    /// Build a GPIO error for the given pin.
    pub fn gpio(pin: u8, message: impl Into<String>) -> Self {
        Self::Gpio {
            pin,
            message: message.into(),
        }
    }

    /// Build a chip-level GPIO error (open/close).
    pub fn chip(message: impl Into<String>) -> Self {
        Self::gpio(CHIP_LEVEL, message)
    }
}

impl From<std::io::Error> for SbcError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

/// Convenience type alias for fallible operations across the workspace.
pub type SbcResult<T> = Result<T, SbcError>;

//! Error types for Linux GPIO operations

use thiserror::Error;

/// Linux GPIO specific errors
#[derive(Debug, Error)]
pub enum LinuxGpioError {
    /// Failed to request GPIO lines
    #[error("Failed to request GPIO lines on '{device}': {source}")]
    LineRequestFailed {
        device: String,
        #[source]
        source: gpiocdev::Error,
    },

    /// GPIO chip or device not specified
    #[error("No GPIO chip specified. Use dev=/dev/gpiochipN or gpiochip=N")]
    NoDevice,

    /// The role assignment is unusable
    #[error("Invalid pin assignment: {0}")]
    InvalidPins(#[from] atfprog_core::Error),
}

/// Result type for Linux GPIO operations
pub type Result<T> = std::result::Result<T, LinuxGpioError>;

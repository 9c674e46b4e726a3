//! Error types for atfprog-core
//!
//! This module provides a no_std compatible error type that can be used
//! throughout the crate. File loading and configuration (std only) wrap it in
//! richer error types of their own.

use core::fmt;

use crate::pins::Pin;

/// What was wrong with a fuse record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatErrorKind {
    /// The 5-digit base address field is missing or not decimal
    InvalidAddress,
    /// The character after the address is not whitespace
    InvalidDelimiter,
    /// The record writes past the end of the fuse array
    OutOfRange {
        /// Base address of the record
        base: usize,
        /// Number of fuse characters in the record
        len: usize,
    },
}

/// A malformed fuse record in a JEDEC file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatError {
    /// 1-based line number of the offending record
    pub line: usize,
    /// Failure details
    pub kind: FormatErrorKind,
}

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    // Fuse map errors
    /// Malformed or out-of-range fuse record
    Format(FormatError),
    /// More matrix rows than the device has addresses for
    TooManyRows {
        /// Number of rows supplied
        rows: usize,
    },

    // Line errors
    /// Driving an output line failed
    LineWriteFailed {
        /// Physical line offset
        pin: Pin,
    },
    /// Sampling an input line failed
    LineReadFailed {
        /// Physical line offset
        pin: Pin,
    },
    /// Changing a line's direction failed
    LineConfigFailed {
        /// Physical line offset
        pin: Pin,
    },

    // Configuration errors
    /// Two roles that must be distinct resolve to the same physical line
    PinConflict {
        /// Physical line offset
        pin: Pin,
    },
    /// WRITE and DATA_IN drove their shared line to different levels in one step
    SharedLineConflict {
        /// Physical line offset
        pin: Pin,
    },
    /// A protocol delay is shorter than the device minimum
    TimingBelowMinimum,
}

impl fmt::Display for FormatErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidAddress => write!(f, "invalid fuse address"),
            Self::InvalidDelimiter => write!(f, "missing delimiter after fuse address"),
            Self::OutOfRange { base, len } => write!(
                f,
                "record of {} fuses at {} exceeds the fuse array",
                len, base
            ),
        }
    }
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.kind)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Format(e) => write!(f, "malformed fuse map: {}", e),
            Self::TooManyRows { rows } => {
                write!(f, "{} matrix rows given, device has at most 44", rows)
            }
            Self::LineWriteFailed { pin } => write!(f, "failed to drive GPIO line {}", pin),
            Self::LineReadFailed { pin } => write!(f, "failed to read GPIO line {}", pin),
            Self::LineConfigFailed { pin } => {
                write!(f, "failed to configure GPIO line {}", pin)
            }
            Self::PinConflict { pin } => {
                write!(f, "GPIO line {} is assigned to more than one role", pin)
            }
            Self::SharedLineConflict { pin } => write!(
                f,
                "WRITE and DATA_IN drove shared GPIO line {} to different levels",
                pin
            ),
            Self::TimingBelowMinimum => {
                write!(f, "programming delay shorter than the device minimum")
            }
        }
    }
}

impl From<FormatError> for Error {
    fn from(e: FormatError) -> Self {
        Self::Format(e)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for FormatError {}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;

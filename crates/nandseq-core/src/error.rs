//! Error types for nandseq-core
//!
//! This module provides a no_std compatible error type that can be used
//! throughout the crate.

use core::fmt;

use crate::machine::Rejection;
use crate::status::Status;

/// Failure reported by the I/O collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoFault {
    /// Register access failed on the bus
    Bus,
    /// DMA transfer reported an error
    Dma,
    /// Device reported the array operation failed (status FAIL bit)
    DeviceFailed,
    /// Device still busy when it was expected to be ready
    Busy,
    /// Device or host address outside the backing storage
    OutOfBounds,
}

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    // Protocol errors
    /// An event was rejected by the state machine
    ProtocolViolation(Rejection),
    /// The operation was abandoned before reaching the terminal state
    Abandoned,

    // I/O errors
    /// The I/O collaborator failed to execute an emitted event
    Io(IoFault),

    // Request errors
    /// The INVALID operation cannot be executed
    InvalidOperation,
    /// Payload does not belong to the requested operation
    PayloadMismatch,
    /// Transfer length is zero or runs past the page or device end
    InvalidLength,
    /// Host buffer is outside the configured DMA window
    BufferOutOfWindow,
    /// Device configuration is inconsistent
    InvalidConfig,

    // Internal errors
    /// Illegal event status transition
    InvalidStatusTransition {
        /// Status before the transition
        from: Status,
        /// Requested status
        to: Status,
    },
    /// More lower-layer events than fit in one emission
    EmissionOverflow,
}

impl Error {
    /// Returns true if this is a protocol violation
    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, Self::ProtocolViolation(_))
    }

    /// Returns true if DO_TRANSFER was rejected because required address
    /// components were missing
    pub fn is_incomplete_address(&self) -> bool {
        matches!(self, Self::ProtocolViolation(r) if r.is_incomplete_address())
    }

    /// The rejection, if this is a protocol violation
    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Self::ProtocolViolation(r) => Some(r),
            _ => None,
        }
    }
}

impl fmt::Display for IoFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bus => write!(f, "register bus access failed"),
            Self::Dma => write!(f, "DMA transfer failed"),
            Self::DeviceFailed => write!(f, "device reported operation failure"),
            Self::Busy => write!(f, "device busy"),
            Self::OutOfBounds => write!(f, "address outside device or host memory"),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProtocolViolation(r) => write!(f, "protocol violation: {}", r),
            Self::Abandoned => write!(f, "operation abandoned"),
            Self::Io(fault) => write!(f, "I/O failure: {}", fault),
            Self::InvalidOperation => write!(f, "invalid operation"),
            Self::PayloadMismatch => write!(f, "payload does not match operation"),
            Self::InvalidLength => write!(f, "invalid transfer length"),
            Self::BufferOutOfWindow => write!(f, "buffer outside DMA window"),
            Self::InvalidConfig => write!(f, "invalid device configuration"),
            Self::InvalidStatusTransition { from, to } => {
                write!(f, "illegal status transition {} -> {}", from, to)
            }
            Self::EmissionOverflow => write!(f, "too many lower-layer events"),
        }
    }
}

impl From<IoFault> for Error {
    fn from(fault: IoFault) -> Self {
        Self::Io(fault)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;

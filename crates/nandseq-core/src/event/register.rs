//! Register-level (L0) events

use core::fmt;

/// A register-level event (L0)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegisterEvent {
    /// Wait for the given duration (microseconds)
    TimeWait(u32),
    /// Read a controller register
    ReadRegister {
        /// Register offset
        offset: u32,
    },
    /// Write a controller register
    WriteRegister {
        /// Register offset
        offset: u32,
        /// Value to write
        value: u32,
    },
}

impl fmt::Display for RegisterEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TimeWait(us) => write!(f, "TIME_WAIT({})", us),
            Self::ReadRegister { offset } => write!(f, "READ_REGISTER(offset=0x{:02x})", offset),
            Self::WriteRegister { offset, value } => write!(
                f,
                "WRITE_REGISTER(offset=0x{:02x}, value=0x{:02x})",
                offset, value
            ),
        }
    }
}

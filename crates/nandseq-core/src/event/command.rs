//! Command/address/data (L1) events

use core::fmt;

use super::BufferAddr;
use crate::error::{Error, Result};

/// Maximum number of address cycles in one `ADDR` event
///
/// Two column cycles plus three row cycles.
pub const MAX_ADDR_CYCLES: usize = 5;

/// Address cycles carried by an `ADDR` event, in bus order
pub type AddrCycles = heapless::Vec<u8, MAX_ADDR_CYCLES>;

/// A command-level event (L1)
///
/// Designed to avoid allocation: address cycles live in a fixed-capacity
/// vector and data phases only reference host buffers.
///
/// Direction follows the device's point of view: `DataIn` moves data into
/// the device (program), `DataOut` moves data out of it (read).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandEvent {
    /// Wait for the given duration (microseconds)
    TimeWait(u32),
    /// Latch a command opcode
    Cmd(u8),
    /// Latch address cycles
    Addr(AddrCycles),
    /// Move `size` bytes from the host buffer into the device
    DataIn {
        /// Number of bytes
        size: u32,
        /// Source buffer
        buf: BufferAddr,
    },
    /// Move `size` bytes from the device into the host buffer
    DataOut {
        /// Number of bytes
        size: u32,
        /// Destination buffer
        buf: BufferAddr,
    },
}

/// Variant tag of a [`CommandEvent`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandEventKind {
    /// `TIME_WAIT`
    TimeWait,
    /// `CMD`
    Cmd,
    /// `ADDR`
    Addr,
    /// `DATA_IN`
    DataIn,
    /// `DATA_OUT`
    DataOut,
}

impl CommandEventKind {
    /// Canonical upper-case name
    pub const fn name(self) -> &'static str {
        match self {
            Self::TimeWait => "TIME_WAIT",
            Self::Cmd => "CMD",
            Self::Addr => "ADDR",
            Self::DataIn => "DATA_IN",
            Self::DataOut => "DATA_OUT",
        }
    }
}

impl CommandEvent {
    /// Build an `ADDR` event from a cycle slice
    ///
    /// Fails with [`Error::EmissionOverflow`] if more than
    /// [`MAX_ADDR_CYCLES`] cycles are given.
    pub fn addr(cycles: &[u8]) -> Result<Self> {
        AddrCycles::from_slice(cycles)
            .map(Self::Addr)
            .map_err(|_| Error::EmissionOverflow)
    }

    /// Get the variant tag
    pub const fn kind(&self) -> CommandEventKind {
        match self {
            Self::TimeWait(_) => CommandEventKind::TimeWait,
            Self::Cmd(_) => CommandEventKind::Cmd,
            Self::Addr(_) => CommandEventKind::Addr,
            Self::DataIn { .. } => CommandEventKind::DataIn,
            Self::DataOut { .. } => CommandEventKind::DataOut,
        }
    }

    /// Returns true if this event has a data phase
    pub fn has_data(&self) -> bool {
        matches!(self, Self::DataIn { .. } | Self::DataOut { .. })
    }
}

impl fmt::Display for CommandEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.kind().name();
        match self {
            Self::TimeWait(us) => write!(f, "{}({})", name, us),
            Self::Cmd(opcode) => write!(f, "{}(opcode=0x{:02x})", name, opcode),
            Self::Addr(cycles) => {
                write!(f, "{}(", name)?;
                for (i, cycle) in cycles.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "0x{:02x}", cycle)?;
                }
                f.write_str(")")
            }
            Self::DataIn { size, buf } | Self::DataOut { size, buf } => {
                write!(f, "{}(size={}, buf={})", name, size, buf)
            }
        }
    }
}

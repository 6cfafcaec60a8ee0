//! Device-semantic (L2) events

use core::fmt;

use super::BufferAddr;
use crate::context::AddressKind;

/// A device-semantic event (L2)
///
/// These are the events the state machine consumes. `TIME_WAIT` asks the
/// caller to suspend for the given number of microseconds and is valid in
/// every live state; the rest drive the protocol forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceEvent {
    /// Suspend external progress for the given duration (microseconds)
    TimeWait(u32),
    /// Start a READ into the given host buffer
    InitialRead(BufferAddr),
    /// Start a PROGRAM from the given host buffer
    InitialProgram(BufferAddr),
    /// Start an ERASE
    InitialErase,
    /// Set one address component
    SetAddress {
        /// Which component
        kind: AddressKind,
        /// Component value
        value: u32,
    },
    /// Start the transfer phase, or move one data unit once it has started
    DoTransfer,
    /// Launch the array read
    DoRead,
    /// Launch the program
    DoProgram,
    /// Launch the block erase
    DoErase,
    /// Close the transfer
    EndTransfer,
}

/// Variant tag of a [`DeviceEvent`], used as the transition table trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceEventKind {
    /// `TIME_WAIT`
    TimeWait,
    /// `INITIAL_READ`
    InitialRead,
    /// `INITIAL_PROGRAM`
    InitialProgram,
    /// `INITIAL_ERASE`
    InitialErase,
    /// `SET_ADDRESS`
    SetAddress,
    /// `DO_TRANSFER`
    DoTransfer,
    /// `DO_READ`
    DoRead,
    /// `DO_PROGRAM`
    DoProgram,
    /// `DO_ERASE`
    DoErase,
    /// `END_TRANSFER`
    EndTransfer,
}

impl DeviceEventKind {
    /// Every L2 event kind
    pub const ALL: [Self; 10] = [
        Self::TimeWait,
        Self::InitialRead,
        Self::InitialProgram,
        Self::InitialErase,
        Self::SetAddress,
        Self::DoTransfer,
        Self::DoRead,
        Self::DoProgram,
        Self::DoErase,
        Self::EndTransfer,
    ];

    /// Canonical upper-case name
    pub const fn name(self) -> &'static str {
        match self {
            Self::TimeWait => "TIME_WAIT",
            Self::InitialRead => "INITIAL_READ",
            Self::InitialProgram => "INITIAL_PROGRAM",
            Self::InitialErase => "INITIAL_ERASE",
            Self::SetAddress => "SET_ADDRESS",
            Self::DoTransfer => "DO_TRANSFER",
            Self::DoRead => "DO_READ",
            Self::DoProgram => "DO_PROGRAM",
            Self::DoErase => "DO_ERASE",
            Self::EndTransfer => "END_TRANSFER",
        }
    }
}

impl fmt::Display for DeviceEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl DeviceEvent {
    /// Get the variant tag
    pub const fn kind(&self) -> DeviceEventKind {
        match self {
            Self::TimeWait(_) => DeviceEventKind::TimeWait,
            Self::InitialRead(_) => DeviceEventKind::InitialRead,
            Self::InitialProgram(_) => DeviceEventKind::InitialProgram,
            Self::InitialErase => DeviceEventKind::InitialErase,
            Self::SetAddress { .. } => DeviceEventKind::SetAddress,
            Self::DoTransfer => DeviceEventKind::DoTransfer,
            Self::DoRead => DeviceEventKind::DoRead,
            Self::DoProgram => DeviceEventKind::DoProgram,
            Self::DoErase => DeviceEventKind::DoErase,
            Self::EndTransfer => DeviceEventKind::EndTransfer,
        }
    }

    /// Shorthand for a `SET_ADDRESS` event
    pub const fn set_address(kind: AddressKind, value: u32) -> Self {
        Self::SetAddress { kind, value }
    }
}

impl fmt::Display for DeviceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.kind().name();
        match self {
            Self::TimeWait(us) => write!(f, "{}({})", name, us),
            Self::InitialRead(buf) | Self::InitialProgram(buf) => {
                write!(f, "{}(buf={})", name, buf)
            }
            Self::SetAddress { kind, value } => {
                write!(f, "{}(type={}, addr={})", name, kind, value)
            }
            Self::InitialErase
            | Self::DoTransfer
            | Self::DoRead
            | Self::DoProgram
            | Self::DoErase
            | Self::EndTransfer => write!(f, "{}()", name),
        }
    }
}

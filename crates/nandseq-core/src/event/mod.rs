//! Event model
//!
//! Events come in three closed layers, from device semantics down to
//! register accesses:
//!
//! - [`DeviceEvent`] (L2) - what the caller wants the device to do
//! - [`CommandEvent`] (L1) - command, address and data cycles
//! - [`RegisterEvent`] (L0) - controller register reads and writes
//!
//! Every event is an immutable value. Its `Display` output is the canonical
//! rendering used for tracing and test assertions: the variant name followed
//! by every payload field in a fixed order.

mod command;
mod device;
mod register;

pub use command::{AddrCycles, CommandEvent, CommandEventKind, MAX_ADDR_CYCLES};
pub use device::{DeviceEvent, DeviceEventKind};
pub use register::RegisterEvent;

use core::fmt;

/// Address of a host buffer inside the DMA window
///
/// The core never dereferences this. Whoever submits an operation guarantees
/// the memory behind it stays valid until the transfer using it completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct BufferAddr(pub u32);

impl BufferAddr {
    /// Buffer address `bytes` past this one
    pub const fn offset(self, bytes: u32) -> Self {
        Self(self.0.wrapping_add(bytes))
    }
}

impl fmt::Display for BufferAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

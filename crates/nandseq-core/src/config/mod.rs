//! Device configuration
//!
//! Everything the state machine and the lowering step consult about the
//! device: geometry, busy timings, command opcodes, which address
//! components each operation needs, and the host DMA window.
//!
//! The defaults describe a 2 KiB-page, 64-pages-per-block, 1024-block part
//! with ONFI opcodes. With the `std` feature a configuration can also be
//! loaded from a TOML file:
//!
//! ```toml
//! [geometry]
//! blocks = 1024
//! pages_per_block = 64
//! page_size = 2048
//! transfer_unit = 1
//!
//! [timing]
//! read_page_us = 110
//! program_page_us = 660
//! erase_block_us = 2200
//!
//! [address]
//! erase = ["block"]
//!
//! [buffer]
//! start = 0x0
//! end = 0x100000
//! ```

#[cfg(feature = "std")]
mod toml;

#[cfg(feature = "std")]
pub use self::toml::ConfigError;

use crate::context::{AddressKind, AddressKinds, Operation};
use crate::error::{Error, Result};
use crate::event::BufferAddr;

/// Device geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    /// Number of erase blocks
    pub blocks: u32,
    /// Pages per erase block
    pub pages_per_block: u32,
    /// Bytes per page
    pub page_size: u32,
    /// Bytes moved by one data step
    pub transfer_unit: u32,
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            blocks: 1024,
            pages_per_block: 64,
            page_size: 2048,
            transfer_unit: 1,
        }
    }
}

/// Highest row address; rows go out in three cycles
pub const MAX_ROW: u32 = 0xFF_FFFF;

impl Geometry {
    /// Exclusive upper bound of one address component
    pub const fn limit(&self, kind: AddressKind) -> u32 {
        match kind {
            AddressKind::Block => self.blocks,
            AddressKind::Page => self.pages_per_block,
            AddressKind::Byte => self.page_size,
        }
    }

    /// Row address (page index across the whole device)
    ///
    /// `None` when the row does not fit the three row address cycles.
    pub const fn row(&self, block: u32, page: u32) -> Option<u32> {
        let Some(base) = block.checked_mul(self.pages_per_block) else {
            return None;
        };
        match base.checked_add(page) {
            Some(row) if row <= MAX_ROW => Some(row),
            _ => None,
        }
    }

    /// Total size in bytes
    pub const fn total_size(&self) -> u64 {
        self.blocks as u64 * self.pages_per_block as u64 * self.page_size as u64
    }
}

/// Array busy times in microseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// Array to page register (tR)
    pub read_page_us: u32,
    /// Page register to array (tPROG)
    pub program_page_us: u32,
    /// Block erase (tBERS)
    pub erase_block_us: u32,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            read_page_us: 110,
            program_page_us: 660,
            erase_block_us: 2200,
        }
    }
}

/// Command opcodes latched in CMD cycles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Opcodes {
    /// Read setup
    pub read: u8,
    /// Read confirm
    pub read_confirm: u8,
    /// Program setup
    pub program: u8,
    /// Program confirm
    pub program_confirm: u8,
    /// Block erase setup
    pub erase: u8,
    /// Block erase confirm
    pub erase_confirm: u8,
}

impl Default for Opcodes {
    fn default() -> Self {
        Self {
            read: 0x00,
            read_confirm: 0x30,
            program: 0x80,
            program_confirm: 0x10,
            erase: 0x60,
            erase_confirm: 0xD0,
        }
    }
}

/// Which address components one operation needs and accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Requirement {
    /// Must be set before DO_TRANSFER is accepted
    pub required: AddressKinds,
    /// May be set at all; anything else is rejected at SET_ADDRESS
    pub permitted: AddressKinds,
}

impl Requirement {
    /// Require and permit exactly `kinds`
    pub const fn exactly(kinds: AddressKinds) -> Self {
        Self {
            required: kinds,
            permitted: kinds,
        }
    }
}

/// Per-operation address requirements
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressPolicy {
    /// READ requirement
    pub read: Requirement,
    /// PROGRAM requirement
    pub program: Requirement,
    /// ERASE requirement
    pub erase: Requirement,
}

impl Default for AddressPolicy {
    fn default() -> Self {
        Self {
            read: Requirement::exactly(AddressKinds::all()),
            program: Requirement::exactly(AddressKinds::all()),
            // Erase is block granular
            erase: Requirement::exactly(AddressKinds::BLOCK),
        }
    }
}

impl AddressPolicy {
    /// Requirement for an operation (nothing is required or permitted for INVALID)
    pub const fn for_operation(&self, op: Operation) -> Requirement {
        match op {
            Operation::Read => self.read,
            Operation::Program => self.program,
            Operation::Erase => self.erase,
            Operation::Invalid => Requirement::exactly(AddressKinds::empty()),
        }
    }
}

/// Host address range DMA buffers must lie in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferWindow {
    /// First valid address
    pub start: u32,
    /// One past the last valid address
    pub end: u32,
}

impl Default for BufferWindow {
    fn default() -> Self {
        Self {
            start: 0,
            end: 0x10_0000,
        }
    }
}

impl BufferWindow {
    /// Check if a buffer start address is inside the window
    pub fn contains(&self, buf: BufferAddr) -> bool {
        buf.0 >= self.start && buf.0 < self.end
    }

    /// Check if `len` bytes starting at `buf` fit inside the window
    pub fn contains_range(&self, buf: BufferAddr, len: u64) -> bool {
        if !self.contains(buf) {
            return false;
        }
        buf.0 as u64 + len <= self.end as u64
    }
}

/// Complete device configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeviceConfig {
    /// Geometry
    pub geometry: Geometry,
    /// Busy times
    pub timing: Timing,
    /// Command opcodes
    pub opcodes: Opcodes,
    /// Address requirements
    pub address: AddressPolicy,
    /// Host DMA window
    pub buffer: BufferWindow,
}

impl DeviceConfig {
    /// Check the configuration for internal consistency
    pub fn validate(&self) -> Result<()> {
        let g = &self.geometry;
        if g.blocks == 0 || g.pages_per_block == 0 || g.page_size == 0 {
            return Err(Error::InvalidConfig);
        }
        if g.transfer_unit == 0 || g.transfer_unit > g.page_size {
            return Err(Error::InvalidConfig);
        }
        if g.blocks as u64 * g.pages_per_block as u64 > MAX_ROW as u64 + 1 {
            return Err(Error::InvalidConfig);
        }
        if g.page_size > 1 << 16 {
            return Err(Error::InvalidConfig);
        }
        if self.buffer.start >= self.buffer.end {
            return Err(Error::InvalidConfig);
        }
        for op in [Operation::Read, Operation::Program, Operation::Erase] {
            let req = self.address.for_operation(op);
            if !req.permitted.contains(req.required) || !req.required.contains(AddressKinds::BLOCK) {
                return Err(Error::InvalidConfig);
            }
        }
        Ok(())
    }

    /// Busy time of the array operation launched by `op`
    pub const fn busy_time_us(&self, op: Operation) -> u32 {
        match op {
            Operation::Read => self.timing.read_page_us,
            Operation::Program => self.timing.program_page_us,
            Operation::Erase => self.timing.erase_block_us,
            Operation::Invalid => 0,
        }
    }
}

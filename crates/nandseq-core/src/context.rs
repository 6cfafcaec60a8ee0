//! Operation context - runtime state accumulated during one operation

use core::fmt;

use bitflags::bitflags;

use crate::event::BufferAddr;

/// The high-level intent of a device transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Operation {
    /// No operation recorded yet
    #[default]
    Invalid,
    /// Read from the array into a host buffer
    Read,
    /// Program a host buffer into the array
    Program,
    /// Erase one or more blocks
    Erase,
}

impl Operation {
    /// Canonical upper-case name
    pub const fn name(self) -> &'static str {
        match self {
            Self::Invalid => "INVALID",
            Self::Read => "READ",
            Self::Program => "PROGRAM",
            Self::Erase => "ERASE",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One component of a device address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressKind {
    /// Erase block
    Block,
    /// Page within the block
    Page,
    /// Byte (column) within the page
    Byte,
}

impl AddressKind {
    /// All components, in the order the orchestrator sets them
    pub const ALL: [Self; 3] = [Self::Block, Self::Page, Self::Byte];

    /// The matching single-kind flag
    pub const fn flag(self) -> AddressKinds {
        match self {
            Self::Block => AddressKinds::BLOCK,
            Self::Page => AddressKinds::PAGE,
            Self::Byte => AddressKinds::BYTE,
        }
    }

    const fn index(self) -> usize {
        match self {
            Self::Block => 0,
            Self::Page => 1,
            Self::Byte => 2,
        }
    }
}

impl fmt::Display for AddressKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Block => write!(f, "Block"),
            Self::Page => write!(f, "Page"),
            Self::Byte => write!(f, "Byte"),
        }
    }
}

bitflags! {
    /// A set of address components
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AddressKinds: u8 {
        /// Block component
        const BLOCK = 1 << 0;
        /// Page component
        const PAGE  = 1 << 1;
        /// Byte component
        const BYTE  = 1 << 2;
    }
}

impl AddressKinds {
    /// Iterate the contained kinds in Block, Page, Byte order
    pub fn kinds(self) -> impl Iterator<Item = AddressKind> {
        AddressKind::ALL
            .into_iter()
            .filter(move |k| self.contains(k.flag()))
    }
}

impl fmt::Display for AddressKinds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("none");
        }
        for (i, kind) in self.kinds().enumerate() {
            if i > 0 {
                f.write_str("|")?;
            }
            write!(f, "{}", kind)?;
        }
        Ok(())
    }
}

/// A full device address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Address {
    /// Erase block
    pub block: u32,
    /// Page within the block
    pub page: u32,
    /// Byte within the page
    pub byte: u32,
}

impl Address {
    /// Create an address from its components
    pub const fn new(block: u32, page: u32, byte: u32) -> Self {
        Self { block, page, byte }
    }

    /// Get one component
    pub const fn get(&self, kind: AddressKind) -> u32 {
        match kind {
            AddressKind::Block => self.block,
            AddressKind::Page => self.page,
            AddressKind::Byte => self.byte,
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "block={}, page={}, byte={}",
            self.block, self.page, self.byte
        )
    }
}

/// Kind of the most recent action performed on the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    /// An address component was written
    Address,
    /// Array read launched
    Read,
    /// Program launched
    Program,
    /// Block erase launched
    Erase,
    /// A transfer step ran (transfer start or one data unit)
    Transfer,
}

/// Runtime context for one operation
///
/// Owned by exactly one state machine. Everything is readable; only the
/// machine's actions may mutate it, hence the crate-private setters.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Context {
    operation: Operation,
    components: [Option<u32>; 3],
    frozen: bool,
    cursor: usize,
    last_action: Option<ActionKind>,
    action_ts: u64,
    buffer: Option<BufferAddr>,
}

impl Context {
    /// Create an empty context (operation INVALID, nothing set)
    pub fn new() -> Self {
        Self::default()
    }

    /// The recorded operation
    pub fn operation(&self) -> Operation {
        self.operation
    }

    /// The address, with unset components reading as zero
    pub fn address(&self) -> Address {
        Address {
            block: self.component(AddressKind::Block).unwrap_or(0),
            page: self.component(AddressKind::Page).unwrap_or(0),
            byte: self.component(AddressKind::Byte).unwrap_or(0),
        }
    }

    /// One address component, if it has been set
    pub fn component(&self, kind: AddressKind) -> Option<u32> {
        self.components[kind.index()]
    }

    /// Returns true if the component has been set
    pub fn is_set(&self, kind: AddressKind) -> bool {
        self.component(kind).is_some()
    }

    /// The set of components written so far
    pub fn set_kinds(&self) -> AddressKinds {
        AddressKind::ALL
            .into_iter()
            .filter(|k| self.is_set(*k))
            .fold(AddressKinds::empty(), |acc, k| acc | k.flag())
    }

    /// Returns true once the transfer has started
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Number of data units transferred
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// The most recent action, if any
    pub fn last_action(&self) -> Option<ActionKind> {
        self.last_action
    }

    /// Logical timestamp (microseconds) of the most recent action
    pub fn action_timestamp(&self) -> u64 {
        self.action_ts
    }

    /// Host buffer recorded by the initial event
    pub fn buffer(&self) -> Option<BufferAddr> {
        self.buffer
    }

    /// Current column: the start byte plus what has been transferred
    pub fn column(&self, transfer_unit: u32) -> u32 {
        let byte = self.component(AddressKind::Byte).unwrap_or(0);
        byte.saturating_add((self.cursor as u32).saturating_mul(transfer_unit))
    }

    pub(crate) fn begin(&mut self, operation: Operation, buffer: Option<BufferAddr>) {
        self.operation = operation;
        self.buffer = buffer;
    }

    pub(crate) fn set_component(&mut self, kind: AddressKind, value: u32) {
        debug_assert!(!self.frozen, "address written after transfer start");
        self.components[kind.index()] = Some(value);
    }

    pub(crate) fn freeze(&mut self) {
        self.frozen = true;
    }

    pub(crate) fn advance(&mut self, increment: usize) {
        debug_assert!(self.frozen, "cursor advanced before transfer start");
        self.cursor += increment;
    }

    pub(crate) fn record(&mut self, action: ActionKind, timestamp: u64) {
        self.last_action = Some(action);
        self.action_ts = timestamp;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::string::ToString;

    #[test]
    fn test_fresh_context() {
        let ctx = Context::new();
        assert_eq!(ctx.operation(), Operation::Invalid);
        assert_eq!(ctx.set_kinds(), AddressKinds::empty());
        assert_eq!(ctx.address(), Address::default());
        assert_eq!(ctx.cursor(), 0);
        assert!(ctx.last_action().is_none());
        assert!(!ctx.is_frozen());
    }

    #[test]
    fn test_last_write_wins() {
        let mut ctx = Context::new();
        ctx.set_component(AddressKind::Page, 3);
        ctx.set_component(AddressKind::Block, 1);
        ctx.set_component(AddressKind::Page, 5);
        assert_eq!(ctx.component(AddressKind::Page), Some(5));
        assert_eq!(ctx.set_kinds(), AddressKinds::BLOCK | AddressKinds::PAGE);
        assert_eq!(ctx.address(), Address::new(1, 5, 0));
    }

    #[test]
    fn test_column_tracks_cursor() {
        let mut ctx = Context::new();
        ctx.set_component(AddressKind::Byte, 10);
        ctx.freeze();
        ctx.advance(1);
        ctx.advance(1);
        assert_eq!(ctx.cursor(), 2);
        assert_eq!(ctx.column(4), 18);
    }

    #[test]
    fn test_record_action() {
        let mut ctx = Context::new();
        ctx.record(ActionKind::Read, 110);
        assert_eq!(ctx.last_action(), Some(ActionKind::Read));
        assert_eq!(ctx.action_timestamp(), 110);
    }

    #[test]
    fn test_address_kinds_display() {
        assert_eq!(AddressKinds::all().to_string(), "Block|Page|Byte");
        assert_eq!(AddressKinds::PAGE.to_string(), "Page");
        assert_eq!(AddressKinds::empty().to_string(), "none");
    }
}

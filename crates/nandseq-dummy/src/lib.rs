//! nandseq-dummy - In-memory NAND controller emulator for testing
//!
//! This crate provides a register-level emulation of a NAND controller with
//! a device attached, plus host memory for the DMA engine. Drive it through
//! [`nandseq_core::io::RegisterController`] to run whole operations without
//! hardware.
//!
//! The emulated device honours busy times: after a confirm opcode it stays
//! busy until enough `TIME_WAIT` has elapsed, and a status read before that
//! reports the device as not ready.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod recording;

pub use recording::RecordingSink;

use alloc::collections::BTreeMap;
use alloc::vec;
use alloc::vec::Vec;

use nandseq_core::config::{BufferWindow, DeviceConfig, Geometry, Opcodes, Timing};
use nandseq_core::error::{Error, IoFault, Result};
use nandseq_core::event::{BufferAddr, RegisterEvent};
use nandseq_core::io::{DmaControl, RegisterBus, RegisterMap, StatusBits};

/// Command currently latched by the emulated device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Latched {
    None,
    Read,
    Program,
    Erase,
}

/// Dummy NAND controller
///
/// Emulates the controller registers, the NAND array, the device page
/// register and host memory covering the DMA window. Only pages that were
/// written are stored; every other page reads back erased.
pub struct DummyNand {
    geometry: Geometry,
    timing: Timing,
    opcodes: Opcodes,
    window: BufferWindow,
    map: RegisterMap,
    pages: BTreeMap<u32, Vec<u8>>,
    erased: Vec<u8>,
    host: Vec<u8>,
    page_reg: Vec<u8>,
    latched: Latched,
    addr_cycles: Vec<u8>,
    column: u32,
    row: u32,
    dma_addr: u32,
    dma_len: u32,
    status: StatusBits,
    busy_us: u32,
    fail_opcode: Option<u8>,
    record: Vec<RegisterEvent>,
}

impl DummyNand {
    /// Create an erased device described by `config`, with the default
    /// register map
    pub fn new(config: &DeviceConfig) -> Self {
        Self::with_map(config, RegisterMap::default())
    }

    /// Create an erased device with a custom register map
    pub fn with_map(config: &DeviceConfig, map: RegisterMap) -> Self {
        let geometry = config.geometry;
        let window = config.buffer;
        Self {
            geometry,
            timing: config.timing,
            opcodes: config.opcodes,
            window,
            map,
            pages: BTreeMap::new(),
            erased: vec![0xFF; geometry.page_size as usize],
            host: vec![0; (window.end - window.start) as usize],
            page_reg: vec![0xFF; geometry.page_size as usize],
            latched: Latched::None,
            addr_cycles: Vec::new(),
            column: 0,
            row: 0,
            dma_addr: 0,
            dma_len: 0,
            status: StatusBits::empty(),
            busy_us: 0,
            fail_opcode: None,
            record: Vec::new(),
        }
    }

    /// One page of the array
    pub fn page(&self, block: u32, page: u32) -> Option<&[u8]> {
        let row = self.row_of(block, page)?;
        Some(self.read_row(row))
    }

    /// Copy of one block of the array
    pub fn block(&self, block: u32) -> Option<Vec<u8>> {
        let first = self.row_of(block, 0)?;
        let mut data = Vec::with_capacity(self.block_size());
        for row in first..first + self.geometry.pages_per_block {
            data.extend_from_slice(self.read_row(row));
        }
        Some(data)
    }

    /// Number of pages holding programmed data
    pub fn written_pages(&self) -> usize {
        self.pages.len()
    }

    /// Overwrite a page directly, bypassing the command protocol
    pub fn load_page(&mut self, block: u32, page: u32, data: &[u8]) -> Result<()> {
        let row = self
            .row_of(block, page)
            .ok_or(Error::Io(IoFault::OutOfBounds))?;
        let cells = self.page_mut(row);
        let len = data.len().min(cells.len());
        cells[..len].copy_from_slice(&data[..len]);
        Ok(())
    }

    /// Host memory backing the DMA window
    pub fn host(&self) -> &[u8] {
        &self.host
    }

    /// Copy `data` into host memory at `buf`
    pub fn write_host(&mut self, buf: BufferAddr, data: &[u8]) -> Result<()> {
        let range = self
            .host_range(buf, data.len())
            .ok_or(Error::Io(IoFault::OutOfBounds))?;
        self.host[range].copy_from_slice(data);
        Ok(())
    }

    /// Borrow `len` bytes of host memory at `buf`
    pub fn read_host(&self, buf: BufferAddr, len: usize) -> Result<&[u8]> {
        let range = self
            .host_range(buf, len)
            .ok_or(Error::Io(IoFault::OutOfBounds))?;
        Ok(&self.host[range])
    }

    /// Make the array operation started by `confirm` report FAIL
    pub fn fail_on(&mut self, confirm: u8) {
        self.fail_opcode = Some(confirm);
    }

    /// Every register access seen so far, in order
    pub fn register_log(&self) -> &[RegisterEvent] {
        &self.record
    }

    /// Drain the register access log
    pub fn take_register_log(&mut self) -> Vec<RegisterEvent> {
        core::mem::take(&mut self.record)
    }

    /// Current status register value
    pub fn status(&self) -> StatusBits {
        if self.busy_us == 0 {
            self.status | StatusBits::READY
        } else {
            self.status
        }
    }

    fn block_size(&self) -> usize {
        self.geometry.pages_per_block as usize * self.geometry.page_size as usize
    }

    fn row_of(&self, block: u32, page: u32) -> Option<u32> {
        if block >= self.geometry.blocks || page >= self.geometry.pages_per_block {
            return None;
        }
        self.geometry.row(block, page)
    }

    fn valid_row(&self, row: u32) -> bool {
        (row as u64) < self.geometry.blocks as u64 * self.geometry.pages_per_block as u64
    }

    fn read_row(&self, row: u32) -> &[u8] {
        self.pages.get(&row).map_or(&self.erased, |page| page)
    }

    fn page_mut(&mut self, row: u32) -> &mut Vec<u8> {
        let erased = &self.erased;
        self.pages.entry(row).or_insert_with(|| erased.clone())
    }

    fn host_range(&self, buf: BufferAddr, len: usize) -> Option<core::ops::Range<usize>> {
        if !self.window.contains_range(buf, len as u64) {
            return None;
        }
        let start = (buf.0 - self.window.start) as usize;
        Some(start..start + len)
    }

    fn latch_command(&mut self, opcode: u8) -> Result<()> {
        if self.busy_us > 0 {
            log::warn!("dummy: command 0x{:02x} while busy", opcode);
            return Err(Error::Io(IoFault::Busy));
        }
        let ops = self.opcodes;
        if opcode == ops.read || opcode == ops.program || opcode == ops.erase {
            self.addr_cycles.clear();
            self.status = StatusBits::empty();
            self.latched = if opcode == ops.read {
                Latched::Read
            } else if opcode == ops.program {
                self.page_reg.fill(0xFF);
                Latched::Program
            } else {
                Latched::Erase
            };
            return Ok(());
        }

        let expected = match self.latched {
            Latched::Read => ops.read_confirm,
            Latched::Program => ops.program_confirm,
            Latched::Erase => ops.erase_confirm,
            Latched::None => {
                log::warn!("dummy: confirm 0x{:02x} without setup", opcode);
                return Err(Error::Io(IoFault::Bus));
            }
        };
        if opcode != expected {
            log::warn!("dummy: unexpected opcode 0x{:02x}", opcode);
            return Err(Error::Io(IoFault::Bus));
        }

        if self.fail_opcode == Some(opcode) {
            self.status |= StatusBits::FAIL;
        } else {
            match self.latched {
                Latched::Read => self.load_page_register(),
                Latched::Program => self.program_page(),
                Latched::Erase => self.erase_block(),
                Latched::None => {}
            }
        }
        self.busy_us = match self.latched {
            Latched::Read => self.timing.read_page_us,
            Latched::Program => self.timing.program_page_us,
            Latched::Erase => self.timing.erase_block_us,
            Latched::None => 0,
        };
        // Program and erase are one-shot; a read keeps its page register
        if self.latched != Latched::Read {
            self.latched = Latched::None;
        }
        Ok(())
    }

    fn latch_address(&mut self, cycle: u8) {
        self.addr_cycles.push(cycle);
        let c = &self.addr_cycles;
        match (self.latched, c.len()) {
            (Latched::Read | Latched::Program, 5) => {
                self.column = u32::from_le_bytes([c[0], c[1], 0, 0]);
                self.row = u32::from_le_bytes([c[2], c[3], c[4], 0]);
            }
            (Latched::Erase, 3) => {
                self.row = u32::from_le_bytes([c[0], c[1], c[2], 0]);
            }
            _ => {}
        }
    }

    fn load_page_register(&mut self) {
        if !self.valid_row(self.row) {
            self.status |= StatusBits::FAIL;
            return;
        }
        let row = self.row;
        let data = self.pages.get(&row).unwrap_or(&self.erased);
        self.page_reg.copy_from_slice(data);
    }

    fn program_page(&mut self) {
        if !self.valid_row(self.row) {
            self.status |= StatusBits::FAIL;
            return;
        }
        let row = self.row;
        let erased = &self.erased;
        let cells = self.pages.entry(row).or_insert_with(|| erased.clone());
        // Programming can only clear bits
        for (cell, data) in cells.iter_mut().zip(&self.page_reg) {
            *cell &= *data;
        }
    }

    fn erase_block(&mut self) {
        let block = self.row / self.geometry.pages_per_block;
        if block >= self.geometry.blocks {
            self.status |= StatusBits::FAIL;
            return;
        }
        let first = block * self.geometry.pages_per_block;
        let rows = first..first + self.geometry.pages_per_block;
        self.pages.retain(|row, _| !rows.contains(row));
        log::debug!("dummy: erased block {}", block);
    }

    fn start_dma(&mut self, ctrl: DmaControl) {
        if !ctrl.contains(DmaControl::START) {
            return;
        }
        let len = self.dma_len as usize;
        let column = self.column as usize;
        let host = self.host_range(BufferAddr(self.dma_addr), len);
        let fits_page = column + len <= self.page_reg.len();
        let (Some(host), true, 0) = (host, fits_page, self.busy_us) else {
            self.status |= StatusBits::DMA_ERR;
            return;
        };

        if ctrl.contains(DmaControl::TO_DEVICE) {
            self.page_reg[column..column + len].copy_from_slice(&self.host[host]);
        } else {
            self.host[host].copy_from_slice(&self.page_reg[column..column + len]);
        }
        self.column += self.dma_len;
    }
}

impl RegisterBus for DummyNand {
    fn read_register(&mut self, offset: u32) -> Result<u32> {
        self.record.push(RegisterEvent::ReadRegister { offset });
        let map = self.map;
        if offset == map.status {
            Ok(self.status().bits())
        } else if offset == map.dma_addr {
            Ok(self.dma_addr)
        } else if offset == map.dma_len {
            Ok(self.dma_len)
        } else {
            Err(Error::Io(IoFault::Bus))
        }
    }

    fn write_register(&mut self, offset: u32, value: u32) -> Result<()> {
        self.record
            .push(RegisterEvent::WriteRegister { offset, value });
        let map = self.map;
        if offset == map.cmd {
            self.latch_command(value as u8)
        } else if offset == map.addr {
            self.latch_address(value as u8);
            Ok(())
        } else if offset == map.dma_addr {
            self.dma_addr = value;
            Ok(())
        } else if offset == map.dma_len {
            self.dma_len = value;
            Ok(())
        } else if offset == map.dma_ctrl {
            self.start_dma(DmaControl::from_bits_truncate(value));
            Ok(())
        } else {
            Err(Error::Io(IoFault::Bus))
        }
    }

    fn delay_us(&mut self, us: u32) {
        // No real delay; only the busy timer moves
        self.record.push(RegisterEvent::TimeWait(us));
        self.busy_us = self.busy_us.saturating_sub(us);
    }
}

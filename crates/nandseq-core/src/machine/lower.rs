//! L2 to L1 lowering
//!
//! Each accepted action that touches the device produces a short, fixed
//! run of command/address/data events. The runs depend only on the
//! operation, the frozen address and the cursor, so they are computed from
//! the context alone.

use crate::config::DeviceConfig;
use crate::context::{Context, Operation};
use crate::error::{Error, Result};
use crate::event::{BufferAddr, CommandEvent};

/// Upper bound of L1 events one transition emits
pub const MAX_EMITTED: usize = 6;

/// L1 events emitted by one transition
pub type Emission = heapless::Vec<CommandEvent, MAX_EMITTED>;

fn push(out: &mut Emission, event: CommandEvent) -> Result<()> {
    out.push(event).map_err(|_| Error::EmissionOverflow)
}

/// Row address in three little-endian cycles
pub(crate) fn row_cycles(row: u32) -> [u8; 3] {
    let b = row.to_le_bytes();
    [b[0], b[1], b[2]]
}

/// Column address in two little-endian cycles
pub(crate) fn column_cycles(column: u32) -> [u8; 2] {
    let b = column.to_le_bytes();
    [b[0], b[1]]
}

fn page_row(config: &DeviceConfig, ctx: &Context) -> Result<u32> {
    let addr = ctx.address();
    config
        .geometry
        .row(addr.block, addr.page)
        .ok_or(Error::InvalidConfig)
}

fn block_row(config: &DeviceConfig, block: u32) -> Result<u32> {
    config.geometry.row(block, 0).ok_or(Error::InvalidConfig)
}

/// Emitted when the transfer starts: setup opcode and the full address
pub(crate) fn setup(config: &DeviceConfig, ctx: &Context, out: &mut Emission) -> Result<()> {
    let ops = &config.opcodes;
    match ctx.operation() {
        Operation::Read | Operation::Program => {
            let opcode = if ctx.operation() == Operation::Read {
                ops.read
            } else {
                ops.program
            };
            let col = column_cycles(ctx.column(config.geometry.transfer_unit));
            let row = row_cycles(page_row(config, ctx)?);
            push(out, CommandEvent::Cmd(opcode))?;
            push(
                out,
                CommandEvent::addr(&[col[0], col[1], row[0], row[1], row[2]])?,
            )
        }
        Operation::Erase => {
            let row = row_cycles(block_row(config, ctx.address().block)?);
            push(out, CommandEvent::Cmd(ops.erase))?;
            push(out, CommandEvent::addr(&row)?)
        }
        Operation::Invalid => Ok(()),
    }
}

/// Emitted by DO_READ / DO_PROGRAM / DO_ERASE
///
/// Returns the busy time of any emitted wait so the caller can advance
/// its clock.
pub(crate) fn launch(config: &DeviceConfig, ctx: &Context, out: &mut Emission) -> Result<u32> {
    let ops = &config.opcodes;
    match ctx.operation() {
        Operation::Read => {
            let busy = config.timing.read_page_us;
            push(out, CommandEvent::Cmd(ops.read_confirm))?;
            push(out, CommandEvent::TimeWait(busy))?;
            Ok(busy)
        }
        // Data goes into the page register first; the confirm comes at the end
        Operation::Program => Ok(0),
        Operation::Erase => {
            let busy = config.timing.erase_block_us;
            push(out, CommandEvent::Cmd(ops.erase_confirm))?;
            push(out, CommandEvent::TimeWait(busy))?;
            Ok(busy)
        }
        Operation::Invalid => Ok(0),
    }
}

/// Host buffer address of data unit `index`
pub(crate) fn unit_buffer(config: &DeviceConfig, ctx: &Context, index: usize) -> BufferAddr {
    let base = ctx.buffer().unwrap_or_default();
    base.offset((index as u32).wrapping_mul(config.geometry.transfer_unit))
}

/// Emitted by each DO_TRANSFER while transferring; `index` is the cursor
/// before it advances
pub(crate) fn data(
    config: &DeviceConfig,
    ctx: &Context,
    index: usize,
    out: &mut Emission,
) -> Result<u32> {
    let size = config.geometry.transfer_unit;
    match ctx.operation() {
        Operation::Read => {
            let buf = unit_buffer(config, ctx, index);
            push(out, CommandEvent::DataOut { size, buf })?;
            Ok(0)
        }
        Operation::Program => {
            let buf = unit_buffer(config, ctx, index);
            push(out, CommandEvent::DataIn { size, buf })?;
            Ok(0)
        }
        Operation::Erase => {
            let ops = &config.opcodes;
            let busy = config.timing.erase_block_us;
            let block = ctx.address().block + index as u32 + 1;
            push(out, CommandEvent::Cmd(ops.erase))?;
            push(out, CommandEvent::addr(&row_cycles(block_row(config, block)?))?)?;
            push(out, CommandEvent::Cmd(ops.erase_confirm))?;
            push(out, CommandEvent::TimeWait(busy))?;
            Ok(busy)
        }
        Operation::Invalid => Ok(0),
    }
}

/// Emitted by END_TRANSFER
pub(crate) fn finish(config: &DeviceConfig, ctx: &Context, out: &mut Emission) -> Result<u32> {
    match ctx.operation() {
        Operation::Program => {
            let busy = config.timing.program_page_us;
            push(out, CommandEvent::Cmd(config.opcodes.program_confirm))?;
            push(out, CommandEvent::TimeWait(busy))?;
            Ok(busy)
        }
        Operation::Read | Operation::Erase | Operation::Invalid => Ok(0),
    }
}

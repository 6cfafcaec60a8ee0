//! read / program / erase against the emulated device

use std::fs;
use std::path::{Path, PathBuf};

use nandseq_core::config::DeviceConfig;
use nandseq_core::context::{Address, Operation};
use nandseq_core::event::BufferAddr;
use nandseq_core::io::RegisterController;
use nandseq_core::orchestrator::{Orchestrator, Payload, Report};
use nandseq_dummy::{DummyNand, RecordingSink};

use super::{CommandError, Result};

type Sink = RecordingSink<RegisterController<DummyNand>>;

/// Where the data to program comes from
pub enum ProgramSource {
    /// Contents of a file
    File(PathBuf),
    /// `units` transfer units of one byte value
    Fill {
        /// Byte value
        value: u8,
        /// Number of transfer units
        units: usize,
    },
}

fn open(config: &DeviceConfig) -> Orchestrator<'_, Sink> {
    let nand = DummyNand::new(config);
    Orchestrator::new(RecordingSink::new(RegisterController::new(nand)), config)
}

fn device<'a>(orch: &'a Orchestrator<'_, Sink>) -> &'a DummyNand {
    orch.sink().inner().bus()
}

fn device_mut<'a>(orch: &'a mut Orchestrator<'_, Sink>) -> &'a mut DummyNand {
    orch.sink_mut().inner_mut().bus_mut()
}

/// Run the read command
pub fn run_read(
    config: &DeviceConfig,
    address: Address,
    units: usize,
    buf: u32,
    output: Option<&Path>,
    trace: bool,
) -> Result<()> {
    let mut orch = open(config);
    let buf = BufferAddr(buf);
    let result = orch.execute(Operation::Read, address, Payload::Read { buf, units });
    let report = finish(&orch, result, trace)?;

    let len = units * config.geometry.transfer_unit as usize;
    let data = device(&orch).read_host(buf, len)?;
    match output {
        Some(path) => {
            fs::write(path, data)?;
            println!("Wrote {} bytes to {:?}", data.len(), path);
        }
        None => hexdump(address.byte, data),
    }
    print_report(&report);
    Ok(())
}

/// Run the program command
pub fn run_program(
    config: &DeviceConfig,
    address: Address,
    source: ProgramSource,
    buf: u32,
    trace: bool,
) -> Result<()> {
    let unit = config.geometry.transfer_unit;
    let data = match source {
        ProgramSource::File(path) => fs::read(path)?,
        ProgramSource::Fill { value, units } => vec![value; units * unit as usize],
    };
    if data.is_empty() || data.len() % unit as usize != 0 {
        return Err(CommandError::NotUnitAligned {
            len: data.len(),
            unit,
        });
    }
    let units = data.len() / unit as usize;

    let mut orch = open(config);
    let buf = BufferAddr(buf);
    device_mut(&mut orch).write_host(buf, &data)?;
    let result = orch.execute(Operation::Program, address, Payload::Program { buf, units });
    let report = finish(&orch, result, trace)?;

    println!("Programmed {} bytes at {}", data.len(), address);
    print_report(&report);
    Ok(())
}

/// Run the erase command
pub fn run_erase(config: &DeviceConfig, block: u32, blocks: usize, trace: bool) -> Result<()> {
    let mut orch = open(config);
    let address = Address::new(block, 0, 0);
    let result = orch.execute(Operation::Erase, address, Payload::Erase { blocks });
    let report = finish(&orch, result, trace)?;

    println!("Erased {} block(s) starting at block {}", blocks, block);
    print_report(&report);
    Ok(())
}

/// Print the trace (if asked for) and per-event statuses on failure
fn finish(
    orch: &Orchestrator<'_, Sink>,
    result: nandseq_core::Result<Report>,
    trace: bool,
) -> Result<Report> {
    if trace {
        print_trace(orch);
    }
    match result {
        Ok(report) => Ok(report),
        Err(e) => {
            eprintln!("Device events:");
            for entry in orch.statuses().entries() {
                eprintln!("  {}", entry);
            }
            Err(e.into())
        }
    }
}

fn print_trace(orch: &Orchestrator<'_, Sink>) {
    println!("Command events (L1):");
    for event in orch.sink().events() {
        println!("  {}", event);
    }
    println!("Register events (L0):");
    for event in device(orch).register_log() {
        println!("  {}", event);
    }
}

fn print_report(report: &Report) {
    println!(
        "{}: {} events, cursor {}, {} us busy",
        report.status,
        report.events,
        report.context.cursor(),
        report.elapsed_us
    );
}

fn hexdump(start: u32, data: &[u8]) {
    for (i, line) in data.chunks(16).enumerate() {
        let hex: Vec<String> = line.iter().map(|b| format!("{:02x}", b)).collect();
        println!("{:04x}: {}", start as usize + i * 16, hex.join(" "));
    }
}

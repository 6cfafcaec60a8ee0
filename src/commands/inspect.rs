//! Commands that describe the protocol without running it

use nandseq_core::config::DeviceConfig;
use nandseq_core::context::{Address, Operation};
use nandseq_core::event::BufferAddr;
use nandseq_core::machine::table::TRANSITIONS;
use nandseq_core::orchestrator::{canonical_sequence, Payload};

use super::Result;

/// Print the transition table
pub fn print_table() {
    println!("{:<16}   {:<15} [guard] / action -> next", "state", "event");
    println!("{}", "-".repeat(72));
    for transition in TRANSITIONS {
        println!("{}", transition);
    }
}

/// Print the canonical device event sequence for an operation
pub fn print_sequence(
    config: &DeviceConfig,
    operation: Operation,
    address: Address,
    length: usize,
    buf: u32,
) -> Result<()> {
    let buf = BufferAddr(buf);
    let payload = match operation {
        Operation::Read => Payload::Read { buf, units: length },
        Operation::Program => Payload::Program { buf, units: length },
        _ => Payload::Erase { blocks: length },
    };
    for (i, event) in canonical_sequence(operation, address, payload, &config.address)?.enumerate()
    {
        println!("{:3}  {}", i, event);
    }
    Ok(())
}

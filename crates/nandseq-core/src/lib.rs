//! nandseq-core - Command sequencing core for NAND-style block devices
//!
//! This crate turns a requested device operation (READ, PROGRAM, ERASE) into
//! a validated, ordered stream of lower-level events. It is designed to be
//! `no_std` compatible so the same protocol core can run inside a driver on
//! a microcontroller or on a host against an emulated device.
//!
//! Events come in three layers:
//!
//! - **L2** ([`event::DeviceEvent`]) - device semantics (`INITIAL_READ`,
//!   `SET_ADDRESS`, `DO_TRANSFER`, ...)
//! - **L1** ([`event::CommandEvent`]) - command, address and data cycles
//! - **L0** ([`event::RegisterEvent`]) - controller register accesses
//!
//! The [`machine::Machine`] consumes L2 events against a transition table,
//! the [`orchestrator::Orchestrator`] builds the canonical L2 sequence for an
//! operation and forwards everything the machine emits to a
//! [`io::CommandSink`].
//!
//! # Features
//!
//! - `std` - Enable standard library support (includes `alloc`, TOML config)
//! - `alloc` - Enable the orchestrator and per-event status logs
//! - `is_sync` - Compile the I/O traits and orchestrator as blocking code
//!
//! # Example
//!
//! ```ignore
//! use nandseq_core::config::DeviceConfig;
//! use nandseq_core::context::{Address, Operation};
//! use nandseq_core::orchestrator::{Orchestrator, Payload};
//!
//! fn read_one<S: CommandSink>(sink: S) {
//!     let config = DeviceConfig::default();
//!     let mut orch = Orchestrator::new(sink, &config);
//!     let payload = Payload::Read { buf: BufferAddr(0x2000), units: 16 };
//!     match orch.execute(Operation::Read, Address::new(2, 5, 10), payload) {
//!         Ok(report) => println!("done, cursor = {}", report.context.cursor()),
//!         Err(e) => println!("read failed: {}", e),
//!     }
//! }
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
// Allow async fn in traits - we use maybe-async for dual sync/async support
#![allow(async_fn_in_trait)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(any(test, feature = "std"))]
extern crate std;

pub mod config;
pub mod context;
pub mod error;
pub mod event;
pub mod io;
pub mod machine;
#[cfg(feature = "alloc")]
pub mod orchestrator;
pub mod status;

pub use error::{Error, Result};

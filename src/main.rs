//! nandseq - NAND command sequencer
//!
//! Drives READ, PROGRAM and ERASE operations through the protocol state
//! machine in `nandseq-core` and executes them on an emulated
//! register-mapped NAND controller.
//!
//! # Architecture
//!
//! Every operation is expressed three times, each layer lower than the one
//! before:
//! - **Device events** (L2) - the canonical sequence the orchestrator builds
//! - **Command events** (L1) - CMD / ADDR / DATA / TIME_WAIT cycles emitted by
//!   the state machine
//! - **Register events** (L0) - controller register accesses performed by
//!   the register controller
//!
//! `--trace` prints the L1 and L0 events of a run, `sequence` prints the L2
//! events without running anything.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use commands::ProgramSource;
use nandseq_core::config::DeviceConfig;
use std::path::Path;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    let config = load_config(cli.config.as_deref())?;

    let result = match cli.command {
        Commands::Read {
            address,
            units,
            output,
            run,
        } => commands::run_read(
            &config,
            address.address(),
            units,
            run.buf,
            output.as_deref(),
            run.trace,
        ),
        Commands::Program {
            address,
            input,
            fill,
            units,
            run,
        } => {
            let source = match (input, fill, units) {
                (Some(path), _, _) => ProgramSource::File(path),
                (None, Some(value), Some(units)) => ProgramSource::Fill { value, units },
                _ => return Err(commands::CommandError::NoInput.into()),
            };
            commands::run_program(&config, address.address(), source, run.buf, run.trace)
        }
        Commands::Erase {
            block,
            blocks,
            trace,
        } => commands::run_erase(&config, block, blocks, trace),
        Commands::Table => {
            commands::print_table();
            Ok(())
        }
        Commands::Sequence {
            operation,
            address,
            length,
            buf,
        } => commands::print_sequence(&config, operation.into(), address.address(), length, buf),
    };

    result.map_err(|e| e.into())
}

fn load_config(path: Option<&Path>) -> Result<DeviceConfig, commands::CommandError> {
    match path {
        Some(path) => {
            let config = DeviceConfig::from_toml_file(path)?;
            log::info!("Loaded device config from {:?}", path);
            Ok(config)
        }
        None => {
            log::debug!("Using the default device config");
            Ok(DeviceConfig::default())
        }
    }
}

//! CLI command implementations
//!
//! Operations run against the in-memory controller from `nandseq-dummy`,
//! wired up as
//! `Orchestrator -> RecordingSink -> RegisterController -> DummyNand`
//! so every command and register event can be shown afterwards.

mod inspect;
mod operation;

pub use inspect::{print_sequence, print_table};
pub use operation::{run_erase, run_program, run_read, ProgramSource};

use nandseq_core::config::ConfigError;
use thiserror::Error;

/// Errors reported by the CLI commands
#[derive(Debug, Error)]
pub enum CommandError {
    /// File access failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file could not be loaded
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The operation failed
    #[error("operation failed: {0}")]
    Operation(#[from] nandseq_core::Error),

    /// Input data is not a whole number of transfer units
    #[error("input is {len} bytes, not a multiple of the {unit}-byte transfer unit")]
    NotUnitAligned {
        /// Input length
        len: usize,
        /// Transfer unit size
        unit: u32,
    },

    /// Nothing to program
    #[error("either --input or --fill with --units is required")]
    NoInput,
}

pub type Result<T> = std::result::Result<T, CommandError>;

//! CLI argument parsing

use clap::{Parser, Subcommand, ValueEnum};
use nandseq_core::context::{Address, Operation};
use std::path::PathBuf;

/// Parse a string as a hex or decimal u32
fn parse_hex_u32(s: &str) -> Result<u32, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u32>().map_err(|e| format!("Invalid number: {}", e))
    }
}

/// Parse a string as a hex or decimal byte
fn parse_hex_u8(s: &str) -> Result<u8, String> {
    let value = parse_hex_u32(s)?;
    u8::try_from(value).map_err(|_| format!("Value {:#x} does not fit a byte", value))
}

#[derive(Parser)]
#[command(name = "nandseq")]
#[command(author, version, about = "NAND command sequencer", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Device configuration file (TOML format)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Device address options
#[derive(clap::Args, Debug, Clone, Copy)]
pub struct AddressArgs {
    /// Erase block
    #[arg(long, value_parser = parse_hex_u32)]
    pub block: u32,

    /// Page within the block
    #[arg(long, value_parser = parse_hex_u32, default_value = "0")]
    pub page: u32,

    /// Byte within the page
    #[arg(long, value_parser = parse_hex_u32, default_value = "0")]
    pub byte: u32,
}

impl AddressArgs {
    pub fn address(&self) -> Address {
        Address::new(self.block, self.page, self.byte)
    }
}

/// Options shared by commands that run an operation
#[derive(clap::Args, Debug, Clone, Copy)]
pub struct RunArgs {
    /// Host buffer address inside the DMA window (hex or decimal)
    #[arg(long, value_parser = parse_hex_u32, default_value = "0x0")]
    pub buf: u32,

    /// Print the command and register events sent to the device
    #[arg(long)]
    pub trace: bool,
}

/// Operation selector for `sequence`
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationArg {
    Read,
    Program,
    Erase,
}

impl From<OperationArg> for Operation {
    fn from(op: OperationArg) -> Self {
        match op {
            OperationArg::Read => Operation::Read,
            OperationArg::Program => Operation::Program,
            OperationArg::Erase => Operation::Erase,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Read transfer units from a page into host memory
    Read {
        #[command(flatten)]
        address: AddressArgs,

        /// Number of transfer units to read
        #[arg(short, long, default_value = "1")]
        units: usize,

        /// Write the data to this file instead of printing a hex dump
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Program host data into a page
    Program {
        #[command(flatten)]
        address: AddressArgs,

        /// Input file path
        #[arg(short, long, conflicts_with = "fill")]
        input: Option<PathBuf>,

        /// Program this byte value instead of a file (hex or decimal)
        #[arg(long, value_parser = parse_hex_u8, requires = "units")]
        fill: Option<u8>,

        /// Number of transfer units to fill
        #[arg(short, long)]
        units: Option<usize>,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Erase one or more consecutive blocks
    Erase {
        /// First block to erase
        #[arg(long, value_parser = parse_hex_u32)]
        block: u32,

        /// Number of blocks to erase
        #[arg(long, default_value = "1")]
        blocks: usize,

        /// Print the command and register events sent to the device
        #[arg(long)]
        trace: bool,
    },

    /// Print the protocol transition table
    Table,

    /// Print the device event sequence for an operation without running it
    Sequence {
        /// Operation
        #[arg(value_enum)]
        operation: OperationArg,

        #[command(flatten)]
        address: AddressArgs,

        /// Transfer units (read/program) or blocks (erase)
        #[arg(short = 'n', long, default_value = "1")]
        length: usize,

        /// Host buffer address (hex or decimal)
        #[arg(long, value_parser = parse_hex_u32, default_value = "0x0")]
        buf: u32,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex() {
        assert_eq!(parse_hex_u32("0x2000"), Ok(0x2000));
        assert_eq!(parse_hex_u32("42"), Ok(42));
        assert!(parse_hex_u8("0x100").is_err());
        assert_eq!(parse_hex_u8("0xA5"), Ok(0xA5));
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_program_fill() {
        let cli = Cli::try_parse_from([
            "nandseq", "program", "--block", "3", "--page", "1", "--fill", "0x5a", "--units", "8",
        ])
        .unwrap();
        match cli.command {
            Commands::Program {
                address,
                fill,
                units,
                input,
                ..
            } => {
                assert_eq!(address.address(), Address::new(3, 1, 0));
                assert_eq!(fill, Some(0x5a));
                assert_eq!(units, Some(8));
                assert!(input.is_none());
            }
            _ => panic!("expected program"),
        }
    }

    #[test]
    fn test_fill_requires_units() {
        assert!(Cli::try_parse_from(["nandseq", "program", "--block", "0", "--fill", "0"]).is_err());
    }
}

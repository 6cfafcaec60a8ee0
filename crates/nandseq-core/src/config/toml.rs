//! TOML device configuration parsing
//!
//! Every table and key is optional; missing values keep their defaults.
//! Numbers may be written as integers or as decimal / `0x` hex strings.

use std::fs;
use std::path::Path;
use std::string::{String, ToString};
use std::vec::Vec;
use std::format;

use thiserror::Error;

use super::{DeviceConfig, Requirement};
use crate::context::AddressKinds;

/// Errors that can occur when loading a configuration file
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading the file failed
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid TOML or has unexpected types
    #[error("failed to parse config: {0}")]
    Parse(String),

    /// A value is well-formed but not acceptable
    #[error("invalid config value: {0}")]
    Invalid(String),
}

/// TOML config file structure
#[derive(Debug, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlConfigFile {
    geometry: Option<TomlGeometry>,
    timing: Option<TomlTiming>,
    opcodes: Option<TomlOpcodes>,
    address: Option<TomlAddress>,
    buffer: Option<TomlBuffer>,
}

#[derive(Debug, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlGeometry {
    #[serde(default, deserialize_with = "deserialize_opt_u32")]
    blocks: Option<u32>,
    #[serde(default, deserialize_with = "deserialize_opt_u32")]
    pages_per_block: Option<u32>,
    #[serde(default, deserialize_with = "deserialize_opt_u32")]
    page_size: Option<u32>,
    #[serde(default, deserialize_with = "deserialize_opt_u32")]
    transfer_unit: Option<u32>,
}

#[derive(Debug, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlTiming {
    #[serde(default, deserialize_with = "deserialize_opt_u32")]
    read_page_us: Option<u32>,
    #[serde(default, deserialize_with = "deserialize_opt_u32")]
    program_page_us: Option<u32>,
    #[serde(default, deserialize_with = "deserialize_opt_u32")]
    erase_block_us: Option<u32>,
}

#[derive(Debug, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlOpcodes {
    #[serde(default, deserialize_with = "deserialize_opt_u32")]
    read: Option<u32>,
    #[serde(default, deserialize_with = "deserialize_opt_u32")]
    read_confirm: Option<u32>,
    #[serde(default, deserialize_with = "deserialize_opt_u32")]
    program: Option<u32>,
    #[serde(default, deserialize_with = "deserialize_opt_u32")]
    program_confirm: Option<u32>,
    #[serde(default, deserialize_with = "deserialize_opt_u32")]
    erase: Option<u32>,
    #[serde(default, deserialize_with = "deserialize_opt_u32")]
    erase_confirm: Option<u32>,
}

/// Per-operation address kinds: either a plain list (required and
/// permitted), or a table with separate lists
#[derive(Debug, serde::Deserialize)]
#[serde(untagged)]
enum TomlRequirement {
    Exactly(Vec<String>),
    Split {
        required: Vec<String>,
        permitted: Option<Vec<String>>,
    },
}

#[derive(Debug, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlAddress {
    read: Option<TomlRequirement>,
    program: Option<TomlRequirement>,
    erase: Option<TomlRequirement>,
}

#[derive(Debug, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlBuffer {
    #[serde(default, deserialize_with = "deserialize_opt_u32")]
    start: Option<u32>,
    #[serde(default, deserialize_with = "deserialize_opt_u32")]
    end: Option<u32>,
}

/// Deserialize an optional u32 that can be an integer or a hex/decimal string
fn deserialize_opt_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::Deserialize;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum HexOrInt {
        Int(u32),
        Str(String),
    }

    match HexOrInt::deserialize(deserializer)? {
        HexOrInt::Int(n) => Ok(Some(n)),
        HexOrInt::Str(s) => parse_number(&s).map(Some).map_err(serde::de::Error::custom),
    }
}

/// Parse a number that can be hex (0x...) or decimal
fn parse_number(s: &str) -> Result<u32, String> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("invalid hex: {}", e))
    } else {
        s.parse().map_err(|e| format!("invalid number: {}", e))
    }
}

fn parse_kinds(names: &[String]) -> Result<AddressKinds, ConfigError> {
    names.iter().try_fold(AddressKinds::empty(), |acc, name| {
        let kind = match name.trim().to_ascii_lowercase().as_str() {
            "block" => AddressKinds::BLOCK,
            "page" => AddressKinds::PAGE,
            "byte" => AddressKinds::BYTE,
            other => {
                return Err(ConfigError::Invalid(format!(
                    "unknown address kind '{}'",
                    other
                )))
            }
        };
        Ok(acc | kind)
    })
}

fn parse_requirement(req: &TomlRequirement) -> Result<Requirement, ConfigError> {
    match req {
        TomlRequirement::Exactly(kinds) => Ok(Requirement::exactly(parse_kinds(kinds)?)),
        TomlRequirement::Split {
            required,
            permitted,
        } => {
            let required = parse_kinds(required)?;
            let permitted = match permitted {
                Some(p) => parse_kinds(p)?,
                None => required,
            };
            Ok(Requirement {
                required,
                permitted,
            })
        }
    }
}

fn opcode(value: Option<u32>, default: u8, name: &str) -> Result<u8, ConfigError> {
    match value {
        None => Ok(default),
        Some(v) => u8::try_from(v)
            .map_err(|_| ConfigError::Invalid(format!("opcode {} = {:#x} does not fit a byte", name, v))),
    }
}

impl DeviceConfig {
    /// Load a configuration from a TOML file
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse a configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let file: TomlConfigFile =
            ::toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;

        let mut config = DeviceConfig::default();

        if let Some(g) = file.geometry {
            let geometry = &mut config.geometry;
            geometry.blocks = g.blocks.unwrap_or(geometry.blocks);
            geometry.pages_per_block = g.pages_per_block.unwrap_or(geometry.pages_per_block);
            geometry.page_size = g.page_size.unwrap_or(geometry.page_size);
            geometry.transfer_unit = g.transfer_unit.unwrap_or(geometry.transfer_unit);
        }

        if let Some(t) = file.timing {
            let timing = &mut config.timing;
            timing.read_page_us = t.read_page_us.unwrap_or(timing.read_page_us);
            timing.program_page_us = t.program_page_us.unwrap_or(timing.program_page_us);
            timing.erase_block_us = t.erase_block_us.unwrap_or(timing.erase_block_us);
        }

        if let Some(o) = file.opcodes {
            let ops = &mut config.opcodes;
            ops.read = opcode(o.read, ops.read, "read")?;
            ops.read_confirm = opcode(o.read_confirm, ops.read_confirm, "read_confirm")?;
            ops.program = opcode(o.program, ops.program, "program")?;
            ops.program_confirm = opcode(o.program_confirm, ops.program_confirm, "program_confirm")?;
            ops.erase = opcode(o.erase, ops.erase, "erase")?;
            ops.erase_confirm = opcode(o.erase_confirm, ops.erase_confirm, "erase_confirm")?;
        }

        if let Some(a) = file.address {
            if let Some(r) = &a.read {
                config.address.read = parse_requirement(r)?;
            }
            if let Some(r) = &a.program {
                config.address.program = parse_requirement(r)?;
            }
            if let Some(r) = &a.erase {
                config.address.erase = parse_requirement(r)?;
            }
        }

        if let Some(b) = file.buffer {
            config.buffer.start = b.start.unwrap_or(config.buffer.start);
            config.buffer.end = b.end.unwrap_or(config.buffer.end);
        }

        config
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(config)
    }
}

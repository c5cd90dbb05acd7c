//! Analysis configuration.
//!
//! Every fixed table the heuristics depend on (target addresses, prologue
//! bytes, window sizes, magic constant) lives here so the same pipeline can
//! be pointed at other binaries or toolchains. Configs load from YAML or JSON;
//! any field left out keeps its default.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::TargetPrimitive;

/// Error type for configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Unsupported config format for {0} (expected .yaml, .yml or .json)")]
    UnsupportedFormat(PathBuf),

    #[error("Duplicate target address 0x{address:08x} ({first} and {second})")]
    DuplicateTarget { address: u64, first: String, second: String },

    #[error(
        "Target {name} at 0x{address:08x} lies outside the code section 0x{start:08x}..0x{end:08x}"
    )]
    TargetOutsideCode { name: String, address: u64, start: u64, end: u64 },

    #[error("Invalid address '{0}'")]
    InvalidAddress(String),

    #[error("Invalid prologue signature '{0}'")]
    InvalidPrologue(String),

    #[error("Invalid target override '{0}' (expected NAME=ADDRESS)")]
    InvalidOverride(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Parse `0x`-prefixed hex or plain decimal.
pub fn parse_address(value: &str) -> ConfigResult<u64> {
    let trimmed = value.trim();
    let parsed = match trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(&hex.replace('_', ""), 16),
        None => trimmed.replace('_', "").parse::<u64>(),
    };
    parsed.map_err(|_| ConfigError::InvalidAddress(value.to_string()))
}

/// Parse a byte signature written as hex pairs, e.g. `"55 8b ec"` or `"558BEC"`.
pub fn parse_signature(value: &str) -> ConfigResult<Vec<u8>> {
    let digits: Vec<u8> = value.bytes().filter(|b| !b.is_ascii_whitespace()).collect();
    if digits.is_empty() || digits.len() % 2 != 0 || !digits.iter().all(u8::is_ascii_hexdigit) {
        return Err(ConfigError::InvalidPrologue(value.to_string()));
    }
    digits
        .chunks(2)
        .map(|pair| {
            std::str::from_utf8(pair)
                .ok()
                .and_then(|hex| u8::from_str_radix(hex, 16).ok())
                .ok_or_else(|| ConfigError::InvalidPrologue(value.to_string()))
        })
        .collect()
}

/// Serde adapter: addresses serialize as `0x%08x` and deserialize from either
/// an integer or a string.
pub mod addr {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(u64),
        Str(String),
    }

    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{value:08x}"))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        match Raw::deserialize(deserializer)? {
            Raw::Int(v) => Ok(v),
            Raw::Str(s) => super::parse_address(&s).map_err(serde::de::Error::custom),
        }
    }
}

mod signature {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        let text: Vec<String> = value.iter().map(|b| format!("{b:02x}")).collect();
        serializer.serialize_str(&text.join(" "))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        super::parse_signature(&text).map_err(serde::de::Error::custom)
    }
}

/// One entry of the target table as written in a config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetEntry {
    pub name: String,
    #[serde(with = "addr")]
    pub address: u64,
}

/// Addresses of the five Hid_flash bridge routines in the reference build.
pub const DEFAULT_TARGETS: &[(u64, &str)] = &[
    (0x55C8CC, "flash_read8"),
    (0x55CA00, "flash_write_words"),
    (0x55CABC, "flash_write_words_verify"),
    (0x55CCB4, "flash_read_dwords"),
    (0x55CE14, "flash_write_dwords"),
];

/// `push ebp; mov ebp, esp`
pub const DEFAULT_PROLOGUE: &[u8] = &[0x55, 0x8B, 0xEC];
pub const DEFAULT_PROLOGUE_WINDOW: u64 = 0x1000;
pub const DEFAULT_HINT_WINDOW: usize = 28;
pub const DEFAULT_MAGIC_CONSTANT: u64 = 0xA4A4;

/// Ordered table of target primitives with distinct addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetTable {
    entries: Vec<TargetPrimitive>,
}

impl TargetTable {
    pub fn new(entries: Vec<TargetPrimitive>) -> ConfigResult<Self> {
        for (idx, entry) in entries.iter().enumerate() {
            if let Some(prev) = entries[..idx].iter().find(|e| e.address == entry.address) {
                return Err(ConfigError::DuplicateTarget {
                    address: entry.address,
                    first: prev.name.clone(),
                    second: entry.name.clone(),
                });
            }
        }
        Ok(Self { entries })
    }

    pub fn defaults() -> Self {
        Self {
            entries: DEFAULT_TARGETS
                .iter()
                .map(|(address, name)| TargetPrimitive::new(*address, *name))
                .collect(),
        }
    }

    /// Replace the address of the entry called `name`, or append a new entry.
    pub fn with_override(mut self, name: &str, address: u64) -> ConfigResult<Self> {
        match self.entries.iter_mut().find(|e| e.name == name) {
            Some(entry) => entry.address = address,
            None => self.entries.push(TargetPrimitive::new(address, name)),
        }
        Self::new(self.entries)
    }

    /// Apply a `NAME=ADDRESS` override string.
    pub fn with_override_str(self, raw: &str) -> ConfigResult<Self> {
        let (name, address) =
            raw.split_once('=').ok_or_else(|| ConfigError::InvalidOverride(raw.to_string()))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(ConfigError::InvalidOverride(raw.to_string()));
        }
        let address =
            parse_address(address).map_err(|_| ConfigError::InvalidOverride(raw.to_string()))?;
        self.with_override(name, address)
    }

    /// Every target must sit inside `[start, end)`.
    pub fn validate_within(&self, start: u64, end: u64) -> ConfigResult<()> {
        match self.entries.iter().find(|e| e.address < start || e.address >= end) {
            Some(bad) => Err(ConfigError::TargetOutsideCode {
                name: bad.name.clone(),
                address: bad.address,
                start,
                end,
            }),
            None => Ok(()),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &TargetPrimitive> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Tunables for the call-site pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Section to scan; falls back to the first executable section.
    pub code_section: String,
    pub targets: Vec<TargetEntry>,
    #[serde(with = "signature")]
    pub prologue: Vec<u8>,
    /// Maximum distance searched backwards from a call site for a prologue.
    pub prologue_window: u64,
    /// Number of trailing instructions (including the call) inspected for hints.
    pub hint_window: usize,
    #[serde(with = "addr")]
    pub magic_constant: u64,
    /// Write-class primitives that qualify a function as a candidate.
    pub heavy_primitives: Vec<String>,
    /// Registers that receive flash addresses from stack slots.
    pub address_registers: Vec<String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            code_section: ".text".to_string(),
            targets: DEFAULT_TARGETS
                .iter()
                .map(|(address, name)| TargetEntry { name: name.to_string(), address: *address })
                .collect(),
            prologue: DEFAULT_PROLOGUE.to_vec(),
            prologue_window: DEFAULT_PROLOGUE_WINDOW,
            hint_window: DEFAULT_HINT_WINDOW,
            magic_constant: DEFAULT_MAGIC_CONSTANT,
            heavy_primitives: vec![
                "flash_write_words_verify".to_string(),
                "flash_write_dwords".to_string(),
            ],
            address_registers: vec!["dx".to_string(), "edx".to_string()],
        }
    }
}

impl AnalysisConfig {
    /// Load from a `.yaml`/`.yml`/`.json` file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        load_by_extension(path)
    }

    pub fn target_table(&self) -> ConfigResult<TargetTable> {
        TargetTable::new(
            self.targets.iter().map(|t| TargetPrimitive::new(t.address, t.name.clone())).collect(),
        )
    }

    pub fn with_targets(mut self, table: &TargetTable) -> Self {
        self.targets = table
            .iter()
            .map(|t| TargetEntry { name: t.name.clone(), address: t.address })
            .collect();
        self
    }

    pub fn is_heavy(&self, primitive: &str) -> bool {
        self.heavy_primitives.iter().any(|p| p == primitive)
    }
}

/// Anchors for the firmware-template / MCU string-block pairing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PairingConfig {
    pub template_start: String,
    pub template_end: String,
    pub part_start: String,
    pub part_prefix: String,
    /// Templates starting with this prefix are called out separately.
    pub highlight_prefix: String,
    pub min_chars: usize,
}

impl Default for PairingConfig {
    fn default() -> Self {
        Self {
            template_start: "V_P3305_%.3X_%d".to_string(),
            template_end: "FLc_A9800_%.3X_%d".to_string(),
            part_start: "SN8F2253B".to_string(),
            part_prefix: "SN".to_string(),
            highlight_prefix: "A60cir_P3332A_".to_string(),
            min_chars: 4,
        }
    }
}

impl PairingConfig {
    pub fn load(path: &Path) -> ConfigResult<Self> {
        load_by_extension(path)
    }
}

fn load_by_extension<T: serde::de::DeserializeOwned>(path: &Path) -> ConfigResult<T> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default().to_lowercase();
    if !matches!(ext.as_str(), "yaml" | "yml" | "json") {
        return Err(ConfigError::UnsupportedFormat(path.to_path_buf()));
    }
    let body = fs::read_to_string(path)
        .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
    let parse_err = |message: String| ConfigError::Parse { path: path.to_path_buf(), message };
    if ext == "json" {
        serde_json::from_str(&body).map_err(|e| parse_err(e.to_string()))
    } else {
        serde_yaml::from_str(&body).map_err(|e| parse_err(e.to_string()))
    }
}

//! Core data model for call-site mapping.
//!
//! Everything here is derived from an already-loaded image and is read-only
//! once constructed. Addresses are virtual addresses (VMA) as seen once the
//! image is mapped at its load base.

use serde::{Deserialize, Serialize};

/// Length in bytes of an `E8 rel32` near call.
pub const REL32_CALL_LEN: u64 = 5;

/// A flash-access routine whose call sites we want to recover.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetPrimitive {
    pub address: u64,
    pub name: String,
}

impl TargetPrimitive {
    pub fn new(address: u64, name: impl Into<String>) -> Self {
        Self { address, name: name.into() }
    }
}

/// Outcome of the backward prologue search for a call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrologueSearch {
    /// Prologue signature found at this address.
    Found(u64),
    /// Search window exhausted without a match.
    NotFound,
}

/// How the start of a [`FunctionRegion`] was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionKind {
    /// Start is a located prologue.
    Prologue,
    /// No prologue in range; the region is anchored at the call site itself.
    CallSite,
}

/// Address range heuristically owning a call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionRegion {
    pub start: u64,
    pub call_site: u64,
    pub kind: RegionKind,
}

impl FunctionRegion {
    pub fn from_search(call_site: u64, search: PrologueSearch) -> Self {
        match search {
            PrologueSearch::Found(start) => Self { start, call_site, kind: RegionKind::Prologue },
            PrologueSearch::NotFound => {
                Self { start: call_site, call_site, kind: RegionKind::CallSite }
            }
        }
    }

    /// Exclusive end of the byte range to decode: through the end of the call.
    pub fn decode_end(&self) -> u64 {
        self.call_site.saturating_add(REL32_CALL_LEN)
    }

    pub fn is_degenerate(&self) -> bool {
        self.kind == RegionKind::CallSite
    }
}

/// Memory operand as reported by the decoder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemOperand {
    pub base: Option<String>,
    pub index: Option<String>,
    pub scale: i32,
    pub disp: i64,
    /// Access size in bytes.
    pub size: u8,
}

/// Structured operand, so evidence matching never depends on operand text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum Operand {
    Reg { name: String },
    /// `size` is the operand size in bytes; `value` may be sign-extended.
    Imm { value: i64, size: u8 },
    Mem(MemOperand),
}

impl Operand {
    /// Immediate value truncated to its operand size (32 bits when unknown).
    pub fn imm_unsigned(&self) -> Option<u64> {
        match self {
            Operand::Imm { value, size } => Some(match size {
                1 => *value as u8 as u64,
                2 => *value as u16 as u64,
                _ => *value as u32 as u64,
            }),
            _ => None,
        }
    }
}

/// One decoded instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructionRecord {
    pub address: u64,
    pub mnemonic: String,
    pub op_str: String,
    #[serde(default, skip_serializing)]
    pub operands: Vec<Operand>,
}

impl InstructionRecord {
    pub fn new(
        address: u64,
        mnemonic: impl Into<String>,
        op_str: impl Into<String>,
        operands: Vec<Operand>,
    ) -> Self {
        Self { address, mnemonic: mnemonic.into(), op_str: op_str.into(), operands }
    }
}

/// Named entry from the image's export table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportEntry {
    pub address: u64,
    pub name: String,
}

/// Bounded operand evidence collected from the instructions leading up to a call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hints {
    pub pushes_tail: Vec<String>,
    /// Immediate `push` operands as `0x..` hex of the value masked to its
    /// operand size, so `push -1` is recorded as `0xffffffff`.
    pub push_immediates_tail: Vec<String>,
    pub address_sources: Vec<String>,
    pub count_sources: Vec<String>,
    pub pointer_sources: Vec<String>,
    pub magic_nearby: bool,
    pub context_tail: Vec<InstructionRecord>,
}

/// One call site with everything we know about it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    pub site: u64,
    pub primitive: String,
    pub target: u64,
    pub region: FunctionRegion,
    /// Nearest preceding export, an area-of-ownership hint only.
    pub nearest_export: Option<ExportEntry>,
    pub hints: Hints,
}

/// Per-function aggregate of rows sharing a region start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionSummary {
    pub function_start: u64,
    pub start_kind: RegionKind,
    pub owner_name: Option<String>,
    pub primitive_sequence: Vec<String>,
    pub callsites: Vec<u64>,
    pub magic_nearby: bool,
    pub candidate: bool,
}

impl FunctionSummary {
    pub fn callsite_count(&self) -> usize {
        self.callsites.len()
    }
}

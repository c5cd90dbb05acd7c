//! Human-readable and JSON report views.
//!
//! Addresses are rendered as `0x%08x` strings so reports diff cleanly and read
//! the same way disassemblers print them.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;

use crate::config::{PairingConfig, TargetTable};
use crate::model::{FunctionSummary, RegionKind, Row};
use crate::services::analysis::AnalysisOutcome;
use crate::services::image::ExecutableImage;
use crate::services::pairing::{PairingResult, PairingRow};

pub fn hex(address: u64) -> String {
    format!("0x{address:08x}")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContextLine {
    pub address: String,
    pub mnemonic: String,
    pub op_str: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowReport {
    pub site: String,
    pub primitive: String,
    pub target: String,
    pub function_start: String,
    pub function_start_kind: RegionKind,
    pub owner_name: Option<String>,
    pub owner_address: Option<String>,
    pub pushes_tail: Vec<String>,
    pub push_immediates_tail: Vec<String>,
    pub address_sources: Vec<String>,
    pub count_sources: Vec<String>,
    pub pointer_sources: Vec<String>,
    pub magic_nearby: bool,
    pub context_tail: Vec<ContextLine>,
}

impl From<&Row> for RowReport {
    fn from(row: &Row) -> Self {
        let hints = &row.hints;
        Self {
            site: hex(row.site),
            primitive: row.primitive.clone(),
            target: hex(row.target),
            function_start: hex(row.region.start),
            function_start_kind: row.region.kind,
            owner_name: row.nearest_export.as_ref().map(|e| e.name.clone()),
            owner_address: row.nearest_export.as_ref().map(|e| hex(e.address)),
            pushes_tail: hints.pushes_tail.clone(),
            push_immediates_tail: hints.push_immediates_tail.clone(),
            address_sources: hints.address_sources.clone(),
            count_sources: hints.count_sources.clone(),
            pointer_sources: hints.pointer_sources.clone(),
            magic_nearby: hints.magic_nearby,
            context_tail: hints
                .context_tail
                .iter()
                .map(|insn| ContextLine {
                    address: hex(insn.address),
                    mnemonic: insn.mnemonic.clone(),
                    op_str: insn.op_str.clone(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryReport {
    pub function_start: String,
    pub function_start_kind: RegionKind,
    pub owner_name: Option<String>,
    pub primitive_sequence: Vec<String>,
    pub callsites: Vec<String>,
    pub callsite_count: usize,
    pub magic_nearby: bool,
    pub candidate: bool,
}

impl From<&FunctionSummary> for SummaryReport {
    fn from(summary: &FunctionSummary) -> Self {
        Self {
            function_start: hex(summary.function_start),
            function_start_kind: summary.start_kind,
            owner_name: summary.owner_name.clone(),
            primitive_sequence: summary.primitive_sequence.clone(),
            callsites: summary.callsites.iter().map(|a| hex(*a)).collect(),
            callsite_count: summary.callsite_count(),
            magic_nearby: summary.magic_nearby,
            candidate: summary.candidate,
        }
    }
}

/// Structured artifact for one call-site analysis run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlashMapReport {
    pub exe: String,
    pub image_format: String,
    pub image_sha256: Option<String>,
    pub image_base: String,
    pub code_section: String,
    pub code_address: String,
    pub targets: BTreeMap<String, String>,
    pub row_count: usize,
    pub rows: Vec<RowReport>,
    pub function_summary: Vec<SummaryReport>,
    pub candidates: Vec<SummaryReport>,
}

impl FlashMapReport {
    pub fn new(
        exe: &Path,
        image: &ExecutableImage,
        targets: &TargetTable,
        outcome: &AnalysisOutcome,
    ) -> Self {
        Self {
            exe: exe.display().to_string(),
            image_format: image.format.to_string(),
            image_sha256: image.sha256().map(str::to_string),
            image_base: hex(image.base),
            code_section: image.code_section.clone(),
            code_address: hex(image.code_address),
            targets: targets.iter().map(|t| (t.name.clone(), hex(t.address))).collect(),
            row_count: outcome.rows.len(),
            rows: outcome.rows.iter().map(RowReport::from).collect(),
            function_summary: outcome.summaries.iter().map(SummaryReport::from).collect(),
            candidates: outcome.candidates().iter().map(SummaryReport::from).collect(),
        }
    }
}

/// `rows=N functions=M candidates=K`
pub fn outcome_headline(outcome: &AnalysisOutcome) -> String {
    format!(
        "rows={} functions={} candidates={}",
        outcome.rows.len(),
        outcome.summaries.len(),
        outcome.summaries.iter().filter(|s| s.candidate).count()
    )
}

/// `0x00401000 owner :: a -> b`
pub fn candidate_line(summary: &FunctionSummary) -> String {
    format!(
        "{} {} :: {}",
        hex(summary.function_start),
        summary.owner_name.as_deref().unwrap_or("unknown"),
        summary.primitive_sequence.join(" -> ")
    )
}

pub const PAIRING_NOTE: &str =
    "Mapping is inferred from ordered static string blocks; validate against code-path pairing.";

/// Structured artifact for the template/MCU pairing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FirmwareMapReport {
    pub exe: String,
    pub legacy_template_count: usize,
    pub initial_mcu_count: usize,
    pub mapping: Vec<PairingRow>,
    pub highlighted: Vec<PairingRow>,
    pub note: String,
}

impl FirmwareMapReport {
    pub fn new(exe: &Path, result: &PairingResult, config: &PairingConfig) -> Self {
        Self {
            exe: exe.display().to_string(),
            legacy_template_count: result.templates.len(),
            initial_mcu_count: result.parts.len(),
            mapping: result.mapping.clone(),
            highlighted: result.highlighted(&config.highlight_prefix),
            note: PAIRING_NOTE.to_string(),
        }
    }
}

/// `NN. template -> mcu`
pub fn pairing_line(row: &PairingRow) -> String {
    format!("{:02}. {} -> {}", row.ordinal, row.firmware_template, row.inferred_mcu)
}

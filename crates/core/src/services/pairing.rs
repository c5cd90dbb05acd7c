//! Firmware-template to MCU part-number pairing from wide string blocks.
//!
//! Independent of the call-site pipeline: it only shares the input file. The
//! pairing is positional (nth template <-> nth part number), which reflects
//! how the two string tables sit next to each other in the reference build.
//! Validate against the firmware-selection code path before relying on it.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::PairingConfig;

#[derive(Debug, Error)]
pub enum PairingError {
    #[error("Could not find anchor string '{0}'")]
    MissingAnchor(String),
    #[error("Template block end '{end}' appears before start '{start}'")]
    AnchorOrder { start: String, end: String },
    #[error("Part-number block starting at '{0}' is empty")]
    EmptyPartBlock(String),
    #[error(
        "Part-number block too short for template block (templates={templates}, parts={parts})"
    )]
    PartBlockTooShort { templates: usize, parts: usize },
}

/// A wide string found in the image and its byte offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WideString {
    pub offset: usize,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairingRow {
    pub ordinal: usize,
    pub firmware_template: String,
    pub inferred_mcu: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairingResult {
    pub templates: Vec<String>,
    pub parts: Vec<String>,
    pub mapping: Vec<PairingRow>,
}

impl PairingResult {
    pub fn highlighted(&self, prefix: &str) -> Vec<PairingRow> {
        self.mapping.iter().filter(|r| r.firmware_template.starts_with(prefix)).cloned().collect()
    }
}

fn is_printable(byte: u8) -> bool {
    (0x20..=0x7E).contains(&byte)
}

/// Runs of at least `min_chars` printable ASCII characters encoded as
/// UTF-16LE, at any byte alignment.
pub fn extract_wide_strings(bytes: &[u8], min_chars: usize) -> Vec<WideString> {
    let mut out = Vec::new();
    let mut i = 0;
    while i + 1 < bytes.len() {
        let mut end = i;
        while end + 1 < bytes.len() && is_printable(bytes[end]) && bytes[end + 1] == 0 {
            end += 2;
        }
        let chars = (end - i) / 2;
        if chars >= min_chars.max(1) {
            let text = bytes[i..end].iter().step_by(2).map(|&b| b as char).collect();
            out.push(WideString { offset: i, text });
            i = end;
        } else {
            i += 1;
        }
    }
    out
}

fn position(strings: &[String], token: &str) -> Result<usize, PairingError> {
    strings
        .iter()
        .position(|s| s == token)
        .ok_or_else(|| PairingError::MissingAnchor(token.to_string()))
}

/// Strings from the start template anchor through the end anchor, inclusive.
pub fn find_template_block(
    strings: &[String],
    config: &PairingConfig,
) -> Result<Vec<String>, PairingError> {
    let start = position(strings, &config.template_start)?;
    let end = position(strings, &config.template_end)?;
    if end < start {
        return Err(PairingError::AnchorOrder {
            start: config.template_start.clone(),
            end: config.template_end.clone(),
        });
    }
    Ok(strings[start..=end].to_vec())
}

/// Contiguous run of part-number strings beginning at the part anchor.
pub fn find_part_block(
    strings: &[String],
    config: &PairingConfig,
) -> Result<Vec<String>, PairingError> {
    let start = position(strings, &config.part_start)?;
    let parts: Vec<String> = strings[start..]
        .iter()
        .take_while(|s| s.starts_with(&config.part_prefix))
        .cloned()
        .collect();
    if parts.is_empty() {
        return Err(PairingError::EmptyPartBlock(config.part_start.clone()));
    }
    Ok(parts)
}

pub fn build_mapping(
    templates: &[String],
    parts: &[String],
) -> Result<Vec<PairingRow>, PairingError> {
    if parts.len() < templates.len() {
        return Err(PairingError::PartBlockTooShort {
            templates: templates.len(),
            parts: parts.len(),
        });
    }
    Ok(templates
        .iter()
        .zip(parts)
        .enumerate()
        .map(|(idx, (template, part))| PairingRow {
            ordinal: idx + 1,
            firmware_template: template.clone(),
            inferred_mcu: part.clone(),
        })
        .collect())
}

/// Run the whole pairing over raw image bytes.
pub fn pair_firmware_templates(
    bytes: &[u8],
    config: &PairingConfig,
) -> Result<PairingResult, PairingError> {
    let strings: Vec<String> =
        extract_wide_strings(bytes, config.min_chars).into_iter().map(|s| s.text).collect();
    tracing::debug!(wide_strings = strings.len(), "extracted wide strings");
    let templates = find_template_block(&strings, config)?;
    let parts = find_part_block(&strings, config)?;
    let mapping = build_mapping(&templates, &parts)?;
    Ok(PairingResult { templates, parts, mapping })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wide(s: &str) -> Vec<u8> {
        s.bytes().flat_map(|b| [b, 0]).collect()
    }

    #[test]
    fn extracts_runs_at_odd_alignment() {
        let mut bytes = vec![0xFF];
        bytes.extend(wide("ABCD"));
        bytes.extend([0xFF, 0xFF]);
        bytes.extend(wide("xyz"));
        let found = extract_wide_strings(&bytes, 4);
        assert_eq!(found, vec![WideString { offset: 1, text: "ABCD".into() }]);
    }

    #[test]
    fn part_block_stops_at_first_non_prefixed_string() {
        let strings: Vec<String> = ["junk", "SN8F2253B", "SN8F2288", "other", "SN9"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let parts = find_part_block(&strings, &PairingConfig::default()).unwrap();
        assert_eq!(parts, vec!["SN8F2253B".to_string(), "SN8F2288".to_string()]);
    }
}

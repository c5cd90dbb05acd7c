//! Per-function grouping and candidate classification.

use std::collections::HashMap;

use crate::model::{FunctionSummary, Row};

/// Group rows by function start.
///
/// Within a group the primitive sequence follows row order, so callers
/// should pass rows already sorted by call site. Output is sorted by numeric
/// function start.
pub fn build_function_summaries(
    rows: &[Row],
    heavy_primitives: &[String],
) -> Vec<FunctionSummary> {
    let mut index: HashMap<u64, usize> = HashMap::new();
    let mut summaries: Vec<FunctionSummary> = Vec::new();

    for row in rows {
        let slot = *index.entry(row.region.start).or_insert_with(|| {
            summaries.push(FunctionSummary {
                function_start: row.region.start,
                start_kind: row.region.kind,
                owner_name: row.nearest_export.as_ref().map(|e| e.name.clone()),
                primitive_sequence: Vec::new(),
                callsites: Vec::new(),
                magic_nearby: false,
                candidate: false,
            });
            summaries.len() - 1
        });
        let summary = &mut summaries[slot];
        summary.primitive_sequence.push(row.primitive.clone());
        summary.callsites.push(row.site);
        summary.magic_nearby |= row.hints.magic_nearby;
    }

    for summary in &mut summaries {
        summary.candidate =
            is_candidate(&summary.primitive_sequence, summary.magic_nearby, heavy_primitives);
    }
    summaries.sort_by_key(|s| s.function_start);
    summaries
}

/// Two-factor signal: a heavyweight write primitive plus the magic constant nearby.
pub fn is_candidate(sequence: &[String], magic_nearby: bool, heavy_primitives: &[String]) -> bool {
    magic_nearby && sequence.iter().any(|p| heavy_primitives.contains(p))
}

pub fn candidates(summaries: &[FunctionSummary]) -> Vec<FunctionSummary> {
    summaries.iter().filter(|s| s.candidate).cloned().collect()
}

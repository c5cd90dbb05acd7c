use thiserror::Error;

use crate::config::{AnalysisConfig, ConfigError, TargetTable};
use crate::model::{FunctionRegion, FunctionSummary, Row, TargetPrimitive};
use crate::services::aggregate::{build_function_summaries, candidates};
use crate::services::backends::{DecodeError, InstructionDecoder};
use crate::services::hints::collect_hints;
use crate::services::image::{ExecutableImage, ImageError};
use crate::services::scan::{find_nearest_prologue, find_rel32_calls};
use crate::services::symbols::ExportIndex;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Image(#[from] ImageError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// Rows sorted by call site and summaries sorted by function start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisOutcome {
    pub rows: Vec<Row>,
    pub summaries: Vec<FunctionSummary>,
}

impl AnalysisOutcome {
    pub fn candidates(&self) -> Vec<FunctionSummary> {
        candidates(&self.summaries)
    }
}

/// Runs the call-site pipeline against one loaded image.
pub struct FlashCallAnalyzer<'a> {
    pub config: &'a AnalysisConfig,
    pub decoder: &'a dyn InstructionDecoder,
}

impl<'a> FlashCallAnalyzer<'a> {
    pub fn new(config: &'a AnalysisConfig, decoder: &'a dyn InstructionDecoder) -> Self {
        Self { config, decoder }
    }

    pub fn run(
        &self,
        image: &ExecutableImage,
        targets: &TargetTable,
    ) -> Result<AnalysisOutcome, AnalysisError> {
        targets.validate_within(image.code_address, image.code_end())?;
        let exports = ExportIndex::new(image.exports().iter().cloned());

        let mut rows = Vec::new();
        for target in targets.iter() {
            let sites = find_rel32_calls(image.code(), image.code_address, target.address);
            tracing::debug!(
                primitive = %target.name,
                target = %format!("0x{:08x}", target.address),
                hits = sites.len(),
                "scanned for direct calls"
            );
            rows.extend(
                sites.into_iter().filter_map(|site| self.build_row(image, &exports, target, site)),
            );
        }

        rows.sort_by_key(|row| row.site);
        let summaries = build_function_summaries(&rows, &self.config.heavy_primitives);
        tracing::info!(
            rows = rows.len(),
            functions = summaries.len(),
            candidates = summaries.iter().filter(|s| s.candidate).count(),
            decoder = self.decoder.name(),
            "call-site analysis complete"
        );
        Ok(AnalysisOutcome { rows, summaries })
    }

    fn build_row(
        &self,
        image: &ExecutableImage,
        exports: &ExportIndex,
        target: &TargetPrimitive,
        site: u64,
    ) -> Option<Row> {
        let code = image.code();
        let search = find_nearest_prologue(
            code,
            image.code_address,
            site,
            &self.config.prologue,
            self.config.prologue_window,
        );
        let region = FunctionRegion::from_search(site, search);
        if region.is_degenerate() {
            tracing::debug!(
                site = %format!("0x{site:08x}"),
                "no prologue in window; using call site"
            );
        }

        let start = (region.start.saturating_sub(image.code_address) as usize).min(code.len());
        let end = (region.decode_end().saturating_sub(image.code_address) as usize).min(code.len());
        let context = if start < end {
            self.decoder.decode(&code[start..end], image.code_address + start as u64)
        } else {
            Vec::new()
        };
        if context.is_empty() {
            tracing::debug!(site = %format!("0x{site:08x}"), "empty decode; dropping row");
            return None;
        }

        Some(Row {
            site,
            primitive: target.name.clone(),
            target: target.address,
            region,
            nearest_export: exports.nearest_preceding(site).cloned(),
            hints: collect_hints(&context, self.config),
        })
    }
}

/// Load `path`, decode with Capstone and run the pipeline.
#[cfg(feature = "capstone-backend")]
pub fn analyze_file(
    path: &std::path::Path,
    config: &AnalysisConfig,
    targets: &TargetTable,
) -> Result<(ExecutableImage, AnalysisOutcome), AnalysisError> {
    let image = ExecutableImage::load(path, &config.code_section)?;
    let decoder = crate::services::backends::CapstoneDecoder::new()?;
    let outcome = FlashCallAnalyzer::new(config, &decoder).run(&image, targets)?;
    Ok((image, outcome))
}

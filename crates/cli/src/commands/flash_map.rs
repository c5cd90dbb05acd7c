use std::path::PathBuf;

use anyhow::{Context, Result};
use flashtrace_core::config::AnalysisConfig;
use flashtrace_core::report::{candidate_line, outcome_headline, FlashMapReport};
use flashtrace_core::services::analysis::analyze_file;

use crate::{absolutize, write_json};

/// Inputs for the `flash-map` command.
#[derive(Debug, Clone, Default)]
pub struct FlashMapOptions {
    pub exe: String,
    /// Optional YAML/JSON analysis config.
    pub config: Option<String>,
    /// `NAME=ADDRESS` overrides applied on top of the config's target table.
    pub targets: Vec<String>,
    pub json_out: Option<String>,
    pub hint_window: Option<usize>,
    pub prologue_window: Option<u64>,
}

/// Resolve config file + CLI overrides into the effective config.
pub fn resolve_analysis_config(opts: &FlashMapOptions) -> Result<AnalysisConfig> {
    let mut config = match &opts.config {
        Some(path) => {
            let path = absolutize(path)?;
            AnalysisConfig::load(&path)
                .with_context(|| format!("Failed to load analysis config {}", path.display()))?
        }
        None => AnalysisConfig::default(),
    };
    if let Some(window) = opts.hint_window {
        config.hint_window = window;
    }
    if let Some(window) = opts.prologue_window {
        config.prologue_window = window;
    }

    let mut table = config.target_table().context("Invalid target table in config")?;
    for raw in &opts.targets {
        table = table.with_override_str(raw).context("Invalid --target override")?;
    }
    Ok(config.with_targets(&table))
}

/// Map flash-primitive call sites and print the candidate functions.
pub fn flash_map_command(opts: &FlashMapOptions) -> Result<FlashMapReport> {
    let exe_path = absolutize(&opts.exe)?;
    let config = resolve_analysis_config(opts)?;
    let targets = config.target_table()?;

    let (image, outcome) = analyze_file(&exe_path, &config, &targets)
        .with_context(|| format!("Failed to analyze {}", exe_path.display()))?;
    let report = FlashMapReport::new(&exe_path, &image, &targets, &outcome);

    println!("{}", outcome_headline(&outcome));
    for summary in outcome.candidates() {
        println!("{}", candidate_line(&summary));
    }

    if let Some(out) = &opts.json_out {
        let out_path: PathBuf = absolutize(out)?;
        write_json(&out_path, &report)?;
        println!("wrote {}", out_path.display());
    }

    Ok(report)
}

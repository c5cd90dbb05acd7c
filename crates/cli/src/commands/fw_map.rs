use anyhow::{Context, Result};
use flashtrace_core::config::PairingConfig;
use flashtrace_core::report::{pairing_line, FirmwareMapReport};
use flashtrace_core::services::image::read_image_bytes;
use flashtrace_core::services::pairing::pair_firmware_templates;

use crate::{absolutize, write_json};

/// Pair legacy firmware templates with MCU part numbers by string-block position.
pub fn fw_map_command(
    exe: &str,
    config: Option<&str>,
    json_out: Option<&str>,
) -> Result<FirmwareMapReport> {
    let exe_path = absolutize(exe)?;
    let config = match config {
        Some(path) => {
            let path = absolutize(path)?;
            PairingConfig::load(&path)
                .with_context(|| format!("Failed to load pairing config {}", path.display()))?
        }
        None => PairingConfig::default(),
    };

    let bytes = read_image_bytes(&exe_path)?;
    let result = pair_firmware_templates(&bytes, &config)
        .with_context(|| format!("Failed to pair firmware templates in {}", exe_path.display()))?;
    let report = FirmwareMapReport::new(&exe_path, &result, &config);

    println!("legacy_templates={}", report.legacy_template_count);
    println!("initial_mcu_entries={}", report.initial_mcu_count);
    println!();
    for row in &report.mapping {
        println!("{}", pairing_line(row));
    }

    if !report.highlighted.is_empty() {
        println!();
        println!("Highlighted ({}*):", config.highlight_prefix);
        for row in &report.highlighted {
            println!("  {} -> {}", row.firmware_template, row.inferred_mcu);
        }
    }

    if let Some(out) = json_out {
        let out_path = absolutize(out)?;
        write_json(&out_path, &report)?;
        println!();
        println!("wrote {}", out_path.display());
    }

    Ok(report)
}

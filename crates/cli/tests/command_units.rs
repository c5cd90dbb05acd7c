#[path = "../../core/tests/common/mod.rs"]
mod common;

use std::fs;

use common::*;
use flashtrace::commands::{
    flash_map_command, fw_map_command, resolve_analysis_config, FlashMapOptions,
};
use flashtrace::{absolutize, write_json};
use tempfile::tempdir;

fn options_for(exe: &std::path::Path) -> FlashMapOptions {
    FlashMapOptions {
        exe: exe.display().to_string(),
        targets: vec![
            format!("flash_write_dwords=0x{:x}", va(PRIM_WRITE)),
            format!("flash_read8=0x{:x}", va(PRIM_READ)),
            format!("flash_write_words=0x{:x}", va(0xA000)),
            format!("flash_write_words_verify=0x{:x}", va(0xB000)),
            format!("flash_read_dwords=0x{:x}", va(0xC000)),
        ],
        ..Default::default()
    }
}

#[test]
fn resolve_applies_window_and_target_overrides() {
    let opts = FlashMapOptions {
        hint_window: Some(8),
        prologue_window: Some(0x200),
        targets: vec!["flash_erase=0x1234".into()],
        ..Default::default()
    };
    let config = resolve_analysis_config(&opts).expect("config");
    assert_eq!(config.hint_window, 8);
    assert_eq!(config.prologue_window, 0x200);
    let table = config.target_table().expect("table");
    assert_eq!(table.len(), 6);
    assert!(table.iter().any(|t| t.name == "flash_erase" && t.address == 0x1234));
}

#[test]
fn resolve_reports_missing_config_file() {
    let dir = tempdir().expect("tempdir");
    let opts = FlashMapOptions {
        config: Some(dir.path().join("absent.yaml").display().to_string()),
        ..Default::default()
    };
    let err = resolve_analysis_config(&opts).expect_err("missing config");
    assert!(err.to_string().contains("Failed to load analysis config"));
}

/// Overriding every built-in target with in-section addresses analyzes the fixture.
#[test]
fn flash_map_command_returns_report() {
    let dir = tempdir().expect("tempdir");
    let exe = dir.path().join("tool.exe");
    fs::write(&exe, build_pe32(&sample_code(), &[])).expect("write exe");

    let mut opts = options_for(&exe);
    opts.json_out = Some(dir.path().join("out/report.json").display().to_string());
    let report = flash_map_command(&opts).expect("flash-map");

    assert_eq!(report.row_count, 3);
    assert_eq!(report.function_summary.len(), 2);
    assert_eq!(report.candidates.len(), 1);
    assert_eq!(report.candidates[0].owner_name, None);
    assert_eq!(report.targets.len(), 5);
    assert!(dir.path().join("out/report.json").is_file());
}

#[test]
fn fw_map_command_uses_config_anchors() {
    let dir = tempdir().expect("tempdir");
    let exe = dir.path().join("tool.exe");
    let mut bytes = Vec::new();
    for s in ["FIRST_%d", "MID_%d", "LAST_%d", "MCU_A1", "MCU_B2"] {
        bytes.extend(s.bytes().flat_map(|b| [b, 0]));
        bytes.extend([0, 0]);
    }
    fs::write(&exe, bytes).expect("write exe");
    let config = dir.path().join("pairing.json");
    let anchors = serde_json::json!({
        "template_start": "FIRST_%d",
        "template_end": "MID_%d",
        "part_start": "MCU_A1",
        "part_prefix": "MCU_",
    });
    fs::write(&config, anchors.to_string()).expect("write config");

    let report = fw_map_command(
        &exe.display().to_string(),
        Some(&config.display().to_string()),
        None,
    )
    .expect("fw-map");
    assert_eq!(report.legacy_template_count, 2);
    assert_eq!(report.initial_mcu_count, 2);
    assert_eq!(report.mapping[1].firmware_template, "MID_%d");
    assert_eq!(report.mapping[1].inferred_mcu, "MCU_B2");
    assert!(report.highlighted.is_empty());
}

#[test]
fn absolutize_keeps_absolute_paths() {
    let dir = tempdir().expect("tempdir");
    let abs = dir.path().join("x.exe");
    assert_eq!(absolutize(&abs.display().to_string()).expect("abs"), abs);
    let rel = absolutize("rel.exe").expect("rel");
    assert!(rel.is_absolute());
    assert!(rel.ends_with("rel.exe"));
}

#[test]
fn write_json_creates_parent_dirs() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("a/b/c.json");
    write_json(&path, &vec!["x", "y"]).expect("write");
    let body = fs::read_to_string(&path).expect("read");
    assert!(body.contains("\"x\""));
}

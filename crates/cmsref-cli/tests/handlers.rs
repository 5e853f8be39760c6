//! Integration test: drive the subcommand handlers against the shipped
//! definitions and a scratch output directory.

use std::path::{Path, PathBuf};

use cmsref_cli::audit::{run_audit, AuditArgs};
use cmsref_cli::ingest::{run_ingest, IngestArgs, SourceFormat};
use cmsref_pipeline::PipelineConfig;

fn repo_root() -> PathBuf {
    let mut dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    dir.pop(); // crates/
    dir.pop(); // repo root
    dir
}

fn config() -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.rebase(&repo_root());
    config
}

fn ingest_args(input: &Path, out: &Path) -> IngestArgs {
    IngestArgs {
        dataset: "cms_gpci".into(),
        input: input.to_path_buf(),
        contract_version: None,
        vintage: None,
        format: SourceFormat::Auto,
        delimiter: None,
        release_id: None,
        manifest: None,
        reference_sets: None,
        threshold: None,
        verify_determinism: true,
        out: out.to_path_buf(),
    }
}

const HEADER: &str = "MAC,State,Locality Code,Locality Name,GPCI Work,GPCI PE,GPCI MP\n";

#[test]
fn audit_of_shipped_definitions_passes() {
    let code = run_audit(&AuditArgs { builtin_layouts: false }, &config()).unwrap();
    assert_eq!(code, 0);
    let code = run_audit(&AuditArgs { builtin_layouts: true }, &config()).unwrap();
    assert_eq!(code, 0);
}

#[test]
fn ingest_writes_accepted_and_summary() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("GPCI2025.csv");
    std::fs::write(&input, format!("{HEADER}10112,AL,00,ALABAMA,1.000,0.869,0.575\n")).unwrap();
    let out = dir.path().join("out");

    let code = run_ingest(&ingest_args(&input, &out), &config()).unwrap();
    assert_eq!(code, 0);

    let accepted = std::fs::read_to_string(out.join("accepted.jsonl")).unwrap();
    let row: serde_json::Value = serde_json::from_str(accepted.lines().next().unwrap()).unwrap();
    assert_eq!(row["mac"], "10112");
    assert_eq!(row["row_content_hash"].as_str().unwrap().len(), 64);
    assert_eq!(std::fs::read_to_string(out.join("quarantine.jsonl")).unwrap(), "");

    let summary: serde_json::Value =
        serde_json::from_slice(&std::fs::read(out.join("summary.json")).unwrap()).unwrap();
    assert_eq!(summary["published"], true);
    assert_eq!(summary["accepted"], 1);
}

#[test]
fn ingest_over_threshold_withholds_accepted_rows() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("GPCI2025.csv");
    std::fs::write(
        &input,
        format!("{HEADER}10112,AL,00,ALABAMA,1.000,0.869,0.575\n10112,AL,01,ALABAMA,3.000,0.869,0.575\n"),
    )
    .unwrap();
    let out = dir.path().join("out");

    let code = run_ingest(&ingest_args(&input, &out), &config()).unwrap();
    assert_eq!(code, 1);
    assert!(!out.join("accepted.jsonl").exists());
    let quarantine = std::fs::read_to_string(out.join("quarantine.jsonl")).unwrap();
    assert_eq!(quarantine.lines().count(), 1);
    assert!(quarantine.contains("content.bounds"));
}

#[test]
fn ingest_of_unknown_dataset_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("x.csv");
    std::fs::write(&input, HEADER).unwrap();
    let mut args = ingest_args(&input, &dir.path().join("out"));
    args.dataset = "cms_unknown".into();
    assert!(run_ingest(&args, &config()).is_err());
}

#[test]
fn fixed_width_ingest_uses_layouts_from_the_configured_directory() {
    let dir = tempfile::tempdir().unwrap();
    let layouts = dir.path().join("layouts");
    std::fs::create_dir(&layouts).unwrap();
    std::fs::write(
        layouts.join("cms_gpci_2030.json"),
        r#"{
          "version": "2030",
          "min_line_length": 34,
          "columns": {
            "mac": {"start": 0, "end": 5, "type": "string", "nullable": false},
            "state": {"start": 5, "end": 7, "type": "string", "nullable": false},
            "locality_code": {"start": 7, "end": 9, "type": "string", "nullable": false},
            "locality_name": {"start": 9, "end": 19, "type": "string", "nullable": false},
            "gpci_work": {"start": 19, "end": 24, "type": "decimal", "nullable": false},
            "gpci_pe": {"start": 24, "end": 29, "type": "decimal", "nullable": false},
            "gpci_mp": {"start": 29, "end": 34, "type": "decimal", "nullable": false},
            "effective_date": {"start": 34, "end": 42, "type": "date", "nullable": true}
          }
        }"#,
    )
    .unwrap();
    let input = dir.path().join("GPCI2030.txt");
    std::fs::write(&input, "10112AL00ALABAMA   1.0000.8690.575\n").unwrap();
    let out = dir.path().join("out");

    let mut config = config();
    config.layouts_dir = layouts;
    // The builtin 2025 layout needs 83 columns; this line only fits the one on disk.
    let code = run_ingest(&ingest_args(&input, &out), &config).unwrap();
    assert_eq!(code, 0);

    let accepted = std::fs::read_to_string(out.join("accepted.jsonl")).unwrap();
    let row: serde_json::Value = serde_json::from_str(accepted.lines().next().unwrap()).unwrap();
    assert_eq!(row["gpci_work"], "1.000");
    assert_eq!(row["gpci_mp"], "0.575");
}

#[test]
fn unreadable_manifest_falls_back_to_the_filename() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("GPCI2025Q3.csv");
    std::fs::write(&input, format!("{HEADER}10112,AL,00,ALABAMA,1.000,0.869,0.575\n")).unwrap();
    let out = dir.path().join("out");
    let mut args = ingest_args(&input, &out);
    args.manifest = Some(dir.path().join("missing_manifest.json"));

    let code = run_ingest(&args, &config()).unwrap();
    assert_eq!(code, 0);

    let summary: serde_json::Value =
        serde_json::from_slice(&std::fs::read(out.join("summary.json")).unwrap()).unwrap();
    assert_eq!(summary["quarter_vintage"], "2025Q3");
    let warnings = summary["warnings"].as_array().unwrap();
    assert!(warnings.iter().any(|w| w.as_str().unwrap().contains("missing_manifest.json")));
}

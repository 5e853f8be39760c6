//! Integration test: full runs over the shipped contracts and layouts.

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;

use cmsref_core::{is_valid_sha256, Timestamp};
use cmsref_pipeline::{build_decoder, IngestPipeline, PipelineConfig, PipelineError, SourceFile};
use cmsref_schema::{ContractStore, LayoutRegistry, SchemaContract};
use cmsref_validate::ReferenceSets;

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

fn contract(dataset: &str) -> SchemaContract {
    ContractStore::at_root(repo_root())
        .load_contract(dataset, None)
        .unwrap()
}

fn pprrvu_line(code: &str, mods: &str, status: &str, rvus: [&str; 4], na: &str) -> String {
    let mut line = format!("{code:<5}{mods:<2}{:<50}{status:<1}", "ANESTHESIA FOR SALIVARY GLAND");
    for rvu in rvus {
        line.push_str(&format!("{rvu:>8}"));
    }
    line.push_str(&format!("{na:<1}XXX"));
    line
}

fn timestamp() -> Timestamp {
    Timestamp::parse("2025-10-01T12:00:00Z").unwrap()
}

fn run_pprrvu(config: &PipelineConfig, filename: &str, text: &str) -> cmsref_pipeline::RunReport {
    let contract = contract("cms_pprrvu");
    let layout = LayoutRegistry::builtin()
        .unwrap()
        .resolve("cms_pprrvu", None)
        .unwrap()
        .clone();
    let decoder = build_decoder(config, &contract, Some(layout));
    let source = SourceFile {
        filename,
        bytes: text.as_bytes(),
        release_id: None,
        manifest: None,
        timestamp: timestamp(),
    };
    IngestPipeline::new(config, &contract)
        .run(decoder.as_ref(), &source, &AtomicBool::new(false))
        .unwrap()
}

#[test]
fn anesthesia_row_with_zero_rvus_is_accepted() {
    let line = pprrvu_line("00100", "", "J", ["0.00", "0.00", "0.00", "0.00"], "");
    let text = format!("HDR PPRRVU 2025D\n{line}\nTRL 000001\n");
    let report = run_pprrvu(&config(), "PPRRVU2025_Oct.txt", &text);

    assert_eq!(report.summary.total, 1);
    assert_eq!(report.skipped_lines, 2);
    let accepted = report.publish().unwrap();
    let json = serde_json::to_value(&accepted[0]).unwrap();

    assert_eq!(json["hcpcs_code"], "00100");
    assert_eq!(json["status_code"], "J");
    assert_eq!(json["work_rvu"], "0.00");
    assert_eq!(json["modifiers"], serde_json::json!([]));
    assert_eq!(json["modifier_key"], "null");
    assert_eq!(json["row_num"], 1);
    assert_eq!(json["product_year"], "2025");
    assert!(is_valid_sha256(json["row_content_hash"].as_str().unwrap()));
    assert!(is_valid_sha256(json["source_file_sha256"].as_str().unwrap()));
}

#[test]
fn output_fields_lead_with_metadata() {
    let line = pprrvu_line("99213", "", "A", ["0.97", "1.09", "0.38", "0.07"], "");
    let report = run_pprrvu(&config(), "PPRRVU25_D.txt", &line);
    let accepted = report.publish().unwrap();
    let json = serde_json::to_string(&accepted[0]).unwrap();
    let order: Vec<usize> = [
        "\"release_id\"",
        "\"vintage_date\"",
        "\"product_year\"",
        "\"quarter_vintage\"",
        "\"source_filename\"",
        "\"source_file_sha256\"",
        "\"parsed_at\"",
        "\"row_content_hash\"",
        "\"row_num\"",
        "\"hcpcs_code\"",
    ]
    .iter()
    .map(|key| json.find(key).unwrap())
    .collect();
    assert!(order.windows(2).all(|w| w[0] < w[1]), "{json}");
}

#[test]
fn same_row_in_different_releases_hashes_identically() {
    let line = pprrvu_line("99213", "26", "A", ["0.97", "1.09", "0.38", "0.07"], "");
    let a = run_pprrvu(&config(), "PPRRVU2025_Q1.txt", &line);
    let b = run_pprrvu(&config(), "PPRRVU2025_Q4.txt", &line);
    assert_ne!(a.vintage.release_id, b.vintage.release_id);
    assert_eq!(
        a.accepted()[0].row_content_hash(),
        b.accepted()[0].row_content_hash()
    );
}

#[test]
fn verification_mode_accepts_clean_release() {
    let mut config = config();
    config.verify_determinism = true;
    let text = [
        pprrvu_line("99213", "", "A", ["0.97", "1.09", "0.38", "0.07"], ""),
        pprrvu_line("99213", "26", "A", ["0.97", "", "0.38", "0.07"], "1"),
    ]
    .join("\n");
    let report = run_pprrvu(&config, "PPRRVU2025_Q4.txt", &text);
    assert_eq!(report.accepted().len(), 2);
}

#[test]
fn quarantined_rows_block_publish_over_threshold() {
    let text = [
        pprrvu_line("99213", "", "A", ["0.97", "1.09", "0.38", "0.07"], ""),
        // na_indicator set with a non-facility PE present
        pprrvu_line("99214", "", "A", ["1.50", "1.40", "0.50", "0.10"], "1"),
    ]
    .join("\n");
    let report = run_pprrvu(&config(), "PPRRVU2025_Q4.txt", &text);
    assert_eq!(report.quarantined.len(), 1);
    assert_eq!(
        report.quarantined[0].findings[0].rule_id,
        "content.na_indicator_requires_null_pe"
    );
    assert!(matches!(
        report.publish(),
        Err(PipelineError::QuarantineRateExceeded { .. })
    ));
}

#[test]
fn gpci_run_with_reference_sets() {
    let config = config();
    let contract = contract("cms_gpci");
    let decoder = build_decoder(&config, &contract, None);
    let text = "MAC,State,Locality Code,Locality Name,GPCI Work,GPCI PE,GPCI MP\n\
                10112,AL,00,ALABAMA,1.000,0.869,0.575\n\
                01112,CA,54,SAN FRANCISCO,1.0820,1.460,0.496\n";
    let source = SourceFile {
        filename: "GPCI2025.csv",
        bytes: text.as_bytes(),
        release_id: None,
        manifest: None,
        timestamp: timestamp(),
    };
    let mut sets = ReferenceSets::new();
    sets.insert("locality_codes", ["00", "54"]);
    let report = IngestPipeline::new(&config, &contract)
        .with_reference_sets(sets)
        .run(decoder.as_ref(), &source, &AtomicBool::new(false))
        .unwrap();

    // effective_date is absent from the header; no reference set is missing
    assert!(report.warnings.iter().any(|w| w.contains("effective_date")));
    assert!(report.warnings.iter().all(|w| !w.contains("reference set")));
    assert_eq!(report.vintage.quarter_vintage, "2025_annual");
    let accepted = report.publish().unwrap();
    assert_eq!(accepted.len(), 2);
    // half_up rounding to scale 3
    let json = serde_json::to_value(&accepted[1]).unwrap();
    assert_eq!(json["gpci_work"], "1.082");
    assert_eq!(json["locality_name"], "San Francisco");
}

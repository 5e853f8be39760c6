//! Integration test: the alignment gate over the shipped definitions.
//!
//! Loads every contract in `contracts/`, every layout the builtin registry
//! ships, and every API mapping in `mappings/`, and requires the full audit
//! to come back clean. This is the same check `cmsref audit` runs in CI.

use std::path::PathBuf;

use cmsref_schema::{audit_all, AlignmentError, ContractStore, LayoutRegistry, SchemaError};

fn repo_root() -> PathBuf {
    let mut dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    dir.pop(); // crates/
    dir.pop(); // repo root
    dir
}

fn store() -> ContractStore {
    ContractStore::at_root(repo_root())
}

#[test]
fn shipped_definitions_are_aligned() {
    let registry = LayoutRegistry::builtin().expect("builtin layouts load");
    let report = audit_all(&store(), &registry).expect("all contracts load");
    assert!(report.is_clean(), "{report}");
    assert!(report.datasets.len() >= 3, "{report}");
}

#[test]
fn every_shipped_dataset_has_a_mapping() {
    let registry = LayoutRegistry::builtin().unwrap();
    let report = audit_all(&store(), &registry).unwrap();
    for d in &report.datasets {
        assert!(d.mapping_checked, "{} has no API mapping", d.dataset);
    }
}

#[test]
fn disk_layouts_match_builtin_registry() {
    let store = store();
    let registry = LayoutRegistry::builtin().unwrap();
    for layout in registry.iter() {
        let from_disk = store
            .load_layout(&layout.dataset_name, &layout.vintage)
            .unwrap();
        assert_eq!(&from_disk, layout);
    }
}

#[test]
fn pprrvu_resolves_to_latest_contract() {
    let contract = store().load_contract("cms_pprrvu", None).unwrap();
    assert_eq!(contract.version, "1.1");
    assert_eq!(contract.natural_keys, ["hcpcs_code", "modifiers"]);
    assert_eq!(contract.content_rules.len(), 1);
}

#[test]
fn unknown_dataset_is_contract_not_found() {
    let err = store().load_contract("cms_nonexistent", None).unwrap_err();
    assert!(matches!(err, SchemaError::ContractNotFound { .. }));
}

#[test]
fn contract_fingerprints_are_distinct_per_version() {
    let store = store();
    let v10 = store.load_contract("cms_pprrvu", Some("1.0")).unwrap();
    let v11 = store.load_contract("cms_pprrvu", Some("1.1")).unwrap();
    assert_ne!(v10.digest().unwrap(), v11.digest().unwrap());
}

#[test]
fn drifted_layout_fails_the_gate() {
    let dir = tempfile::tempdir().unwrap();
    let root = repo_root();
    for sub in ["contracts", "mappings"] {
        std::fs::create_dir(dir.path().join(sub)).unwrap();
    }
    std::fs::copy(
        root.join("contracts/cms_locco_v1.0.json"),
        dir.path().join("contracts/cms_locco_v1.0.json"),
    )
    .unwrap();
    let store = ContractStore::at_root(dir.path());

    let mut registry = LayoutRegistry::new();
    let mut layout = LayoutRegistry::builtin()
        .unwrap()
        .resolve("cms_locco", None)
        .unwrap()
        .clone();
    if let Some(col) = layout.columns.remove("counties") {
        layout.columns.insert("county_names".into(), col);
    }
    registry.register(layout);

    let report = audit_all(&store, &registry).unwrap();
    assert!(!report.is_clean());
    assert_eq!(report.errors.len(), 2, "{report}");
}

#[test]
fn malformed_contract_is_reported_and_the_audit_continues() {
    let dir = tempfile::tempdir().unwrap();
    let root = repo_root();
    for sub in ["contracts", "mappings"] {
        std::fs::create_dir(dir.path().join(sub)).unwrap();
    }
    std::fs::copy(
        root.join("contracts/cms_locco_v1.0.json"),
        dir.path().join("contracts/cms_locco_v1.0.json"),
    )
    .unwrap();
    std::fs::write(dir.path().join("contracts/cms_gpci_v1.0.json"), "{\"dataset_name\": ").unwrap();
    let store = ContractStore::at_root(dir.path());
    let registry = LayoutRegistry::builtin().unwrap();

    let report = audit_all(&store, &registry).expect("a bad contract is a finding, not an abort");
    assert!(!report.is_clean());
    assert!(
        report.errors.iter().any(|e| matches!(
            e,
            AlignmentError::Unloadable { dataset, definition, .. }
                if dataset == "cms_gpci" && definition == "contract v1.0"
        )),
        "{report}"
    );
    // cms_locco was still audited against its layout.
    assert!(report.datasets.iter().any(|d| d.dataset == "cms_locco"));
}

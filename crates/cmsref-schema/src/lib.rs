//! # cmsref-schema: Contracts, Layouts & Alignment
//!
//! Loads the definitions that drive every ingestion run and checks that they
//! agree with each other.
//!
//! ## Schema Contracts (`contract`, `store`)
//!
//! A [`SchemaContract`] fixes the column types, numeric precision, natural
//! keys, and hash composition of one dataset version. Contracts live on disk
//! as `contracts/{dataset}_v{version}.json` and are loaded through
//! [`ContractStore`], which meta-validates every file (see [`validate`]) and
//! rejects contracts that break their own invariants.
//!
//! ## Layouts (`layout`)
//!
//! A [`LayoutDefinition`] gives fixed-width column positions for one dataset
//! vintage. Layouts are served from an explicit [`LayoutRegistry`] populated
//! by `register` calls.
//!
//! ## Alignment (`audit`)
//!
//! The auditors compare contract, layout, and API mapping and report every
//! disagreement at once. They are the CI gate: a single [`AlignmentError`]
//! fails the build.
//!
//! ## Crate Policy
//!
//! - Depends only on `cmsref-core` internally.
//! - Definitions are immutable after load.

pub mod audit;
pub mod contract;
pub mod error;
pub mod layout;
pub mod store;
pub mod validate;

pub use audit::{
    audit_all, audit_contract, audit_layout_schema, audit_schema_api_mapping, AlignmentError,
    AuditReport, AuditedDataset,
};
pub use contract::{
    Casing, ColumnSpec, ColumnType, ContentRule, ReferenceCheck, RoundingMode, SchemaContract,
};
pub use error::{Result, SchemaError, Violation};
pub use layout::{LayoutColumn, LayoutDefinition, LayoutRegistry};
pub use store::{compare_versions, ApiMapping, ContractStore};
pub use validate::DocumentKind;

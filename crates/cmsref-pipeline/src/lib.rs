//! # cmsref-pipeline: Ingestion Runs
//!
//! Ties decoding, normalization, validation, and hashing into one run over
//! one source file.
//!
//! - [`config`]: [`PipelineConfig`], loaded once and passed by reference.
//! - [`lifecycle`]: the per-row state machine.
//! - [`hasher`]: deterministic row content hashes over `column_order`.
//! - [`quarantine`]: append-only intake of rejected rows and run summaries.
//! - [`run`]: [`IngestPipeline`], cancellation, the quarantine-rate publish
//!   gate, and optional determinism verification.
//!
//! ## Data Flow
//!
//! ```text
//! bytes ──▶ Decoder ──▶ ParsedRecord ──▶ structural ──▶ content ──▶ referential ──▶ hash ──▶ accepted
//!                                            │              │              │
//!                                            └──────────────┴──────────────┴──▶ quarantine
//! ```

pub mod config;
pub mod error;
pub mod hasher;
pub mod lifecycle;
pub mod quarantine;
pub mod run;

pub use config::PipelineConfig;
pub use error::{PipelineError, Result};
pub use hasher::{canonical_row, compute_row_hash, hash_record, render_value, verify_hash};
pub use lifecycle::{LifecycleError, RowLifecycle, RowState};
pub use quarantine::{QuarantineManager, QuarantineRecord, QuarantineSummary};
pub use run::{build_decoder, IngestPipeline, RunReport, SourceFile};

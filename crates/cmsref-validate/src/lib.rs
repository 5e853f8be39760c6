//! # cmsref-validate: Validation Engine
//!
//! Runs contract-driven checks over [`cmsref_ingest::ParsedRecord`]s in
//! three tiers, in fixed order:
//!
//! 1. **Structural** ([`structural`]): decode and normalize findings,
//!    nullability, patterns, enum whitelists, decimal scale, precision,
//!    rounding and `multipleOf`, and control characters.
//! 2. **Content** ([`content`]): indicator-gated nullability rules,
//!    exclusive plausibility bounds, and run-level duplicate natural keys.
//! 3. **Referential** ([`referential`]): existence checks against
//!    caller-injected [`ReferenceSets`].
//!
//! A tier runs only when every earlier tier produced no findings, and each
//! tier reports its complete list. Findings are data: the engine never
//! returns `Err` for a bad row.

pub mod content;
pub mod engine;
pub mod error;
pub mod referential;
pub mod structural;

pub use engine::{ValidationEngine, ValidationOutcome};
pub use error::{Result, ValidateError};
pub use referential::ReferenceSets;

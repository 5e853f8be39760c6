//! # cmsref-core: Foundational Types
//!
//! The leaf of the cmsref crate graph. Every other crate depends on
//! `cmsref-core`; it depends on nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **`CanonicalBytes` newtype.** Row content hashes and contract
//!    fingerprints are computed only from `CanonicalBytes`, which can only be
//!    built by the canonical rendering paths in [`canonical`].
//!
//! 2. **`sha256_digest()` accepts only `&CanonicalBytes`.** The one exception
//!    is [`source_sha256_hex`], which fingerprints raw source files exactly as
//!    they were received.
//!
//! 3. **Exact decimals.** Numeric reference values are `rust_decimal::Decimal`
//!    and keep their literal scale. No floats anywhere on a hash path.
//!
//! 4. **Findings are data.** Row-level validation outcomes are
//!    [`ValidationFinding`] values, never errors.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `cmsref-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod canonical;
pub mod digest;
pub mod error;
pub mod finding;
pub mod identity;
pub mod temporal;
pub mod value;

pub use canonical::{CanonicalBytes, FIELD_DELIMITER};
pub use digest::{is_valid_sha256, sha256_digest, sha256_hex, source_sha256_hex, ContentDigest};
pub use error::{CanonicalizationError, CoreError, TemporalError};
pub use finding::{Tier, ValidationFinding};
pub use identity::{ReleaseId, RunId};
pub use temporal::{calculate_effective_dates, parse_date, Cycle, Quarter, Timestamp};
pub use value::{FieldValue, ModifierSet, NULL_MODIFIER_KEY};

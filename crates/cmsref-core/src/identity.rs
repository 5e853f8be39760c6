//! # Identifiers
//!
//! Newtypes for run and release identifiers so that one cannot be passed
//! where the other is expected.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for one pipeline run over one source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new random run identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Access the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "run:{}", self.0)
    }
}

/// Standardized release identifier: `{dataset}_{year}_{Qn|annual}_{timestamp}`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReleaseId(pub String);

impl ReleaseId {
    /// Borrow the identifier text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ReleaseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_ids_are_distinct() {
        assert_ne!(RunId::new(), RunId::new());
    }

    #[test]
    fn run_id_display_prefix() {
        assert!(RunId::new().to_string().starts_with("run:"));
    }

    #[test]
    fn release_id_is_transparent_in_json() {
        let id = ReleaseId("cms_pprrvu_2025_Q4_20251001T000000Z".to_string());
        assert_eq!(
            serde_json::to_string(&id).unwrap(),
            "\"cms_pprrvu_2025_Q4_20251001T000000Z\""
        );
    }
}

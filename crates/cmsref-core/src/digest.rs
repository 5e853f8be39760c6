//! # Content Digest
//!
//! SHA-256 digests for row content hashes, contract fingerprints, and source
//! file fingerprints. Every digest renders as exactly 64 lowercase hex
//! characters (`^[a-f0-9]{64}$`).

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::canonical::CanonicalBytes;
use crate::error::CoreError;

/// A SHA-256 digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentDigest {
    /// The raw 32-byte digest value.
    pub bytes: [u8; 32],
}

impl ContentDigest {
    /// Wrap raw digest bytes.
    pub fn new(bytes: [u8; 32]) -> Self {
        Self { bytes }
    }

    /// Parse a 64-character lowercase hex string.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidDigest` for anything that is not exactly 64
    /// lowercase hex characters. Uppercase is rejected so that a digest has a
    /// single textual form.
    pub fn from_hex(s: &str) -> Result<Self, CoreError> {
        if !is_valid_sha256(s) {
            return Err(CoreError::InvalidDigest(s.to_string()));
        }
        let mut bytes = [0u8; 32];
        for (i, chunk) in s.as_bytes().chunks(2).enumerate() {
            let pair = std::str::from_utf8(chunk).map_err(|_| CoreError::InvalidDigest(s.to_string()))?;
            bytes[i] = u8::from_str_radix(pair, 16).map_err(|_| CoreError::InvalidDigest(s.to_string()))?;
        }
        Ok(Self { bytes })
    }

    /// Render the digest as a lowercase hex string.
    pub fn to_hex(&self) -> String {
        self.bytes.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl std::fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sha256:{}", self.to_hex())
    }
}

/// SHA-256 hex digest pattern: exactly 64 lowercase hex characters.
pub fn is_valid_sha256(s: &str) -> bool {
    s.len() == 64 && s.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
}

/// Compute a SHA-256 digest from canonical bytes.
pub fn sha256_digest(data: &CanonicalBytes) -> ContentDigest {
    digest_bytes(data.as_bytes())
}

/// Compute a SHA-256 hex string from canonical bytes.
pub fn sha256_hex(data: &CanonicalBytes) -> String {
    sha256_digest(data).to_hex()
}

/// Fingerprint a source file exactly as received.
///
/// This is the only digest path over non-canonical bytes: the value recorded
/// as `source_file_sha256` must identify the upstream artifact byte-for-byte.
pub fn source_sha256_hex(raw: &[u8]) -> String {
    digest_bytes(raw).to_hex()
}

fn digest_bytes(raw: &[u8]) -> ContentDigest {
    let hash = Sha256::digest(raw);
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&hash);
    ContentDigest::new(bytes)
}

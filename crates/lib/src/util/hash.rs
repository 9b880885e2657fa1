//! SHA-256 helpers for verifying downloaded archives.

use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of a byte slice.
pub fn sha256_hex(bytes: &[u8]) -> String {
  let mut hasher = Sha256::new();
  hasher.update(bytes);
  hex::encode(hasher.finalize())
}

/// Compare a computed digest against an expected one, ignoring case and
/// surrounding whitespace in the expected value.
pub fn digest_matches(actual: &str, expected: &str) -> bool {
  actual.eq_ignore_ascii_case(expected.trim())
}

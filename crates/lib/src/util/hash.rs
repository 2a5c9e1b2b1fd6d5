//! Content hashing.
//!
//! Configuration tables and values are compared by content rather than by
//! identity, so two structurally equal tables loaded from different places
//! hash to the same [`ContentHash`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// A full 64-character SHA-256 hash of serialized content.
///
/// # Format
///
/// The hash is a lowercase hexadecimal string.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub String);

impl ContentHash {
  /// Hash a JSON value.
  ///
  /// `serde_json::Value` serializes with sorted object keys, so the hash is
  /// independent of the order in which keys were inserted.
  pub fn of_value(value: &Value) -> Self {
    hash_bytes(value.to_string().as_bytes())
  }
}

impl std::fmt::Display for ContentHash {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Hash arbitrary bytes.
pub fn hash_bytes(bytes: &[u8]) -> ContentHash {
  let mut hasher = Sha256::new();
  hasher.update(bytes);
  ContentHash(hex::encode(hasher.finalize()))
}

//! Hashing utilities for content verification.
//!
//! This module provides:
//! - `ContentHash`: A full 64-character SHA-256 hash
//! - `hash_file()`: Single file hashing
//! - `hash_bytes()`: Arbitrary byte hashing

use std::fs;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A full 64-character SHA-256 hash for content verification.
///
/// The hash is a lowercase hexadecimal string. Comparisons against
/// user-declared hashes go through [`ContentHash::matches`], which ignores case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(pub String);

impl ContentHash {
  /// Check whether a declared hex digest names this hash.
  pub fn matches(&self, declared: &str) -> bool {
    self.0.eq_ignore_ascii_case(declared.trim())
  }
}

impl std::fmt::Display for ContentHash {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Hash a file's contents.
///
/// Returns the full 64-character SHA-256 hash of the file.
pub fn hash_file(path: &Path) -> std::io::Result<ContentHash> {
  let mut file = fs::File::open(path)?;

  let mut hasher = Sha256::new();
  let mut buffer = [0u8; 8192];

  loop {
    let bytes_read = file.read(&mut buffer)?;
    if bytes_read == 0 {
      break;
    }
    hasher.update(&buffer[..bytes_read]);
  }

  Ok(ContentHash(hex::encode(hasher.finalize())))
}

/// Hash arbitrary bytes.
pub fn hash_bytes(data: &[u8]) -> ContentHash {
  let mut hasher = Sha256::new();
  hasher.update(data);
  ContentHash(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::tempdir;

  #[test]
  fn hash_file_matches_hash_bytes() {
    let temp = tempdir().unwrap();
    let file_path = temp.path().join("test.txt");
    fs::write(&file_path, "hello world").unwrap();

    let hash = hash_file(&file_path).unwrap();
    assert_eq!(hash, hash_bytes(b"hello world"));
    assert_eq!(
      hash.0,
      "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
    );
  }

  #[test]
  fn hash_file_spans_multiple_buffers() {
    let temp = tempdir().unwrap();
    let file_path = temp.path().join("big.bin");
    let data = vec![7u8; 8192 * 3 + 17];
    fs::write(&file_path, &data).unwrap();

    assert_eq!(hash_file(&file_path).unwrap(), hash_bytes(&data));
  }

  #[test]
  fn matches_ignores_case_and_whitespace() {
    let hash = hash_bytes(b"abc");
    let upper = format!(" {} ", hash.0.to_uppercase());
    assert!(hash.matches(&upper));
    assert!(!hash.matches("deadbeef"));
  }

  #[test]
  fn hash_missing_file_is_io_error() {
    let temp = tempdir().unwrap();
    assert!(hash_file(&temp.path().join("missing")).is_err());
  }
}

//! Content fingerprints.
//!
//! A fingerprint is the full SHA-256 of a value's JSON serialization. Records
//! that feed into a fingerprint keep their maps in `BTreeMap`s so two
//! structurally equal values always serialize, and therefore hash, the same.

use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub type HashError = serde_json::Error;

/// A lowercase hexadecimal SHA-256 digest (64 characters).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(pub String);

impl Fingerprint {
  pub fn as_str(&self) -> &str {
    &self.0
  }

  /// First 12 bytes, for log lines and CLI output. A value that can't be
  /// cut there (too short, or hand-edited to non-ASCII) is returned whole.
  pub fn short(&self) -> &str {
    self.0.get(..12).unwrap_or(&self.0)
  }
}

impl std::fmt::Display for Fingerprint {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

pub trait Fingerprinted: Serialize {
  fn fingerprint(&self) -> Result<Fingerprint, HashError> {
    let serialized = serde_json::to_vec(self)?;
    Ok(hash_bytes(&serialized))
  }
}

/// Hash arbitrary bytes.
pub fn hash_bytes(data: &[u8]) -> Fingerprint {
  let mut hasher = Sha256::new();
  hasher.update(data);
  Fingerprint(hex::encode(hasher.finalize()))
}

/// Hash a file's contents.
pub async fn hash_file(path: &Path) -> std::io::Result<Fingerprint> {
  let data = tokio::fs::read(path).await?;
  Ok(hash_bytes(&data))
}

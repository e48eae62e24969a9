//! The reconciliation ledger: what this node has applied.
//!
//! The ledger lives at `<root>/state.json` and records every application
//! that has been laid out (and its service installed), plus every cached
//! download keyed by path with the fingerprint of the source it came from.
//! It is rewritten after each unit of work, so an interrupted run resumes
//! from the last completed item.

mod validate;

pub use validate::ValidationReport;

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::Application;
use crate::util::hash::{Fingerprint, HashError};

#[derive(Debug, Error)]
pub enum LedgerError {
  #[error("failed to read ledger {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to write ledger {path}: {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to serialize ledger: {0}")]
  Serialize(#[from] serde_json::Error),

  #[error("failed to clean up {path}: {source}")]
  Cleanup {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error(transparent)]
  Service(#[from] crate::service::ServiceError),
}

/// Applied state of the node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackState {
  #[serde(default)]
  pub applications: Vec<Application>,
  /// Download path → fingerprint of the source location it was fetched from.
  #[serde(default)]
  pub downloads: BTreeMap<String, Fingerprint>,
}

impl StackState {
  /// Load the ledger at `path`.
  ///
  /// A missing file is an empty ledger. A file that can't be parsed is
  /// logged and also treated as empty; validation then cleans up whatever
  /// it described.
  pub async fn load(path: &Path) -> Result<Self, LedgerError> {
    let content = match tokio::fs::read_to_string(path).await {
      Ok(content) => content,
      Err(e) if e.kind() == io::ErrorKind::NotFound => {
        debug!(path = %path.display(), "no ledger, starting empty");
        return Ok(Self::default());
      }
      Err(source) => {
        return Err(LedgerError::Read {
          path: path.to_path_buf(),
          source,
        });
      }
    };

    match serde_json::from_str(&content) {
      Ok(state) => Ok(state),
      Err(e) => {
        warn!(path = %path.display(), error = %e, "ledger is malformed, treating as empty");
        Ok(Self::default())
      }
    }
  }

  /// Write the ledger atomically (temp file + rename).
  pub async fn save(&self, path: &Path) -> Result<(), LedgerError> {
    let write_err = |source| LedgerError::Write {
      path: path.to_path_buf(),
      source,
    };
    let json = serde_json::to_string_pretty(self)?;
    if let Some(parent) = path.parent() {
      tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, json).await.map_err(write_err)?;
    tokio::fs::rename(&tmp, path).await.map_err(write_err)?;
    debug!(path = %path.display(), "saved ledger");
    Ok(())
  }

  /// Content fingerprints of the recorded applications.
  pub fn application_fingerprints(&self) -> Result<Vec<Fingerprint>, HashError> {
    self.applications.iter().map(Application::content_fingerprint).collect()
  }
}

//! On-disk layout of a pullstack node.
//!
//! # Layout
//!
//! ```text
//! <root>/
//! ├── applications/<name>/   # extracted application trees
//! ├── downloads/<name><ext>  # cached source artifacts
//! ├── run/
//! ├── tmp/
//! ├── state.json             # reconciliation ledger
//! └── services.state         # built-in supervisor table
//! ```

use std::io;
use std::path::{Path, PathBuf};

use crate::consts::{
  APP_NAME, APPLICATIONS_DIR, DOWNLOADS_DIR, LEDGER_FILENAME, RUN_DIR, SUPERVISOR_STATE_FILENAME, TMP_DIR,
};

/// Resolved directory layout rooted at a single directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackPaths {
  root: PathBuf,
}

impl StackPaths {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  /// Default root for this host: machine-wide when elevated, under `$HOME` otherwise.
  #[cfg(not(windows))]
  pub fn default_root(elevated: bool) -> PathBuf {
    if elevated {
      return PathBuf::from("/opt").join(APP_NAME);
    }
    home_dir().join(APP_NAME)
  }

  /// Default root for this host.
  #[cfg(windows)]
  pub fn default_root(_elevated: bool) -> PathBuf {
    let program_data = std::env::var("PROGRAMDATA").unwrap_or_else(|_| "C:\\ProgramData".to_string());
    PathBuf::from(program_data).join(APP_NAME)
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  pub fn applications_dir(&self) -> PathBuf {
    self.root.join(APPLICATIONS_DIR)
  }

  pub fn downloads_dir(&self) -> PathBuf {
    self.root.join(DOWNLOADS_DIR)
  }

  pub fn run_dir(&self) -> PathBuf {
    self.root.join(RUN_DIR)
  }

  pub fn tmp_dir(&self) -> PathBuf {
    self.root.join(TMP_DIR)
  }

  pub fn ledger_file(&self) -> PathBuf {
    self.root.join(LEDGER_FILENAME)
  }

  pub fn supervisor_state_file(&self) -> PathBuf {
    self.root.join(SUPERVISOR_STATE_FILENAME)
  }

  /// Path an application is extracted into.
  pub fn application_path(&self, name: &str) -> PathBuf {
    self.applications_dir().join(name)
  }

  /// Path a source artifact is downloaded to; `ext` keeps the archive suffix
  /// so the extractor can be chosen from the file name.
  pub fn download_path(&self, name: &str, ext: &str) -> PathBuf {
    self.downloads_dir().join(format!("{}{}", name, ext))
  }

  /// Create the root and every well-known subdirectory.
  pub fn ensure(&self) -> io::Result<()> {
    for dir in [
      self.root.clone(),
      self.applications_dir(),
      self.downloads_dir(),
      self.run_dir(),
      self.tmp_dir(),
    ] {
      std::fs::create_dir_all(&dir)?;
    }
    Ok(())
  }
}

/// Returns the user's home directory
#[cfg(not(windows))]
fn home_dir() -> PathBuf {
  std::env::var("HOME")
    .map(PathBuf::from)
    .unwrap_or_else(|_| std::env::temp_dir())
}

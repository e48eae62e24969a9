//! Bringing the ledger back in line with what is actually on disk and which
//! services actually exist.

use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::{LedgerError, StackState};
use crate::consts::SERVICE_PREFIX;
use crate::platform::StackPaths;
use crate::service::ServiceManager;

/// What validation removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
  pub pruned_applications: Vec<String>,
  pub pruned_downloads: Vec<String>,
  pub removed_paths: Vec<PathBuf>,
  pub removed_services: Vec<String>,
}

impl ValidationReport {
  pub fn is_clean(&self) -> bool {
    self.pruned_applications.is_empty()
      && self.pruned_downloads.is_empty()
      && self.removed_paths.is_empty()
      && self.removed_services.is_empty()
  }
}

impl StackState {
  /// Load the ledger from `paths` and validate it, saving it back if
  /// validation changed anything.
  pub async fn load_validated(
    paths: &StackPaths,
    services: &dyn ServiceManager,
  ) -> Result<(Self, ValidationReport), LedgerError> {
    let mut state = Self::load(&paths.ledger_file()).await?;
    let report = state.validate(paths, services).await?;
    if !report.pruned_applications.is_empty() || !report.pruned_downloads.is_empty() {
      state.save(&paths.ledger_file()).await?;
    }
    Ok((state, report))
  }

  /// Reconcile the ledger against ground truth.
  ///
  /// - stray files in the applications directory are deleted;
  /// - application directories the ledger doesn't track are deleted;
  /// - recorded applications whose directory is gone, or whose declared
  ///   service is not installed, are pruned along with their leftovers;
  /// - prefixed services that belong to no recorded application are
  ///   uninstalled;
  /// - recorded downloads whose file is gone are pruned, and files in the
  ///   downloads directory the ledger doesn't track are deleted.
  pub async fn validate(
    &mut self,
    paths: &StackPaths,
    services: &dyn ServiceManager,
  ) -> Result<ValidationReport, LedgerError> {
    let mut report = ValidationReport::default();

    // Applications directory: only directories survive.
    let mut existing_dirs = BTreeSet::new();
    for (path, is_dir) in read_dir(&paths.applications_dir()).await? {
      if is_dir {
        existing_dirs.insert(path);
      } else {
        info!(path = %path.display(), "removing stray file in applications");
        remove_path(&path).await?;
        report.removed_paths.push(path);
      }
    }

    let installed: BTreeSet<String> = services.list().await?.into_iter().collect();

    let mut kept = Vec::with_capacity(self.applications.len());
    for app in std::mem::take(&mut self.applications) {
      let dir = app.application_path(paths);
      let has_dir = existing_dirs.contains(&dir);
      let has_service = installed.contains(&app.service_name());
      if has_dir && (!app.has_service() || has_service) {
        kept.push(app);
        continue;
      }

      warn!(app = %app.name, has_dir, has_service, "pruning invalid application");
      if has_dir {
        remove_path(&dir).await?;
        report.removed_paths.push(dir);
      }
      if has_service {
        services.uninstall(&app.service_name()).await?;
        report.removed_services.push(app.service_name());
      }
      report.pruned_applications.push(app.name);
    }
    self.applications = kept;

    // Directories nobody tracks.
    let tracked_dirs: BTreeSet<PathBuf> = self.applications.iter().map(|a| a.application_path(paths)).collect();
    for dir in existing_dirs.difference(&tracked_dirs) {
      if report.removed_paths.contains(dir) {
        continue;
      }
      info!(path = %dir.display(), "removing untracked application directory");
      remove_path(dir).await?;
      report.removed_paths.push(dir.clone());
    }

    // Services nobody owns.
    let owned: BTreeSet<String> = self
      .applications
      .iter()
      .filter(|a| a.has_service())
      .map(|a| a.service_name())
      .collect();
    for name in installed.iter().filter(|n| n.starts_with(SERVICE_PREFIX)) {
      if owned.contains(name) || report.removed_services.contains(name) {
        continue;
      }
      info!(service = %name, "uninstalling untracked service");
      services.uninstall(name).await?;
      report.removed_services.push(name.clone());
    }

    // Downloads.
    let mut tracked_downloads = BTreeSet::new();
    let mut missing = Vec::new();
    for path in self.downloads.keys() {
      if tokio::fs::try_exists(path).await.unwrap_or(false) {
        tracked_downloads.insert(PathBuf::from(path));
      } else {
        missing.push(path.clone());
      }
    }
    for path in missing {
      warn!(path = %path, "pruning missing download");
      self.downloads.remove(&path);
      report.pruned_downloads.push(path);
    }
    for (path, _) in read_dir(&paths.downloads_dir()).await? {
      if !tracked_downloads.contains(&path) {
        info!(path = %path.display(), "removing untracked download");
        remove_path(&path).await?;
        report.removed_paths.push(path);
      }
    }

    Ok(report)
  }
}

/// Entries of `dir` with whether each is a directory. A missing `dir` is empty.
async fn read_dir(dir: &Path) -> Result<Vec<(PathBuf, bool)>, LedgerError> {
  let cleanup_err = |source| LedgerError::Cleanup {
    path: dir.to_path_buf(),
    source,
  };
  let mut entries = match tokio::fs::read_dir(dir).await {
    Ok(entries) => entries,
    Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
    Err(e) => return Err(cleanup_err(e)),
  };
  let mut out = Vec::new();
  while let Some(entry) = entries.next_entry().await.map_err(cleanup_err)? {
    let is_dir = entry.file_type().await.map_err(cleanup_err)?.is_dir();
    out.push((entry.path(), is_dir));
  }
  out.sort();
  Ok(out)
}

/// Remove a file or directory tree. Missing is fine.
pub(crate) async fn remove_path(path: &Path) -> Result<(), LedgerError> {
  let result = match tokio::fs::symlink_metadata(path).await {
    Ok(meta) if meta.is_dir() => tokio::fs::remove_dir_all(path).await,
    Ok(_) => tokio::fs::remove_file(path).await,
    Err(e) => Err(e),
  };
  match result {
    Ok(()) => Ok(()),
    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
    Err(source) => Err(LedgerError::Cleanup {
      path: path.to_path_buf(),
      source,
    }),
  }
}

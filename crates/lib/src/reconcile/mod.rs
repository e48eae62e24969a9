//! The reconciliation engine.
//!
//! [`reconcile`] moves a node from the state recorded in its ledger to a
//! desired configuration in four ordered steps:
//!
//! 1. delete cached downloads whose source is no longer wanted;
//! 2. fetch downloads for sources not yet cached;
//! 3. remove applications whose fingerprint is no longer wanted (service
//!    first, then directory);
//! 4. lay out and start applications not yet recorded.
//!
//! Sources whose archive format is unknown are rejected before step 1. The
//! ledger is saved after every item, so if a step fails the items already
//! done stay done and the next run picks up from the failed one.

pub mod diff;

pub use diff::{ApplicationDiff, SourceDiff, SourceEntry, diff_applications, diff_sources};

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::archive::ArchiveError;
use crate::config::{Application, Config};
use crate::consts::APPLICATION_FILE_MODE;
use crate::context::StackContext;
use crate::ledger::{LedgerError, StackState};
use crate::service::ServiceError;
use crate::storage::StorageError;
use crate::util::hash::HashError;

#[derive(Debug, Error)]
pub enum ReconcileError {
  #[error("failed to fingerprint configuration: {0}")]
  Fingerprint(#[from] HashError),

  #[error(transparent)]
  Ledger(#[from] LedgerError),

  #[error("failed to remove download {path}: {source}")]
  RemoveDownload {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to download source for '{app}': {source}")]
  Fetch {
    app: String,
    #[source]
    source: StorageError,
  },

  #[error("failed to extract '{app}': {source}")]
  Extract {
    app: String,
    #[source]
    source: ArchiveError,
  },

  #[error("failed to {action} {path} for '{app}': {source}")]
  Layout {
    app: String,
    action: &'static str,
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to {action} service for '{app}': {source}")]
  Service {
    app: String,
    action: &'static str,
    #[source]
    source: ServiceError,
  },
}

/// What a reconciliation did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
  pub downloads_removed: usize,
  pub downloads_fetched: usize,
  pub applications_removed: usize,
  pub applications_installed: usize,
  pub applications_unchanged: usize,
}

impl ReconcileReport {
  /// True when nothing was mutated.
  pub fn is_noop(&self) -> bool {
    self.downloads_removed == 0
      && self.downloads_fetched == 0
      && self.applications_removed == 0
      && self.applications_installed == 0
  }
}

/// Drive `state` toward `desired`, saving the ledger after each item.
pub async fn reconcile(
  ctx: &StackContext,
  state: &mut StackState,
  desired: &Config,
) -> Result<ReconcileReport, ReconcileError> {
  let mut report = ReconcileReport::default();
  let ledger = ctx.paths.ledger_file();

  // Structural problems abort before anything is touched.
  for app in &desired.applications {
    let archive = app.download_path(&ctx.paths);
    if ctx.archives.extractor_for(&archive).is_none() {
      return Err(ReconcileError::Extract {
        app: app.name.clone(),
        source: ArchiveError::UnknownFormat(archive),
      });
    }
  }

  let sources = diff_sources(state, desired, &ctx.paths)?;
  debug!(
    remove = sources.to_remove.len(),
    fetch = sources.to_fetch.len(),
    "sources diff"
  );

  for entry in &sources.to_remove {
    info!(path = %entry.path, "removing download");
    remove_file_if_exists(Path::new(&entry.path))
      .await
      .map_err(|source| ReconcileError::RemoveDownload {
        path: PathBuf::from(&entry.path),
        source,
      })?;
    state.downloads.remove(&entry.path);
    state.save(&ledger).await?;
    report.downloads_removed += 1;
  }

  for (entry, app) in &sources.to_fetch {
    ctx
      .storage
      .download(&app.source, Path::new(&entry.path))
      .await
      .map_err(|source| ReconcileError::Fetch {
        app: app.name.clone(),
        source,
      })?;
    state.downloads.insert(entry.path.clone(), entry.fingerprint.clone());
    state.save(&ledger).await?;
    report.downloads_fetched += 1;
  }

  let apps = diff_applications(state, desired)?;
  debug!(
    remove = apps.to_remove.len(),
    install = apps.to_install.len(),
    unchanged = apps.unchanged.len(),
    "applications diff"
  );
  report.applications_unchanged = apps.unchanged.len();

  for (fingerprint, app) in &apps.to_remove {
    remove_application(ctx, app).await?;
    if let Some(pos) = state
      .applications
      .iter()
      .position(|a| a.content_fingerprint().ok().as_ref() == Some(fingerprint))
    {
      state.applications.remove(pos);
    }
    state.save(&ledger).await?;
    report.applications_removed += 1;
  }

  for (fingerprint, app) in &apps.to_install {
    install_application(ctx, app).await?;
    state.applications.push(app.clone());
    state.save(&ledger).await?;
    info!(app = %app.name, fingerprint = %fingerprint.short(), "installed application");
    report.applications_installed += 1;
  }

  for name in &apps.unchanged {
    debug!(app = %name, "unchanged");
  }

  info!(
    downloads_removed = report.downloads_removed,
    downloads_fetched = report.downloads_fetched,
    applications_removed = report.applications_removed,
    applications_installed = report.applications_installed,
    applications_unchanged = report.applications_unchanged,
    "reconciliation complete"
  );
  Ok(report)
}

async fn remove_application(ctx: &StackContext, app: &Application) -> Result<(), ReconcileError> {
  info!(app = %app.name, service = %app.service_name(), "removing application");
  ctx
    .services
    .uninstall(&app.service_name())
    .await
    .map_err(|source| ReconcileError::Service {
      app: app.name.clone(),
      action: "uninstall",
      source,
    })?;

  let dir = app.application_path(&ctx.paths);
  remove_dir_if_exists(&dir)
    .await
    .map_err(|source| layout_err(app, "remove", &dir, source))
}

async fn install_application(ctx: &StackContext, app: &Application) -> Result<(), ReconcileError> {
  let dir = app.application_path(&ctx.paths);
  info!(app = %app.name, dir = %dir.display(), "installing application");

  // Leftovers from an interrupted attempt.
  remove_dir_if_exists(&dir)
    .await
    .map_err(|source| layout_err(app, "clear", &dir, source))?;

  ctx
    .archives
    .extract(&app.download_path(&ctx.paths), &dir)
    .await
    .map_err(|source| ReconcileError::Extract {
      app: app.name.clone(),
      source,
    })?;

  for (name, target) in &app.links {
    let link = dir.join(name);
    let original = dir.join(target);
    debug!(app = %app.name, link = %link.display(), target = %original.display(), "linking");
    create_parent(&link).await.map_err(|source| layout_err(app, "link", &link, source))?;
    tokio::fs::hard_link(&original, &link)
      .await
      .map_err(|source| layout_err(app, "link", &link, source))?;
  }

  for (name, content) in &app.files {
    let path = dir.join(name);
    debug!(app = %app.name, path = %path.display(), "writing file");
    write_application_file(&path, content)
      .await
      .map_err(|source| layout_err(app, "write", &path, source))?;
  }

  if app.has_service() {
    ctx
      .services
      .install(&app.to_service(&ctx.paths))
      .await
      .map_err(|source| ReconcileError::Service {
        app: app.name.clone(),
        action: "install",
        source,
      })?;
  }
  Ok(())
}

fn layout_err(app: &Application, action: &'static str, path: &Path, source: io::Error) -> ReconcileError {
  ReconcileError::Layout {
    app: app.name.clone(),
    action,
    path: path.to_path_buf(),
    source,
  }
}

async fn create_parent(path: &Path) -> io::Result<()> {
  match path.parent() {
    Some(parent) => tokio::fs::create_dir_all(parent).await,
    None => Ok(()),
  }
}

async fn write_application_file(path: &Path, content: &str) -> io::Result<()> {
  create_parent(path).await?;
  tokio::fs::write(path, content).await?;
  #[cfg(unix)]
  {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(APPLICATION_FILE_MODE)).await?;
  }
  #[cfg(not(unix))]
  let _ = APPLICATION_FILE_MODE;
  Ok(())
}

async fn remove_file_if_exists(path: &Path) -> io::Result<()> {
  match tokio::fs::remove_file(path).await {
    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
    other => other,
  }
}

async fn remove_dir_if_exists(path: &Path) -> io::Result<()> {
  match tokio::fs::remove_dir_all(path).await {
    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
    other => other,
  }
}

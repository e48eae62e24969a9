//! Archive extraction, selected by file-name suffix.

mod tar;
mod zip;

pub use self::tar::{TarBz2Extractor, TarExtractor, TarGzExtractor, TarXzExtractor};
pub use self::zip::ZipExtractor;

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ArchiveError {
  #[error("no extractor for '{0}'")]
  UnknownFormat(PathBuf),

  #[error("failed to extract {archive}: {source}")]
  Io {
    archive: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to extract {archive}: {message}")]
  Corrupt { archive: PathBuf, message: String },

  #[error("extraction task failed: {0}")]
  Join(#[from] tokio::task::JoinError),
}

/// Unpacks one archive format into a directory.
pub trait Extractor: Send + Sync {
  /// Extract `archive` into `dest`, which exists and is empty.
  fn extract(&self, archive: &Path, dest: &Path) -> Result<(), ArchiveError>;
}

/// Extractors keyed by file-name suffix. The longest matching suffix wins.
#[derive(Clone, Default)]
pub struct ArchiveRegistry {
  extractors: Vec<(String, Arc<dyn Extractor>)>,
}

impl ArchiveRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Registry with every built-in format: plain, gzip, bzip2 and xz/lzma
  /// tarballs, and zip.
  pub fn with_defaults() -> Self {
    let mut registry = Self::new();
    registry.register(".tar", Arc::new(TarExtractor));
    for suffix in [".tar.gz", ".tgz"] {
      registry.register(suffix, Arc::new(TarGzExtractor));
    }
    for suffix in [".tar.bz2", ".tbz", ".tbz2", ".tb2"] {
      registry.register(suffix, Arc::new(TarBz2Extractor));
    }
    for suffix in [".tar.xz", ".tar.lz", ".tar.lzma", ".txz", ".tlz"] {
      registry.register(suffix, Arc::new(TarXzExtractor));
    }
    registry.register(".zip", Arc::new(ZipExtractor));
    registry
  }

  pub fn register(&mut self, suffix: impl Into<String>, extractor: Arc<dyn Extractor>) {
    let suffix = suffix.into();
    self.extractors.retain(|(s, _)| *s != suffix);
    self.extractors.push((suffix, extractor));
    self.extractors.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
  }

  /// Extractor for `archive`, if its name has a registered suffix.
  pub fn extractor_for(&self, archive: &Path) -> Option<Arc<dyn Extractor>> {
    let name = archive.file_name()?.to_string_lossy();
    self
      .extractors
      .iter()
      .find(|(suffix, _)| name.ends_with(suffix.as_str()))
      .map(|(_, extractor)| extractor.clone())
  }

  /// Extract `archive` into `dest`, creating it. Runs on the blocking pool.
  pub async fn extract(&self, archive: &Path, dest: &Path) -> Result<(), ArchiveError> {
    let extractor = self
      .extractor_for(archive)
      .ok_or_else(|| ArchiveError::UnknownFormat(archive.to_path_buf()))?;

    info!(archive = %archive.display(), dest = %dest.display(), "extracting");
    let archive = archive.to_path_buf();
    let dest = dest.to_path_buf();
    tokio::task::spawn_blocking(move || {
      std::fs::create_dir_all(&dest).map_err(|source| ArchiveError::Io {
        archive: archive.clone(),
        source,
      })?;
      extractor.extract(&archive, &dest)
    })
    .await?
  }
}

//! Filesystem storage (`local` and `file` schemes).

use std::path::PathBuf;

use async_trait::async_trait;

use super::{ByteStream, StorageError, StorageProvider};
use crate::config::Location;
use crate::util::hash::hash_file;

/// Reads and writes plain files. The version token is the SHA-256 of the
/// file contents.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalStorage;

fn path_of(location: &Location) -> PathBuf {
  PathBuf::from(location.path())
}

#[async_trait]
impl StorageProvider for LocalStorage {
  async fn get(&self, location: &Location) -> Result<ByteStream, StorageError> {
    let file = tokio::fs::File::open(path_of(location))
      .await
      .map_err(|e| StorageError::io(location, e))?;
    Ok(Box::pin(file))
  }

  async fn put(&self, location: &Location, mut data: ByteStream) -> Result<(), StorageError> {
    let path = path_of(location);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
      tokio::fs::create_dir_all(parent)
        .await
        .map_err(|e| StorageError::io(location, e))?;
    }
    let mut file = tokio::fs::File::create(&path)
      .await
      .map_err(|e| StorageError::io(location, e))?;
    tokio::io::copy(&mut data, &mut file)
      .await
      .map_err(|e| StorageError::io(location, e))?;
    file.sync_all().await.map_err(|e| StorageError::io(location, e))
  }

  async fn list(&self, location: &Location) -> Result<Vec<String>, StorageError> {
    let mut entries = tokio::fs::read_dir(path_of(location))
      .await
      .map_err(|e| StorageError::io(location, e))?;
    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(|e| StorageError::io(location, e))? {
      names.push(entry.file_name().to_string_lossy().into_owned());
    }
    names.sort();
    Ok(names)
  }

  async fn delete(&self, location: &Location) -> Result<(), StorageError> {
    tokio::fs::remove_file(path_of(location))
      .await
      .map_err(|e| StorageError::io(location, e))
  }

  async fn version(&self, location: &Location, _previous: &str) -> Result<String, StorageError> {
    let fingerprint = hash_file(&path_of(location))
      .await
      .map_err(|e| StorageError::io(location, e))?;
    Ok(fingerprint.0)
  }
}

//! Storage providers: fetch, store, list and version artifacts by [`Location`].
//!
//! Providers are registered by scheme (`location["type"]`) in a
//! [`StorageRegistry`].

mod http;
mod local;

pub use http::HttpStorage;
pub use local::LocalStorage;

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::AsyncRead;
use tracing::{debug, info};

use crate::config::Location;

/// A readable byte stream.
pub type ByteStream = Pin<Box<dyn AsyncRead + Send>>;

#[derive(Debug, Error)]
pub enum StorageError {
  #[error("no storage provider for scheme '{0}'")]
  UnknownScheme(String),

  #[error("{operation} is not supported by the {scheme} provider")]
  Unsupported { scheme: String, operation: &'static str },

  #[error("{location}: {source}")]
  Io {
    location: String,
    #[source]
    source: io::Error,
  },

  #[error("{location}: {source}")]
  Http {
    location: String,
    #[source]
    source: reqwest::Error,
  },

  #[error("{location}: unexpected status {status}")]
  Status { location: String, status: u16 },
}

impl StorageError {
  pub(crate) fn io(location: &Location, source: io::Error) -> Self {
    Self::Io {
      location: location.to_string(),
      source,
    }
  }
}

/// A storage backend.
#[async_trait]
pub trait StorageProvider: Send + Sync {
  /// Open the artifact at `location` for reading.
  async fn get(&self, location: &Location) -> Result<ByteStream, StorageError>;

  /// Store `data` at `location`, replacing anything already there.
  async fn put(&self, location: &Location, data: ByteStream) -> Result<(), StorageError>;

  /// Names of the entries under `location`.
  async fn list(&self, location: &Location) -> Result<Vec<String>, StorageError>;

  async fn delete(&self, location: &Location) -> Result<(), StorageError>;

  /// Opaque change token. Returning `previous` means nothing changed.
  async fn version(&self, location: &Location, previous: &str) -> Result<String, StorageError>;
}

/// Storage providers keyed by scheme.
#[derive(Clone, Default)]
pub struct StorageRegistry {
  providers: HashMap<String, Arc<dyn StorageProvider>>,
}

impl StorageRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Registry with the local and HTTP providers.
  pub fn with_defaults() -> Self {
    let mut registry = Self::new();
    let local: Arc<dyn StorageProvider> = Arc::new(LocalStorage);
    let http: Arc<dyn StorageProvider> = Arc::new(HttpStorage::new());
    registry.register("local", local.clone());
    registry.register("file", local);
    registry.register("http", http.clone());
    registry.register("https", http);
    registry
  }

  pub fn register(&mut self, scheme: impl Into<String>, provider: Arc<dyn StorageProvider>) {
    self.providers.insert(scheme.into(), provider);
  }

  pub fn provider(&self, location: &Location) -> Result<Arc<dyn StorageProvider>, StorageError> {
    self
      .providers
      .get(location.kind())
      .cloned()
      .ok_or_else(|| StorageError::UnknownScheme(location.kind().to_string()))
  }

  pub async fn get(&self, location: &Location) -> Result<ByteStream, StorageError> {
    self.provider(location)?.get(location).await
  }

  pub async fn put(&self, location: &Location, data: ByteStream) -> Result<(), StorageError> {
    self.provider(location)?.put(location, data).await
  }

  pub async fn list(&self, location: &Location) -> Result<Vec<String>, StorageError> {
    self.provider(location)?.list(location).await
  }

  pub async fn delete(&self, location: &Location) -> Result<(), StorageError> {
    self.provider(location)?.delete(location).await
  }

  pub async fn version(&self, location: &Location, previous: &str) -> Result<String, StorageError> {
    self.provider(location)?.version(location, previous).await
  }

  /// Read the whole artifact into memory.
  pub async fn read_to_end(&self, location: &Location) -> Result<Vec<u8>, StorageError> {
    use tokio::io::AsyncReadExt;

    let mut stream = self.get(location).await?;
    let mut data = Vec::new();
    stream
      .read_to_end(&mut data)
      .await
      .map_err(|e| StorageError::io(location, e))?;
    Ok(data)
  }

  /// Stream the artifact at `location` into `dest`.
  ///
  /// The data lands in a sibling temporary file first, so `dest` is either
  /// complete or absent.
  pub async fn download(&self, location: &Location, dest: &Path) -> Result<u64, StorageError> {
    info!(source = %location, dest = %dest.display(), "downloading");
    let mut stream = self.get(location).await?;

    let tmp = partial_path(dest);
    let write_err = |e| StorageError::Io {
      location: dest.display().to_string(),
      source: e,
    };
    if let Some(parent) = dest.parent() {
      tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }
    let mut file = tokio::fs::File::create(&tmp).await.map_err(write_err)?;
    let copied = tokio::io::copy(&mut stream, &mut file).await;
    let bytes = match copied {
      Ok(bytes) => bytes,
      Err(e) => {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(StorageError::io(location, e));
      }
    };
    file.sync_all().await.map_err(write_err)?;
    drop(file);
    tokio::fs::rename(&tmp, dest).await.map_err(write_err)?;
    debug!(bytes, dest = %dest.display(), "download complete");
    Ok(bytes)
  }
}

fn partial_path(dest: &Path) -> PathBuf {
  let mut name = dest.file_name().map(|n| n.to_os_string()).unwrap_or_default();
  name.push(".partial");
  dest.with_file_name(name)
}

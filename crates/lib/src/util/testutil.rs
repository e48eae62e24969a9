//! Test helpers: throwaway services and archives.

use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::service::{Service, ServiceError, ServiceManager};

/// In-memory service manager that records every call in order.
#[derive(Default)]
pub struct RecordingManager {
  pub installed: Mutex<BTreeSet<String>>,
  pub events: Mutex<Vec<String>>,
}

impl RecordingManager {
  pub fn with_installed(names: &[&str]) -> Self {
    let manager = Self::default();
    manager
      .installed
      .lock()
      .unwrap()
      .extend(names.iter().map(|n| n.to_string()));
    manager
  }

  pub fn events(&self) -> Vec<String> {
    self.events.lock().unwrap().clone()
  }
}

#[async_trait]
impl ServiceManager for RecordingManager {
  async fn install(&self, service: &Service) -> Result<(), ServiceError> {
    self.events.lock().unwrap().push(format!("install {}", service.name));
    self.installed.lock().unwrap().insert(service.name.clone());
    Ok(())
  }

  async fn uninstall(&self, name: &str) -> Result<(), ServiceError> {
    self.events.lock().unwrap().push(format!("uninstall {}", name));
    self.installed.lock().unwrap().remove(name);
    Ok(())
  }

  async fn list(&self) -> Result<Vec<String>, ServiceError> {
    Ok(self.installed.lock().unwrap().iter().cloned().collect())
  }

  fn kind(&self) -> &'static str {
    "recording"
  }
}

/// A service that stays up until killed.
#[cfg(unix)]
pub fn sleeper(name: &str, dir: &Path) -> Service {
  Service {
    name: name.to_string(),
    directory: dir.to_path_buf(),
    command: vec!["sleep".to_string(), "300".to_string()],
    environment: BTreeMap::new(),
  }
}

/// A service that exits right away.
#[cfg(unix)]
pub fn short_lived(name: &str, dir: &Path) -> Service {
  Service {
    name: name.to_string(),
    directory: dir.to_path_buf(),
    command: vec!["/bin/sh".to_string(), "-c".to_string(), "exit 0".to_string()],
    environment: BTreeMap::new(),
  }
}

/// Append `files` (path → content) as a tarball to `writer` and hand the
/// writer back so the caller can finish any compression.
pub fn write_tar<W: Write>(writer: W, files: &[(&str, &str)]) -> W {
  let mut builder = tar::Builder::new(writer);
  for (path, content) in files {
    let mut header = tar::Header::new_gnu();
    header.set_size(content.len() as u64);
    header.set_mode(0o755);
    header.set_cksum();
    builder.append_data(&mut header, path, content.as_bytes()).unwrap();
  }
  builder.into_inner().unwrap()
}

/// Write a gzipped tarball containing `files` (path → content) to `dest`.
pub fn write_tar_gz(dest: &Path, files: &[(&str, &str)]) {
  let file = std::fs::File::create(dest).unwrap();
  let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
  write_tar(encoder, files).finish().unwrap();
}

/// Write a zip archive containing `files` (path → content) to `dest`.
pub fn write_zip(dest: &Path, files: &[(&str, &str)]) {
  let file = std::fs::File::create(dest).unwrap();
  let mut writer = zip::ZipWriter::new(file);
  for (path, content) in files {
    writer
      .start_file(*path, zip::write::SimpleFileOptions::default())
      .unwrap();
    writer.write_all(content.as_bytes()).unwrap();
  }
  writer.finish().unwrap();
}

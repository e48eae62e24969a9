//! Shared fixtures for library integration tests.

use std::collections::BTreeSet;
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;

use pullstack_lib::config::Location;
use pullstack_lib::context::StackContext;
use pullstack_lib::service::{Service, ServiceError, ServiceManager};
use pullstack_lib::settings::Settings;

/// Service manager that records every call in order.
#[derive(Default)]
pub struct RecordingManager {
  installed: Mutex<BTreeSet<String>>,
  events: Mutex<Vec<String>>,
}

impl RecordingManager {
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

/// A loopback port nobody is listening on right now.
pub fn free_port() -> u16 {
  let listener = TcpListener::bind("127.0.0.1:0").unwrap();
  listener.local_addr().unwrap().port()
}

/// Write a gzipped tarball containing `files` (path → content) to `dest`.
pub fn write_tar_gz(dest: &Path, files: &[(&str, &str)]) {
  let file = std::fs::File::create(dest).unwrap();
  let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
  let mut builder = tar::Builder::new(encoder);
  for (path, content) in files {
    let mut header = tar::Header::new_gnu();
    header.set_size(content.len() as u64);
    header.set_mode(0o755);
    header.set_cksum();
    builder.append_data(&mut header, path, content.as_bytes()).unwrap();
  }
  builder.into_inner().unwrap().finish().unwrap();
}

/// A node with an empty root, a private lock port and a recording manager.
pub struct Node {
  pub temp: TempDir,
  pub ctx: StackContext,
  pub manager: Arc<RecordingManager>,
}

impl Node {
  pub fn new() -> Self {
    let temp = TempDir::new().unwrap();
    let mut settings = Settings::with_root(temp.path().join("root"));
    settings.lock_port = free_port();
    let manager = Arc::new(RecordingManager::default());
    let ctx = StackContext::new(settings, manager.clone());
    ctx.paths.ensure().unwrap();
    Self { temp, ctx, manager }
  }

  /// Build a tarball next to the root and return its path.
  pub fn package(&self, name: &str, files: &[(&str, &str)]) -> PathBuf {
    let path = self.temp.path().join(name);
    write_tar_gz(&path, files);
    path
  }

  /// Write the configuration document and return its location.
  pub fn config(&self, yaml: &str) -> Location {
    let path = self.temp.path().join("stack.yaml");
    std::fs::write(&path, yaml).unwrap();
    Location::parse(path.to_str().unwrap()).unwrap()
  }

  pub fn app_dir(&self, name: &str) -> PathBuf {
    self.ctx.paths.application_path(name)
  }
}

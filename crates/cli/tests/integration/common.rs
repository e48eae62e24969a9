//! Shared test helpers for CLI integration tests.

use std::net::TcpListener;
use std::path::PathBuf;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

/// Get path to a fixture file.
pub fn fixture_path(name: &str) -> PathBuf {
  PathBuf::from(env!("CARGO_MANIFEST_DIR"))
    .join("tests")
    .join("fixtures")
    .join(name)
}

/// A loopback port nobody is listening on right now.
fn free_port() -> u16 {
  let listener = TcpListener::bind("127.0.0.1:0").unwrap();
  listener.local_addr().unwrap().port()
}

/// Isolated test environment.
///
/// Each test gets its own root directory and lock port, and always uses the
/// built-in service manager.
pub struct TestEnv {
  pub temp: TempDir,
  pub config_path: PathBuf,
  lock_port: u16,
}

impl TestEnv {
  pub fn new() -> Self {
    let temp = TempDir::new().unwrap();
    let config_path = temp.path().join("stack.yaml");
    Self {
      temp,
      config_path,
      lock_port: free_port(),
    }
  }

  /// Write the configuration document.
  pub fn write_config(&self, content: &str) {
    std::fs::write(&self.config_path, content).unwrap();
  }

  /// Config with one application `site` built from the fixture tarball.
  pub fn site_config(&self, version: &str) -> String {
    let archive = dunce::canonicalize(fixture_path("site.tar.gz")).unwrap();
    format!(
      "applications:\n  - name: site\n    source: {}\n    files:\n      VERSION: \"{}\"\n",
      archive.display(),
      version
    )
  }

  /// Write a file relative to the temp directory.
  pub fn write_file(&self, relative_path: &str, content: &str) -> PathBuf {
    let path = self.temp.path().join(relative_path);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
    path
  }

  /// Root directory (isolated per test).
  pub fn root_path(&self) -> PathBuf {
    let p = self.temp.path().join("pullstack");
    std::fs::create_dir_all(&p).unwrap();
    dunce::canonicalize(&p).unwrap_or(p)
  }

  /// Get a pre-configured Command for the pullstack binary.
  ///
  /// Sets environment variables for isolated testing:
  /// - `PULLSTACK_ROOT`: isolated root directory
  /// - `PULLSTACK_LOCK_PORT`: a port no other test uses
  /// - `PULLSTACK_SERVICE_MANAGER`: the built-in supervisor
  pub fn cmd(&self) -> Command {
    let mut cmd: Command = cargo_bin_cmd!("pullstack");
    cmd.env("PULLSTACK_ROOT", self.root_path());
    cmd.env("PULLSTACK_LOCK_PORT", self.lock_port.to_string());
    cmd.env("PULLSTACK_SERVICE_MANAGER", "builtin");
    cmd.env_remove("RUST_LOG");
    cmd
  }
}

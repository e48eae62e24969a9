//! OS services: the record handed to a service manager, the manager trait,
//! and its implementations.
//!
//! - [`client::SupervisorClient`]: the built-in manager, proxying to a
//!   self-spawned [`supervisor::Supervisor`] daemon.
//! - [`systemd::SystemdManager`] and [`upstart::UpstartManager`]: native
//!   init systems, used when running as root on a host that has one.

pub mod client;
pub mod command;
pub mod rpc;
pub mod supervisor;
pub mod systemd;
pub mod upstart;

use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::platform::{InitSystem, StackPaths};
use crate::settings::{ServiceManagerKind, Settings};

/// A long-lived command run on behalf of an application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
  pub name: String,
  pub directory: PathBuf,
  pub command: Vec<String>,
  #[serde(default)]
  pub environment: BTreeMap<String, String>,
}

#[derive(Debug, Error)]
pub enum ServiceError {
  #[error("service '{0}' has an empty command")]
  EmptyCommand(String),

  #[error("failed to launch service '{name}': {source}")]
  Launch {
    name: String,
    #[source]
    source: io::Error,
  },

  #[error("failed to persist supervisor state to {path}: {source}")]
  Persist {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("supervisor transport error: {0}")]
  Transport(#[source] io::Error),

  #[error("malformed supervisor message: {0}")]
  Protocol(#[from] serde_json::Error),

  #[error("supervisor did not connect within {0:?}")]
  HandshakeTimeout(std::time::Duration),

  #[error("supervisor exited before connecting ({0})")]
  SupervisorExited(std::process::ExitStatus),

  #[error("supervisor rejected request: {0}")]
  Remote(String),

  #[error("`{command}` failed: {output}")]
  Command { command: String, output: String },

  #[error("io error: {0}")]
  Io(#[from] io::Error),
}

impl ServiceError {
  /// Whether the error came from the connection rather than the request.
  pub fn is_transport(&self) -> bool {
    matches!(self, Self::Transport(_) | Self::Protocol(_))
  }
}

/// Install, uninstall and enumerate OS services.
///
/// `uninstall` of an unknown service must succeed.
#[async_trait]
pub trait ServiceManager: Send + Sync {
  async fn install(&self, service: &Service) -> Result<(), ServiceError>;
  async fn uninstall(&self, name: &str) -> Result<(), ServiceError>;
  async fn list(&self) -> Result<Vec<String>, ServiceError>;

  /// Short name for logs.
  fn kind(&self) -> &'static str;
}

/// Choose the service manager for this host.
///
/// With `auto`, native init systems are only used on Linux when running as
/// root; everything else gets the built-in supervisor.
pub fn select_manager(settings: &Settings, paths: &StackPaths) -> Arc<dyn ServiceManager> {
  let kind = match settings.service_manager {
    ServiceManagerKind::Auto if cfg!(target_os = "linux") && settings.elevated => match InitSystem::detect() {
      InitSystem::Upstart => ServiceManagerKind::Upstart,
      InitSystem::Systemd => ServiceManagerKind::Systemd,
      InitSystem::Unknown => ServiceManagerKind::Builtin,
    },
    ServiceManagerKind::Auto => ServiceManagerKind::Builtin,
    explicit => explicit,
  };

  let manager: Arc<dyn ServiceManager> = match kind {
    ServiceManagerKind::Systemd => Arc::new(systemd::SystemdManager::new(crate::platform::os::systemd_unit_dir())),
    ServiceManagerKind::Upstart => Arc::new(upstart::UpstartManager::new()),
    _ => Arc::new(client::SupervisorClient::new(paths.supervisor_state_file())),
  };
  info!(manager = manager.kind(), "selected service manager");
  manager
}

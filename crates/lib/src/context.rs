//! Everything a command needs, resolved once at startup.

use std::io;
use std::sync::Arc;

use crate::archive::ArchiveRegistry;
use crate::platform::StackPaths;
use crate::service::{ServiceManager, select_manager};
use crate::settings::Settings;
use crate::storage::StorageRegistry;

/// Paths, providers and the service manager shared by apply and watch.
#[derive(Clone)]
pub struct StackContext {
  pub settings: Settings,
  pub paths: StackPaths,
  pub storage: StorageRegistry,
  pub archives: ArchiveRegistry,
  pub services: Arc<dyn ServiceManager>,
}

impl StackContext {
  /// Context for this host: creates the root layout and picks the service
  /// manager from the settings.
  pub fn from_settings(settings: Settings) -> io::Result<Self> {
    let paths = settings.paths();
    paths.ensure()?;
    let services = select_manager(&settings, &paths);
    Ok(Self::new(settings, services))
  }

  /// Context with the default storage and archive providers and an explicit
  /// service manager.
  pub fn new(settings: Settings, services: Arc<dyn ServiceManager>) -> Self {
    Self {
      paths: settings.paths(),
      settings,
      storage: StorageRegistry::with_defaults(),
      archives: ArchiveRegistry::with_defaults(),
      services,
    }
  }
}

//! Change detection by polling a location's version token.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{notify, wait_for_shutdown};
use crate::config::Location;
use crate::storage::StorageRegistry;

/// Poll `storage.version(location)` every `interval`, signalling `changes`
/// whenever the token differs from the last one seen.
pub fn spawn(
  storage: StorageRegistry,
  location: Location,
  interval: Duration,
  changes: mpsc::Sender<()>,
  mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
  tokio::spawn(async move {
    let mut previous = match storage.version(&location, "").await {
      Ok(token) => token,
      Err(e) => {
        warn!(location = %location, error = %e, "initial version check failed");
        String::new()
      }
    };
    info!(location = %location, interval = ?interval, "polling for changes");

    loop {
      tokio::select! {
        _ = tokio::time::sleep(interval) => {}
        _ = wait_for_shutdown(&mut shutdown) => break,
      }

      match storage.version(&location, &previous).await {
        Ok(token) if token != previous => {
          debug!(location = %location, old = %previous, new = %token, "version changed");
          previous = token;
          if !notify(&changes) {
            break;
          }
        }
        Ok(_) => {}
        Err(e) => warn!(location = %location, error = %e, "version check failed"),
      }
    }
    debug!(location = %location, "poller stopped");
  })
}

//! Watching a configuration location and re-applying it on change.
//!
//! Watchers push onto a capacity-1 channel: any number of upstream changes
//! that arrive while a notification is pending collapse into that one
//! notification. [`apply_loop::drive`] consumes the channel.

pub mod apply_loop;
pub mod backoff;
#[cfg(target_os = "linux")]
pub mod inotify;
pub mod poll;

use std::io;
use std::path::PathBuf;

use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tracing::debug;

use crate::config::{LOCAL_SCHEME, Location};
use crate::context::StackContext;

pub use apply_loop::{drive, run_watch};
pub use backoff::{Backoff, BackoffPolicy};

#[derive(Debug, Error)]
pub enum WatchError {
  #[error("failed to watch {path}: {source}")]
  Inotify {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("change watcher stopped")]
  WatcherStopped,
}

/// A coalescing change channel.
pub fn change_channel() -> (mpsc::Sender<()>, mpsc::Receiver<()>) {
  mpsc::channel(1)
}

/// Signal a change without blocking. Returns `false` once the receiver is
/// gone and the watcher should stop.
pub fn notify(changes: &mpsc::Sender<()>) -> bool {
  match changes.try_send(()) {
    Ok(()) | Err(mpsc::error::TrySendError::Full(())) => true,
    Err(mpsc::error::TrySendError::Closed(())) => false,
  }
}

/// Resolves once shutdown is requested or the sender is dropped.
pub async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
  let _ = shutdown.wait_for(|stop| *stop).await;
}

/// Start the watcher appropriate for `location` and queue an initial
/// notification so the first apply happens immediately.
pub fn spawn_watcher(
  ctx: &StackContext,
  location: &Location,
  changes: mpsc::Sender<()>,
  shutdown: watch::Receiver<bool>,
) {
  notify(&changes);

  if matches!(location.kind(), LOCAL_SCHEME | "file") && watch_local_file(location, &changes, &shutdown) {
    return;
  }

  debug!(location = %location, "using version polling");
  poll::spawn(
    ctx.storage.clone(),
    location.clone(),
    ctx.settings.poll_interval,
    changes,
    shutdown,
  );
}

#[cfg(target_os = "linux")]
fn watch_local_file(location: &Location, changes: &mpsc::Sender<()>, shutdown: &watch::Receiver<bool>) -> bool {
  match inotify::spawn(std::path::Path::new(location.path()), changes.clone(), shutdown.clone()) {
    Ok(_task) => true,
    Err(e) => {
      tracing::warn!(error = %e, "inotify unavailable, falling back to polling");
      false
    }
  }
}

#[cfg(not(target_os = "linux"))]
fn watch_local_file(_location: &Location, _changes: &mpsc::Sender<()>, _shutdown: &watch::Receiver<bool>) -> bool {
  false
}

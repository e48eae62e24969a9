//! Change detection for local files via Linux inotify.
//!
//! The parent directory is watched rather than the file itself, so editors
//! that replace the file by renaming over it are still seen. Events for
//! other names in the directory are ignored.

use std::ffi::OsString;
use std::io;
use std::os::fd::{AsFd, AsRawFd, RawFd};
use std::path::{Path, PathBuf};

use nix::sys::inotify::{AddWatchFlags, InitFlags, Inotify, InotifyEvent};
use tokio::io::unix::AsyncFd;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{WatchError, notify, wait_for_shutdown};

/// `AsyncFd` wants `AsRawFd`; nix only gives `AsFd`.
struct InotifyFd(Inotify);

impl AsRawFd for InotifyFd {
  fn as_raw_fd(&self) -> RawFd {
    self.0.as_fd().as_raw_fd()
  }
}

/// Start a watcher task for `file`.
///
/// The task ends when `shutdown` fires or the receiving side of `changes`
/// is gone. Must be called from within a tokio runtime.
pub fn spawn(
  file: &Path,
  changes: mpsc::Sender<()>,
  mut shutdown: watch::Receiver<bool>,
) -> Result<JoinHandle<()>, WatchError> {
  let dir = match file.parent() {
    Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
    _ => PathBuf::from("."),
  };
  let name: OsString = file
    .file_name()
    .map(|n| n.to_os_string())
    .ok_or_else(|| WatchError::Inotify {
      path: file.to_path_buf(),
      source: io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"),
    })?;

  let setup_err = |source: io::Error| WatchError::Inotify {
    path: dir.clone(),
    source,
  };
  let inotify = Inotify::init(InitFlags::IN_CLOEXEC | InitFlags::IN_NONBLOCK).map_err(|e| setup_err(e.into()))?;
  let mask = AddWatchFlags::IN_CLOSE_WRITE
    | AddWatchFlags::IN_CREATE
    | AddWatchFlags::IN_DELETE
    | AddWatchFlags::IN_MOVED_FROM
    | AddWatchFlags::IN_MOVED_TO;
  inotify.add_watch(&dir, mask).map_err(|e| setup_err(e.into()))?;
  let fd = AsyncFd::new(InotifyFd(inotify)).map_err(setup_err)?;
  info!(dir = %dir.display(), file = ?name, "watching for changes");

  Ok(tokio::spawn(async move {
    loop {
      let events = tokio::select! {
        _ = wait_for_shutdown(&mut shutdown) => break,
        _ = changes.closed() => break,
        events = read_events(&fd) => events,
      };
      let events = match events {
        Ok(events) => events,
        Err(e) => {
          warn!(dir = %dir.display(), error = %e, "inotify read failed, watcher stopped");
          return;
        }
      };
      let mut changed = false;
      for event in events {
        if event.mask.contains(AddWatchFlags::IN_Q_OVERFLOW) {
          changed = true;
        }
        if event.name.as_ref() == Some(&name) {
          debug!(file = ?name, mask = ?event.mask, "file event");
          changed = true;
        }
      }
      if changed && !notify(&changes) {
        break;
      }
    }
    debug!(dir = %dir.display(), "inotify watcher stopped");
  }))
}

async fn read_events(fd: &AsyncFd<InotifyFd>) -> io::Result<Vec<InotifyEvent>> {
  loop {
    let mut guard = fd.readable().await?;
    match guard.try_io(|inner| inner.get_ref().0.read_events().map_err(io::Error::from)) {
      Ok(result) => return result,
      Err(_would_block) => continue,
    }
  }
}

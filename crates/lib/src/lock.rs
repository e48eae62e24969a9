//! Machine-wide mutual exclusion for reconciliation.
//!
//! The lock is a listening socket on a fixed loopback port. Only one process
//! can bind it, and the OS releases it when the holder exits, so a crashed
//! holder never leaves a stale lock behind.

use std::io;
use std::net::{Ipv4Addr, SocketAddr, TcpListener};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info};

/// Interval between bind attempts while waiting for the lock.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum PortLockError {
  #[error("lock port {port} is held by another process")]
  Contention { port: u16 },

  #[error("failed to bind lock port {port}: {source}")]
  Bind {
    port: u16,
    #[source]
    source: io::Error,
  },
}

/// A held lock. Dropping it releases the port.
#[derive(Debug)]
pub struct PortLock {
  _listener: TcpListener,
  port: u16,
}

impl PortLock {
  /// Try to take the lock without waiting.
  pub fn try_acquire(port: u16) -> Result<Self, PortLockError> {
    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
    match TcpListener::bind(addr) {
      Ok(listener) => {
        debug!(port, "acquired lock");
        Ok(Self {
          _listener: listener,
          port,
        })
      }
      Err(e) if e.kind() == io::ErrorKind::AddrInUse => Err(PortLockError::Contention { port }),
      Err(source) => Err(PortLockError::Bind { port, source }),
    }
  }

  /// Wait until the lock can be taken, checking every [`POLL_INTERVAL`].
  pub async fn acquire(port: u16) -> Result<Self, PortLockError> {
    let mut logged = false;
    loop {
      match Self::try_acquire(port) {
        Err(PortLockError::Contention { .. }) => {
          if !logged {
            info!(port, "waiting for lock held by another process");
            logged = true;
          }
          tokio::time::sleep(POLL_INTERVAL).await;
        }
        other => return other,
      }
    }
  }

  pub fn port(&self) -> u16 {
    self.port
  }
}

impl Drop for PortLock {
  fn drop(&mut self) {
    debug!(port = self.port, "released lock");
  }
}

//! The watch/apply state machine.

use std::fmt::Display;
use std::future::Future;

use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use super::backoff::{Backoff, BackoffPolicy};
use super::{WatchError, change_channel, spawn_watcher, wait_for_shutdown};
use crate::apply::{ApplyOutcome, apply};
use crate::config::Location;
use crate::context::StackContext;

/// Run `attempt` once per change notification, retrying failures with
/// `policy`.
///
/// A notification that arrives during a backoff wait cancels the wait and
/// restarts with a fresh backoff. When the backoff gives up, the loop goes
/// back to waiting for the next change. Returns `Ok` on shutdown and
/// [`WatchError::WatcherStopped`] if every sender of `changes` is dropped.
pub async fn drive<F, Fut, E>(
  mut changes: mpsc::Receiver<()>,
  mut shutdown: watch::Receiver<bool>,
  policy: BackoffPolicy,
  mut attempt: F,
) -> Result<(), WatchError>
where
  F: FnMut() -> Fut,
  Fut: Future<Output = Result<(), E>>,
  E: Display,
{
  loop {
    tokio::select! {
      biased;
      _ = wait_for_shutdown(&mut shutdown) => return Ok(()),
      change = changes.recv() => {
        if change.is_none() {
          return Err(WatchError::WatcherStopped);
        }
      }
    }
    debug!("change detected");

    let mut backoff = Backoff::new(policy);
    loop {
      let err = match attempt().await {
        Ok(()) => break,
        Err(e) => e,
      };
      let Some(delay) = backoff.next_delay() else {
        error!(error = %err, attempts = backoff.attempts() + 1, "giving up until the next change");
        break;
      };
      warn!(error = %err, retry_in = ?delay, "apply failed");

      tokio::select! {
        biased;
        _ = wait_for_shutdown(&mut shutdown) => return Ok(()),
        change = changes.recv() => {
          if change.is_none() {
            return Err(WatchError::WatcherStopped);
          }
          debug!("newer change supersedes retry");
          backoff = Backoff::new(policy);
        }
        _ = tokio::time::sleep(delay) => {}
      }
    }
  }
}

/// Watch `location` and apply it on every change until `shutdown` fires.
///
/// `on_applied` sees the outcome of every successful apply.
pub async fn run_watch(
  ctx: &StackContext,
  location: &Location,
  shutdown: watch::Receiver<bool>,
  on_applied: &(dyn Fn(&ApplyOutcome) + Send + Sync),
) -> Result<(), WatchError> {
  let (tx, rx) = change_channel();
  spawn_watcher(ctx, location, tx, shutdown.clone());
  info!(config = %location, "watching configuration");

  drive(rx, shutdown, BackoffPolicy::default(), move || async move {
    let outcome = apply(ctx, location).await?;
    let report = &outcome.report;
    if report.is_noop() {
      debug!("already up to date");
    } else {
      info!(
        installed = report.applications_installed,
        removed = report.applications_removed,
        unchanged = report.applications_unchanged,
        "applied configuration"
      );
    }
    on_applied(&outcome);
    Ok::<_, crate::apply::ApplyError>(())
  })
  .await
}

//! Implementation of the `pullstack watch` command.

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::{info, warn};

use pullstack_lib::watch::run_watch;

use super::{parse_location, runtime, stack_context};
use crate::output::print_watch_apply;

/// Watch `config` and apply every change until interrupted.
///
/// Each apply that changes something is summarized on stdout. Failed
/// applies are logged and retried; only a stopped watcher ends the command
/// with an error.
pub fn cmd_watch(config: &str) -> Result<()> {
  let location = parse_location(config)?;

  let rt = runtime()?;
  rt.block_on(async {
    let ctx = stack_context()?;

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
      if wait_for_signal().await {
        let _ = stop_tx.send(true);
      }
      // a dropped sender also reads as shutdown, so hold on to it
      std::future::pending::<()>().await;
    });

    run_watch(&ctx, &location, stop_rx, &print_watch_apply)
      .await
      .context("Watch stopped")
  })
}

/// Resolves on SIGINT (or SIGTERM on unix). Returns false if no signal
/// handler could be installed.
async fn wait_for_signal() -> bool {
  #[cfg(unix)]
  {
    use tokio::signal::unix::{SignalKind, signal};
    let mut term = match signal(SignalKind::terminate()) {
      Ok(term) => term,
      Err(e) => {
        warn!(error = %e, "failed to listen for SIGTERM");
        return wait_for_ctrl_c().await;
      }
    };
    tokio::select! {
      received = wait_for_ctrl_c() => received,
      _ = term.recv() => {
        info!("terminate received, stopping");
        true
      }
    }
  }
  #[cfg(not(unix))]
  {
    wait_for_ctrl_c().await
  }
}

async fn wait_for_ctrl_c() -> bool {
  match tokio::signal::ctrl_c().await {
    Ok(()) => {
      info!("interrupt received, stopping");
      true
    }
    Err(e) => {
      warn!(error = %e, "failed to listen for interrupt");
      std::future::pending::<()>().await;
      false
    }
  }
}

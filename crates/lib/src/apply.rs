//! One full reconciliation: lock, fetch, validate, reconcile.

use thiserror::Error;
use tracing::info;

use crate::config::{Config, ConfigError, Location};
use crate::context::StackContext;
use crate::ledger::{LedgerError, StackState, ValidationReport};
use crate::lock::{PortLock, PortLockError};
use crate::reconcile::{ReconcileError, ReconcileReport, reconcile};
use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum ApplyError {
  #[error("failed to acquire reconciliation lock: {0}")]
  Lock(#[from] PortLockError),

  #[error("failed to fetch configuration {location}: {source}")]
  FetchConfig {
    location: String,
    #[source]
    source: StorageError,
  },

  #[error("configuration {location} is not valid UTF-8")]
  Encoding { location: String },

  #[error("invalid configuration {location}: {source}")]
  Config {
    location: String,
    #[source]
    source: ConfigError,
  },

  #[error("failed to validate ledger: {0}")]
  Ledger(#[from] LedgerError),

  #[error("reconciliation failed: {0}")]
  Reconcile(#[from] ReconcileError),
}

/// Result of a successful apply.
#[derive(Debug, Clone, Default)]
pub struct ApplyOutcome {
  pub validation: ValidationReport,
  pub report: ReconcileReport,
}

/// Fetch and parse the configuration at `location`.
pub async fn fetch_config(ctx: &StackContext, location: &Location) -> Result<Config, ApplyError> {
  let data = ctx
    .storage
    .read_to_end(location)
    .await
    .map_err(|source| ApplyError::FetchConfig {
      location: location.to_string(),
      source,
    })?;
  let yaml = String::from_utf8(data).map_err(|_| ApplyError::Encoding {
    location: location.to_string(),
  })?;
  Config::parse(&yaml).map_err(|source| ApplyError::Config {
    location: location.to_string(),
    source,
  })
}

/// Apply the configuration at `location`, holding the machine-wide lock
/// for the whole run.
pub async fn apply(ctx: &StackContext, location: &Location) -> Result<ApplyOutcome, ApplyError> {
  let _lock = PortLock::acquire(ctx.settings.lock_port).await?;
  apply_locked(ctx, location).await
}

/// Apply without taking the lock. The caller must hold it.
pub async fn apply_locked(ctx: &StackContext, location: &Location) -> Result<ApplyOutcome, ApplyError> {
  info!(config = %location, "applying");
  let desired = fetch_config(ctx, location).await?;
  let (mut state, validation) = StackState::load_validated(&ctx.paths, ctx.services.as_ref()).await?;
  let report = reconcile(ctx, &mut state, &desired).await?;
  Ok(ApplyOutcome { validation, report })
}

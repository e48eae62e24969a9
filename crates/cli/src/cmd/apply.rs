//! Implementation of the `pullstack apply` command.
//!
//! Fetches the configuration once and reconciles the node against it under
//! the machine-wide lock.

use std::time::Instant;

use anyhow::{Context, Result};

use pullstack_lib::apply::apply;

use super::{parse_location, runtime, stack_context};
use crate::output::{print_reconcile_report, print_validation};

/// Execute the apply command.
///
/// Prints what the ledger validation repaired and a summary of the
/// reconciliation. Any failure leaves the previous state in effect and
/// exits non-zero.
pub fn cmd_apply(config: &str) -> Result<()> {
  let location = parse_location(config)?;
  let started = Instant::now();

  let rt = runtime()?;
  let outcome = rt.block_on(async {
    let ctx = stack_context()?;
    apply(&ctx, &location).await.context("Apply failed")
  })?;

  print_validation(&outcome.validation);
  print_reconcile_report(&outcome.report, started.elapsed());

  Ok(())
}

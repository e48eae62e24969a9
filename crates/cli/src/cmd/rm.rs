//! Implementation of the `pullstack rm` command.

use anyhow::{Context, Result};

use pullstack_lib::storage::StorageRegistry;

use super::{parse_location, runtime};
use crate::output::print_success;

pub fn cmd_rm(location: &str) -> Result<()> {
  let location = parse_location(location)?;
  let storage = StorageRegistry::with_defaults();

  let rt = runtime()?;
  rt.block_on(storage.delete(&location))
    .with_context(|| format!("Failed to remove {}", location))?;
  print_success(&format!("Removed {}", location));
  Ok(())
}

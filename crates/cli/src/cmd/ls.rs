//! Implementation of the `pullstack ls` command.

use anyhow::{Context, Result};

use pullstack_lib::storage::StorageRegistry;

use super::{parse_location, runtime};

/// Print every name at `location`, one per line.
pub fn cmd_ls(location: &str) -> Result<()> {
  let location = parse_location(location)?;
  let storage = StorageRegistry::with_defaults();

  let rt = runtime()?;
  let names = rt
    .block_on(storage.list(&location))
    .with_context(|| format!("Failed to list {}", location))?;
  for name in names {
    println!("{}", name);
  }
  Ok(())
}

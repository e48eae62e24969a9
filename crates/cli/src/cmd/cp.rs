//! Implementation of the `pullstack cp` command.

use anyhow::{Context, Result};

use pullstack_lib::storage::StorageRegistry;

use super::{parse_location, runtime};
use crate::output::print_success;

/// Copy `src` to `dst`. A `dst` ending in `/` names a directory, and the
/// source's file name is appended.
pub fn cmd_cp(src: &str, dst: &str) -> Result<()> {
  let source = parse_location(src)?;
  let mut dest = parse_location(dst)?;
  if dst.ends_with('/') && !src.ends_with('/') {
    if let Some(name) = source.file_name() {
      dest = dest.join(name);
    }
  }

  let storage = StorageRegistry::with_defaults();
  let rt = runtime()?;
  rt.block_on(async {
    let data = storage
      .get(&source)
      .await
      .with_context(|| format!("Failed to read {}", source))?;
    storage
      .put(&dest, data)
      .await
      .with_context(|| format!("Failed to write {}", dest))
  })?;

  print_success(&format!("Copied {} to {}", source, dest));
  Ok(())
}

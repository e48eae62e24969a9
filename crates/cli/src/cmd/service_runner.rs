//! Implementation of the hidden `pullstack service-runner` command: the
//! supervisor daemon spawned by the built-in service manager.

use std::path::Path;

use anyhow::{Context, Result};

use pullstack_lib::service::supervisor;
use pullstack_lib::settings::Settings;

use super::runtime;

pub fn cmd_service_runner(address: &str, state_file: &Path) -> Result<()> {
  let settings = Settings::from_env().context("Invalid settings")?;

  let rt = runtime()?;
  rt.block_on(supervisor::run(address, state_file, settings.restart_cooldown))
    .context("Supervisor failed")
}

//! Implementation of the `pullstack install` command.
//!
//! Copies the running executable into the root directory and registers it
//! with the native service manager as the `stack` service, running
//! `watch <config>`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::{debug, info};

use pullstack_lib::config::LOCAL_SCHEME;
use pullstack_lib::consts::{APP_NAME, SELF_SERVICE_NAME};
use pullstack_lib::service::Service;
use pullstack_lib::settings::ROOT_ENV;

use super::{parse_location, runtime, stack_context};
use crate::output::{print_stat, print_success};

pub fn cmd_install(config: &str) -> Result<()> {
  let location = parse_location(config)?;
  // The service runs from the root directory, so a relative path would
  // resolve against the wrong place.
  let config = if location.kind() == LOCAL_SCHEME {
    let absolute = dunce::canonicalize(config).with_context(|| format!("Configuration {} not found", config))?;
    absolute.to_string_lossy().into_owned()
  } else {
    config.to_string()
  };

  let rt = runtime()?;
  let (service, manager) = rt.block_on(async {
    let ctx = stack_context()?;
    if ctx.services.kind() == "builtin" {
      bail!(
        "No native service manager available; run `{} watch {}` under a process manager instead",
        APP_NAME,
        config
      );
    }

    let root = ctx.paths.root().to_path_buf();
    let exe = install_executable(&root.join(APP_NAME)).await?;

    let mut environment = BTreeMap::new();
    environment.insert(ROOT_ENV.to_string(), root.to_string_lossy().into_owned());
    let service = Service {
      name: SELF_SERVICE_NAME.to_string(),
      directory: root,
      command: vec![exe.to_string_lossy().into_owned(), "watch".to_string(), config.clone()],
      environment,
    };
    ctx
      .services
      .install(&service)
      .await
      .with_context(|| format!("Failed to install service '{}'", service.name))?;
    Ok::<_, anyhow::Error>((service, ctx.services.kind()))
  })?;

  print_success(&format!("Installed service '{}'", service.name));
  print_stat("Manager", manager);
  print_stat("Command", &service.command.join(" "));
  Ok(())
}

/// Copy the current executable to `target`, replacing any previous copy
/// by rename so a running instance is not disturbed.
async fn install_executable(target: &Path) -> Result<PathBuf> {
  let exe = std::env::current_exe().context("Failed to locate current executable")?;
  let exe = dunce::canonicalize(&exe).unwrap_or(exe);
  if dunce::canonicalize(target).is_ok_and(|existing| existing == exe) {
    debug!(path = %target.display(), "already running the installed executable");
    return Ok(target.to_path_buf());
  }

  let staged = target.with_extension("new");
  tokio::fs::copy(&exe, &staged)
    .await
    .with_context(|| format!("Failed to copy {} to {}", exe.display(), staged.display()))?;
  #[cfg(unix)]
  {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(&staged, std::fs::Permissions::from_mode(0o755))
      .await
      .with_context(|| format!("Failed to mark {} executable", staged.display()))?;
  }
  tokio::fs::rename(&staged, target)
    .await
    .with_context(|| format!("Failed to move {} into place", target.display()))?;
  info!(from = %exe.display(), to = %target.display(), "installed executable");
  Ok(target.to_path_buf())
}

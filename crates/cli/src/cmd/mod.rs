mod apply;
mod cp;
mod install;
mod ls;
mod rm;
mod service_runner;
mod status;
mod watch;

pub use apply::cmd_apply;
pub use cp::cmd_cp;
pub use install::cmd_install;
pub use ls::cmd_ls;
pub use rm::cmd_rm;
pub use service_runner::cmd_service_runner;
pub use status::cmd_status;
pub use watch::cmd_watch;

use anyhow::{Context, Result};
use pullstack_lib::config::Location;
use pullstack_lib::context::StackContext;
use pullstack_lib::settings::Settings;

fn runtime() -> Result<tokio::runtime::Runtime> {
  tokio::runtime::Runtime::new().context("Failed to create async runtime")
}

fn parse_location(raw: &str) -> Result<Location> {
  Location::parse(raw).with_context(|| format!("Invalid location '{}'", raw))
}

/// Settings from the environment plus the host context built from them.
/// Must be called inside a runtime.
fn stack_context() -> Result<StackContext> {
  let settings = Settings::from_env().context("Invalid settings")?;
  let root = settings.root.clone();
  StackContext::from_settings(settings).with_context(|| format!("Failed to prepare root directory {}", root.display()))
}

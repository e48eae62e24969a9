//! Runtime settings read from the environment.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::consts::{DEFAULT_LOCK_PORT, DEFAULT_POLL_INTERVAL_SECS, DEFAULT_RESTART_COOLDOWN_SECS};
use crate::platform::{StackPaths, is_elevated};

pub const ROOT_ENV: &str = "PULLSTACK_ROOT";
pub const POLL_INTERVAL_ENV: &str = "PULLSTACK_POLL_INTERVAL";
pub const SERVICE_MANAGER_ENV: &str = "PULLSTACK_SERVICE_MANAGER";
pub const LOCK_PORT_ENV: &str = "PULLSTACK_LOCK_PORT";
pub const RESTART_COOLDOWN_ENV: &str = "PULLSTACK_RESTART_COOLDOWN";

#[derive(Debug, Error)]
pub enum SettingsError {
  #[error("invalid value {value:?} for {var}: {reason}")]
  Invalid {
    var: &'static str,
    value: String,
    reason: String,
  },
}

/// Which service manager backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServiceManagerKind {
  /// Pick from the detected init system and privilege level.
  #[default]
  Auto,
  Builtin,
  Systemd,
  Upstart,
}

impl FromStr for ServiceManagerKind {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "" | "auto" => Ok(Self::Auto),
      "builtin" | "local" => Ok(Self::Builtin),
      "systemd" => Ok(Self::Systemd),
      "upstart" => Ok(Self::Upstart),
      other => Err(format!("unknown service manager '{}'", other)),
    }
  }
}

/// Settings shared by every command.
#[derive(Debug, Clone)]
pub struct Settings {
  pub root: PathBuf,
  pub elevated: bool,
  pub poll_interval: Duration,
  pub service_manager: ServiceManagerKind,
  pub lock_port: u16,
  pub restart_cooldown: Duration,
}

impl Settings {
  /// Load settings from `PULLSTACK_*` environment variables, falling back to defaults.
  pub fn from_env() -> Result<Self, SettingsError> {
    let elevated = is_elevated();
    let root = std::env::var(ROOT_ENV)
      .ok()
      .filter(|s| !s.trim().is_empty())
      .map(PathBuf::from)
      .unwrap_or_else(|| StackPaths::default_root(elevated));

    let poll_interval = Duration::from_secs(parse_var(POLL_INTERVAL_ENV, DEFAULT_POLL_INTERVAL_SECS)?.max(1));
    let restart_cooldown = Duration::from_secs(parse_var(RESTART_COOLDOWN_ENV, DEFAULT_RESTART_COOLDOWN_SECS)?);
    let lock_port = parse_var(LOCK_PORT_ENV, DEFAULT_LOCK_PORT)?;
    let service_manager = parse_var(SERVICE_MANAGER_ENV, ServiceManagerKind::Auto)?;

    Ok(Self {
      root,
      elevated,
      poll_interval,
      service_manager,
      lock_port,
      restart_cooldown,
    })
  }

  /// Default settings rooted at `root`.
  pub fn with_root(root: impl Into<PathBuf>) -> Self {
    Self {
      root: root.into(),
      elevated: is_elevated(),
      poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
      service_manager: ServiceManagerKind::Auto,
      lock_port: DEFAULT_LOCK_PORT,
      restart_cooldown: Duration::from_secs(DEFAULT_RESTART_COOLDOWN_SECS),
    }
  }

  pub fn paths(&self) -> StackPaths {
    StackPaths::new(self.root.clone())
  }
}

fn parse_var<T>(var: &'static str, default: T) -> Result<T, SettingsError>
where
  T: FromStr,
  T::Err: std::fmt::Display,
{
  match std::env::var(var) {
    Ok(value) if !value.trim().is_empty() => value.trim().parse().map_err(|e: T::Err| SettingsError::Invalid {
      var,
      value,
      reason: e.to_string(),
    }),
    _ => Ok(default),
  }
}

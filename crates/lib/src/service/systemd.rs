//! systemd unit-file backend.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use super::command::resolve_program;
use super::{Service, ServiceError, ServiceManager};
use crate::consts::SERVICE_PREFIX;

pub struct SystemdManager {
  unit_dir: PathBuf,
}

impl SystemdManager {
  pub fn new(unit_dir: impl Into<PathBuf>) -> Self {
    Self {
      unit_dir: unit_dir.into(),
    }
  }

  pub fn unit_dir(&self) -> &Path {
    &self.unit_dir
  }

  fn unit_path(&self, name: &str) -> PathBuf {
    self.unit_dir.join(format!("{}.service", name))
  }
}

/// Render the unit file for `service`.
pub fn render_unit(service: &Service) -> String {
  let program = match service.command.first() {
    Some(program) => resolve_program(&service.directory, program),
    None => PathBuf::new(),
  };
  let mut exec_start = quote(&program.to_string_lossy());
  for arg in service.command.iter().skip(1) {
    exec_start.push(' ');
    exec_start.push_str(&quote(arg));
  }

  let mut unit = String::new();
  unit.push_str("[Unit]\n");
  unit.push_str(&format!("Description={}\n\n", service.name));
  unit.push_str("[Service]\n");
  for (key, value) in &service.environment {
    unit.push_str(&format!("Environment={}\n", quote(&format!("{}={}", key, value))));
  }
  unit.push_str(&format!("ExecStart={}\n", exec_start));
  unit.push_str(&format!("WorkingDirectory={}\n", service.directory.display()));
  unit.push_str("Restart=always\n\n");
  unit.push_str("[Install]\n");
  unit.push_str("WantedBy=multi-user.target\n");
  unit
}

fn quote(s: &str) -> String {
  if !s.is_empty() && !s.contains(|c: char| c.is_whitespace() || c == '"' || c == '\\') {
    return s.to_string();
  }
  format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Service names from `systemctl list-units --no-legend` output.
pub fn parse_list_units(output: &str) -> Vec<String> {
  let mut names: Vec<String> = output
    .lines()
    .filter_map(|line| {
      line
        .split_whitespace()
        .find(|field| field.ends_with(".service"))
        .and_then(|unit| unit.strip_suffix(".service"))
    })
    .filter(|name| name.starts_with(SERVICE_PREFIX))
    .map(str::to_string)
    .collect();
  names.sort();
  names.dedup();
  names
}

pub(crate) async fn run(program: &str, args: &[&str]) -> Result<String, ServiceError> {
  debug!(program, ?args, "running");
  let output = Command::new(program).args(args).output().await?;
  let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
  text.push_str(&String::from_utf8_lossy(&output.stderr));
  if !output.status.success() {
    return Err(ServiceError::Command {
      command: format!("{} {}", program, args.join(" ")),
      output: text.trim().to_string(),
    });
  }
  Ok(text)
}

#[async_trait]
impl ServiceManager for SystemdManager {
  async fn install(&self, service: &Service) -> Result<(), ServiceError> {
    if service.command.is_empty() {
      return Err(ServiceError::EmptyCommand(service.name.clone()));
    }
    let path = self.unit_path(&service.name);
    tokio::fs::write(&path, render_unit(service)).await?;
    info!(service = %service.name, unit = %path.display(), "wrote unit file");

    run("systemctl", &["daemon-reload"]).await?;
    run("systemctl", &["start", &service.name]).await?;
    run("systemctl", &["enable", &service.name]).await?;
    Ok(())
  }

  async fn uninstall(&self, name: &str) -> Result<(), ServiceError> {
    // Each step tolerates a unit that is already gone.
    let _ = run("systemctl", &["disable", name]).await;
    let _ = run("systemctl", &["stop", name]).await;
    match tokio::fs::remove_file(self.unit_path(name)).await {
      Ok(()) => {}
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
      Err(e) => return Err(e.into()),
    }
    let _ = run("systemctl", &["daemon-reload"]).await;
    info!(service = %name, "uninstalled unit");
    Ok(())
  }

  async fn list(&self) -> Result<Vec<String>, ServiceError> {
    let pattern = format!("{}*", SERVICE_PREFIX);
    let output = run(
      "systemctl",
      &["list-units", "--all", "--full", "--no-pager", "--no-legend", &pattern],
    )
    .await?;
    Ok(parse_list_units(&output))
  }

  fn kind(&self) -> &'static str {
    "systemd"
  }
}

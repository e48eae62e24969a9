//! Upstart job backend.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use super::command::resolve_program;
use super::systemd::run;
use super::{Service, ServiceError, ServiceManager};
use crate::consts::SERVICE_PREFIX;

const JOB_DIR: &str = "/etc/init";

/// Wait between stopping and restarting a job that was already running.
const RESTART_WAIT: Duration = Duration::from_secs(10);

pub struct UpstartManager {
  job_dir: PathBuf,
}

impl UpstartManager {
  pub fn new() -> Self {
    Self {
      job_dir: PathBuf::from(JOB_DIR),
    }
  }

  fn job_path(&self, name: &str) -> PathBuf {
    self.job_dir.join(format!("{}.conf", name))
  }
}

impl Default for UpstartManager {
  fn default() -> Self {
    Self::new()
  }
}

/// Render the job configuration for `service`.
pub fn render_job(service: &Service) -> String {
  let mut exec = String::from("exec");
  if !service.environment.is_empty() {
    exec.push_str(" env");
    for (key, value) in &service.environment {
      exec.push_str(&format!(" \"{}={}\"", key, value.replace('"', "\\\"")));
    }
  }
  if let Some((program, args)) = service.command.split_first() {
    exec.push(' ');
    exec.push_str(&resolve_program(&service.directory, program).to_string_lossy());
    for arg in args {
      exec.push(' ');
      exec.push_str(arg);
    }
  }

  format!(
    "description \"{}\"\n\nstart on (started networking)\nrespawn\n\nchdir {}\n{}\n",
    service.name,
    service.directory.display(),
    exec
  )
}

/// Running prefixed jobs from `initctl list` output.
pub fn parse_initctl_list(output: &str) -> Vec<String> {
  let mut names: Vec<String> = output
    .lines()
    .filter_map(|line| {
      let mut fields = line.split_whitespace();
      let name = fields.next()?;
      let status = fields.next()?;
      (name.starts_with(SERVICE_PREFIX) && status.contains("running")).then(|| name.to_string())
    })
    .collect();
  names.sort();
  names
}

#[async_trait]
impl ServiceManager for UpstartManager {
  async fn install(&self, service: &Service) -> Result<(), ServiceError> {
    if service.command.is_empty() {
      return Err(ServiceError::EmptyCommand(service.name.clone()));
    }
    let path = self.job_path(&service.name);
    tokio::fs::write(&path, render_job(service)).await?;
    info!(service = %service.name, job = %path.display(), "wrote upstart job");

    match run("initctl", &["start", &service.name]).await {
      Ok(_) => Ok(()),
      Err(ServiceError::Command { output, .. }) if output.contains("already running") => {
        warn!(service = %service.name, "job already running, restarting");
        let _ = run("initctl", &["stop", &service.name]).await;
        tokio::time::sleep(RESTART_WAIT).await;
        run("initctl", &["start", &service.name]).await.map(|_| ())
      }
      Err(e) => Err(e),
    }
  }

  async fn uninstall(&self, name: &str) -> Result<(), ServiceError> {
    match tokio::fs::remove_file(self.job_path(name)).await {
      Ok(()) => {}
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
      Err(e) => return Err(e.into()),
    }
    match run("initctl", &["stop", name]).await {
      Ok(_) => {}
      Err(ServiceError::Command { output, .. }) if output.contains("Unknown") => {}
      Err(e) => return Err(e),
    }
    info!(service = %name, "uninstalled upstart job");
    Ok(())
  }

  async fn list(&self) -> Result<Vec<String>, ServiceError> {
    let output = run("initctl", &["list"]).await?;
    Ok(parse_initctl_list(&output))
  }

  fn kind(&self) -> &'static str {
    "upstart"
  }
}

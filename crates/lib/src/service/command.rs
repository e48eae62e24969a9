//! Turning a [`Service`] record into a runnable process.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;

use super::{Service, ServiceError};

/// Resolve the program to run.
///
/// A relative program that exists inside the service directory (optionally
/// with `.exe` appended) is run from there; anything else is left to `PATH`.
pub fn resolve_program(directory: &Path, program: &str) -> PathBuf {
  let candidate = Path::new(program);
  if candidate.is_absolute() {
    return candidate.to_path_buf();
  }
  let local = directory.join(program);
  if local.is_file() {
    return local;
  }
  let exe = directory.join(format!("{}.exe", program));
  if exe.is_file() {
    return exe;
  }
  candidate.to_path_buf()
}

/// Build the process for `service`: stdio piped for log forwarding, killed
/// when its handle is dropped.
///
/// The child inherits the ambient environment as raw OS strings, with the
/// declared pairs layered on top.
pub fn build_command(service: &Service) -> Result<Command, ServiceError> {
  let (program, args) = service
    .command
    .split_first()
    .ok_or_else(|| ServiceError::EmptyCommand(service.name.clone()))?;

  let mut command = Command::new(resolve_program(&service.directory, program));
  command
    .args(args)
    .current_dir(&service.directory)
    .envs(&service.environment)
    .stdin(Stdio::null())
    .stdout(Stdio::piped())
    .stderr(Stdio::piped())
    .kill_on_drop(true);
  Ok(command)
}

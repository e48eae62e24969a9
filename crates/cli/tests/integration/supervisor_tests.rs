//! The built-in service manager against the real `pullstack service-runner`.

#![cfg(target_os = "linux")]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use pullstack_lib::service::client::SupervisorClient;
use pullstack_lib::service::{Service, ServiceManager};
use tempfile::TempDir;

fn sleeper(dir: &Path) -> Service {
  Service {
    name: "stack-sleeper".to_string(),
    directory: dir.to_path_buf(),
    command: vec!["sleep".to_string(), "300".to_string()],
    environment: BTreeMap::new(),
  }
}

/// Pid the supervisor last recorded for `name`.
fn recorded_pid(state_file: &Path, name: &str) -> u32 {
  let state: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(state_file).unwrap()).unwrap();
  state[name]["pid"].as_u64().unwrap() as u32
}

/// Parent pid from `/proc/<pid>/stat`.
fn parent_of(pid: u32) -> u32 {
  let stat = std::fs::read_to_string(format!("/proc/{}/stat", pid)).unwrap();
  let after_comm = &stat[stat.rfind(')').unwrap() + 1..];
  after_comm.split_whitespace().nth(1).unwrap().parse().unwrap()
}

fn kill(pid: u32) {
  let status = std::process::Command::new("kill")
    .args(["-9", &pid.to_string()])
    .status()
    .unwrap();
  assert!(status.success());
}

/// Wait until `pid` is gone or a zombie, i.e. its sockets are closed.
async fn exited(pid: u32) -> bool {
  for _ in 0..100 {
    let stat = std::fs::read_to_string(format!("/proc/{}/stat", pid)).unwrap_or_default();
    let zombie = stat.rsplit(')').next().is_some_and(|rest| rest.trim_start().starts_with('Z'));
    if stat.is_empty() || zombie {
      return true;
    }
    tokio::time::sleep(Duration::from_millis(50)).await;
  }
  false
}

#[tokio::test]
async fn dead_supervisor_is_respawned_with_its_services() {
  let temp = TempDir::new().unwrap();
  let state_file: PathBuf = temp.path().join("run").join("services.state");
  let client = SupervisorClient::with_program(env!("CARGO_BIN_EXE_pullstack"), &state_file);

  client.install(&sleeper(temp.path())).await.unwrap();
  let first_service = recorded_pid(&state_file, "stack-sleeper");
  let first_supervisor = parent_of(first_service);

  kill(first_supervisor);
  assert!(exited(first_supervisor).await);
  // the supervisor died without stopping its child
  kill(first_service);

  assert_eq!(client.list().await.unwrap(), vec!["stack-sleeper"]);

  let second_service = recorded_pid(&state_file, "stack-sleeper");
  assert_ne!(second_service, first_service);
  let second_supervisor = parent_of(second_service);
  assert_ne!(second_supervisor, first_supervisor);

  client.uninstall("stack-sleeper").await.unwrap();
  assert!(client.list().await.unwrap().is_empty());
  drop(client);

  // with its client gone the supervisor exits
  assert!(exited(second_supervisor).await, "supervisor outlived its client");
}

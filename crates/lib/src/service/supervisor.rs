//! The built-in process supervisor daemon.
//!
//! The supervisor runs as `pullstack service-runner`, spawned on demand by
//! [`super::client::SupervisorClient`]. It dials back to the client's
//! address, serves requests on that one connection, and when the connection
//! closes it kills every process it started and exits. The table of services
//! is persisted to a state file so the next supervisor can bring them back.
//!
//! # Restart policy
//!
//! Each process has a waiter task. When the process exits on its own, the
//! waiter sleeps for the cool-down and relaunches it, but only if the table
//! still maps the service to the pid that exited. Install and uninstall
//! replace or remove the entry, so a process they killed is never revived.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, BufReader};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, oneshot};
use tracing::{debug, error, info, warn};

use super::command::build_command;
use super::rpc::{SupervisorRequest, SupervisorResponse, read_message, write_message};
use super::{Service, ServiceError};

/// One entry of the persisted table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedService {
  #[serde(flatten)]
  pub service: Service,
  /// Pid at the time of the last write. Never trusted on load.
  #[serde(default)]
  pub pid: u32,
}

struct Tracked {
  service: Service,
  pid: u32,
  /// Dropping or firing this kills the process.
  kill: oneshot::Sender<()>,
  /// Resolves once the process is gone.
  stopped: oneshot::Receiver<()>,
}

impl Tracked {
  /// Kill the process and wait until it has been reaped.
  async fn stop(self) {
    let _ = self.kill.send(());
    let _ = self.stopped.await;
  }
}

struct Inner {
  state_file: PathBuf,
  cooldown: Duration,
  table: Mutex<BTreeMap<String, Tracked>>,
}

/// Handle to the supervisor's service table. Cloning shares the table.
#[derive(Clone)]
pub struct Supervisor {
  inner: Arc<Inner>,
}

impl Supervisor {
  pub fn new(state_file: impl Into<PathBuf>, cooldown: Duration) -> Self {
    Self {
      inner: Arc::new(Inner {
        state_file: state_file.into(),
        cooldown,
        table: Mutex::new(BTreeMap::new()),
      }),
    }
  }

  /// Launch every service recorded in the state file.
  ///
  /// A missing or unreadable state file starts an empty table. Services that
  /// fail to launch are logged and dropped.
  pub async fn restore(&self) -> Result<(), ServiceError> {
    let recorded = load_state(&self.inner.state_file).await;
    let mut table = self.inner.table.lock().await;
    for (name, persisted) in recorded {
      match self.launch(&persisted.service) {
        Ok(tracked) => {
          info!(service = %name, pid = tracked.pid, "restored service");
          table.insert(name, tracked);
        }
        Err(e) => error!(service = %name, error = %e, "failed to restore service"),
      }
    }
    self.persist(&table).await
  }

  pub async fn install(&self, service: Service) -> Result<(), ServiceError> {
    let mut table = self.inner.table.lock().await;
    if let Some(previous) = table.remove(&service.name) {
      info!(service = %service.name, pid = previous.pid, "replacing running service");
      previous.stop().await;
    }
    let result = self.launch(&service).map(|tracked| {
      info!(service = %service.name, pid = tracked.pid, "installed service");
      table.insert(service.name.clone(), tracked);
    });
    self.persist(&table).await?;
    result
  }

  pub async fn uninstall(&self, name: &str) -> Result<(), ServiceError> {
    let mut table = self.inner.table.lock().await;
    if let Some(tracked) = table.remove(name) {
      info!(service = %name, pid = tracked.pid, "uninstalled service");
      tracked.stop().await;
    }
    self.persist(&table).await
  }

  /// Sorted names of tracked services.
  pub async fn list(&self) -> Vec<String> {
    self.inner.table.lock().await.keys().cloned().collect()
  }

  /// Current pid of a tracked service.
  pub async fn pid(&self, name: &str) -> Option<u32> {
    self.inner.table.lock().await.get(name).map(|t| t.pid)
  }

  /// Kill every tracked process. The state file is left as is.
  pub async fn shutdown(&self) {
    let mut table = self.inner.table.lock().await;
    let count = table.len();
    for (_, tracked) in std::mem::take(&mut *table) {
      tracked.stop().await;
    }
    info!(count, "stopped all services");
  }

  /// Answer requests on `stream` until the peer closes it.
  pub async fn serve<S>(&self, stream: S) -> Result<(), ServiceError>
  where
    S: AsyncRead + AsyncWrite + Send,
  {
    let (reader, mut writer) = tokio::io::split(stream);
    let mut reader = BufReader::new(reader);

    while let Some(request) = read_message::<_, SupervisorRequest>(&mut reader).await? {
      debug!(?request, "supervisor request");
      let response = self.handle(request).await;
      write_message(&mut writer, &response).await?;
    }
    Ok(())
  }

  async fn handle(&self, request: SupervisorRequest) -> SupervisorResponse {
    let result = match request {
      SupervisorRequest::Install { service } => self.install(service).await.map(|_| Vec::new()),
      SupervisorRequest::Uninstall { name } => self.uninstall(&name).await.map(|_| Vec::new()),
      SupervisorRequest::List => Ok(self.list().await),
    };
    match result {
      Ok(names) => SupervisorResponse::names(names),
      Err(e) => SupervisorResponse::error(e.to_string()),
    }
  }

  /// Start the process for `service` and its output readers and waiter.
  fn launch(&self, service: &Service) -> Result<Tracked, ServiceError> {
    let mut child = build_command(service)?.spawn().map_err(|source| ServiceError::Launch {
      name: service.name.clone(),
      source,
    })?;
    let pid = child.id().unwrap_or_default();

    if let Some(stdout) = child.stdout.take() {
      tokio::spawn(forward_output(service.name.clone(), stdout));
    }
    if let Some(stderr) = child.stderr.take() {
      tokio::spawn(forward_output(service.name.clone(), stderr));
    }

    let (kill_tx, kill_rx) = oneshot::channel();
    let (stopped_tx, stopped_rx) = oneshot::channel();
    let supervisor = self.clone();
    let name = service.name.clone();
    tokio::spawn(async move {
      tokio::select! {
        status = child.wait() => {
          match status {
            Ok(status) => warn!(service = %name, pid, %status, "service exited"),
            Err(e) => warn!(service = %name, pid, error = %e, "failed to wait for service"),
          }
          drop(stopped_tx);
          supervisor.restart_after_exit(name, pid).await;
        }
        _ = kill_rx => {
          if let Err(e) = child.kill().await {
            debug!(service = %name, pid, error = %e, "kill failed");
          }
          let _ = stopped_tx.send(());
        }
      }
    });

    Ok(Tracked {
      service: service.clone(),
      pid,
      kill: kill_tx,
      stopped: stopped_rx,
    })
  }

  async fn restart_after_exit(&self, name: String, exited_pid: u32) {
    loop {
      tokio::time::sleep(self.inner.cooldown).await;

      let mut table = self.inner.table.lock().await;
      let service = match table.get(&name) {
        Some(tracked) if tracked.pid == exited_pid => tracked.service.clone(),
        _ => {
          debug!(service = %name, pid = exited_pid, "service replaced or removed, not restarting");
          return;
        }
      };

      match self.launch(&service) {
        Ok(tracked) => {
          info!(service = %name, old_pid = exited_pid, pid = tracked.pid, "restarted service");
          table.insert(name, tracked);
          if let Err(e) = self.persist(&table).await {
            error!(error = %e, "failed to persist supervisor state");
          }
          return;
        }
        Err(e) => error!(service = %name, error = %e, "restart failed, retrying after cool-down"),
      }
    }
  }

  async fn persist(&self, table: &BTreeMap<String, Tracked>) -> Result<(), ServiceError> {
    let state: BTreeMap<&str, PersistedService> = table
      .iter()
      .map(|(name, tracked)| {
        (
          name.as_str(),
          PersistedService {
            service: tracked.service.clone(),
            pid: tracked.pid,
          },
        )
      })
      .collect();
    save_state(&self.inner.state_file, &state).await
  }
}

/// Run the supervisor daemon: restore the state file, dial `address`, and
/// serve until the connection closes.
pub async fn run(address: &str, state_file: &Path, cooldown: Duration) -> Result<(), ServiceError> {
  let supervisor = Supervisor::new(state_file, cooldown);
  supervisor.restore().await?;

  info!(%address, "connecting to client");
  let stream = TcpStream::connect(address).await.map_err(ServiceError::Transport)?;
  let served = supervisor.serve(stream).await;

  info!("client disconnected, shutting down");
  supervisor.shutdown().await;
  served
}

async fn forward_output<R>(name: String, stream: R)
where
  R: AsyncRead + Unpin,
{
  let mut lines = BufReader::new(stream).lines();
  loop {
    match lines.next_line().await {
      Ok(Some(line)) => info!(service = %name, "{}", line),
      Ok(None) => break,
      Err(e) => {
        debug!(service = %name, error = %e, "output stream closed");
        break;
      }
    }
  }
}

async fn load_state(path: &Path) -> BTreeMap<String, PersistedService> {
  let content = match tokio::fs::read_to_string(path).await {
    Ok(content) => content,
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => return BTreeMap::new(),
    Err(e) => {
      warn!(path = %path.display(), error = %e, "failed to read supervisor state");
      return BTreeMap::new();
    }
  };
  match serde_json::from_str(&content) {
    Ok(state) => state,
    Err(e) => {
      warn!(path = %path.display(), error = %e, "ignoring malformed supervisor state");
      BTreeMap::new()
    }
  }
}

async fn save_state(path: &Path, state: &BTreeMap<&str, PersistedService>) -> Result<(), ServiceError> {
  let persist_err = |source| ServiceError::Persist {
    path: path.to_path_buf(),
    source,
  };
  let json = serde_json::to_string_pretty(state)?;
  if let Some(parent) = path.parent() {
    tokio::fs::create_dir_all(parent).await.map_err(persist_err)?;
  }
  let tmp = path.with_extension("tmp");
  tokio::fs::write(&tmp, json).await.map_err(persist_err)?;
  tokio::fs::rename(&tmp, path).await.map_err(persist_err)
}

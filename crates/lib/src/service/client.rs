//! The built-in service manager: a client for a lazily spawned supervisor.
//!
//! On first use the client binds an ephemeral loopback port, spawns the
//! current executable as `service-runner --address <addr> --state-file
//! <path>` in its own process group, and accepts the one connection the
//! supervisor makes back. That connection is kept for the client's lifetime.
//! A call that fails on the transport respawns the supervisor and is retried
//! once.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite, BufReader, ReadHalf, WriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::rpc::{SupervisorRequest, SupervisorResponse, read_message, write_message};
use super::{Service, ServiceError, ServiceManager};

/// How long a freshly spawned supervisor has to connect back.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);

type BoxedStream = Box<dyn Stream>;

trait Stream: AsyncRead + AsyncWrite + Send + Unpin {}
impl<T: AsyncRead + AsyncWrite + Send + Unpin> Stream for T {}

/// An established request/response channel to a supervisor.
pub struct SupervisorConnection {
  reader: BufReader<ReadHalf<BoxedStream>>,
  writer: WriteHalf<BoxedStream>,
}

impl SupervisorConnection {
  pub fn new<S>(stream: S) -> Self
  where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
  {
    let boxed: BoxedStream = Box::new(stream);
    let (reader, writer) = tokio::io::split(boxed);
    Self {
      reader: BufReader::new(reader),
      writer,
    }
  }

  /// Send one request and wait for its response.
  pub async fn call(&mut self, request: &SupervisorRequest) -> Result<SupervisorResponse, ServiceError> {
    write_message(&mut self.writer, request).await?;
    match read_message(&mut self.reader).await? {
      Some(response) => Ok(response),
      None => Err(ServiceError::Transport(std::io::Error::new(
        std::io::ErrorKind::UnexpectedEof,
        "supervisor closed the connection",
      ))),
    }
  }
}

/// Service manager backed by the built-in supervisor.
pub struct SupervisorClient {
  program: Option<PathBuf>,
  state_file: PathBuf,
  connection: Mutex<Option<SupervisorConnection>>,
}

impl SupervisorClient {
  /// Client that spawns the current executable as the supervisor.
  pub fn new(state_file: impl Into<PathBuf>) -> Self {
    Self {
      program: None,
      state_file: state_file.into(),
      connection: Mutex::new(None),
    }
  }

  /// Client that spawns `program` as the supervisor.
  pub fn with_program(program: impl Into<PathBuf>, state_file: impl Into<PathBuf>) -> Self {
    Self {
      program: Some(program.into()),
      state_file: state_file.into(),
      connection: Mutex::new(None),
    }
  }

  /// Client over an already established connection. It cannot respawn.
  pub fn from_connection(connection: SupervisorConnection) -> Self {
    Self {
      program: None,
      state_file: PathBuf::new(),
      connection: Mutex::new(Some(connection)),
    }
  }

  async fn request(&self, request: SupervisorRequest) -> Result<Vec<String>, ServiceError> {
    let mut guard = self.connection.lock().await;

    let mut attempts = 0;
    loop {
      attempts += 1;
      if guard.is_none() {
        *guard = Some(self.spawn().await?);
      }
      let Some(connection) = guard.as_mut() else {
        continue;
      };
      match connection.call(&request).await {
        Ok(response) => return response.into_result(),
        Err(e) if e.is_transport() && attempts < 2 && !self.state_file.as_os_str().is_empty() => {
          warn!(error = %e, "supervisor connection lost, respawning");
          *guard = None;
        }
        Err(e) => {
          if e.is_transport() {
            *guard = None;
          }
          return Err(e);
        }
      }
    }
  }

  async fn spawn(&self) -> Result<SupervisorConnection, ServiceError> {
    let program = match &self.program {
      Some(program) => program.clone(),
      None => std::env::current_exe()?,
    };

    let listener = TcpListener::bind("127.0.0.1:0").await.map_err(ServiceError::Transport)?;
    let address = listener.local_addr().map_err(ServiceError::Transport)?;

    let mut command = Command::new(&program);
    command
      .arg("service-runner")
      .arg("--address")
      .arg(address.to_string())
      .arg("--state-file")
      .arg(&self.state_file)
      .stdin(Stdio::null())
      .stdout(Stdio::inherit())
      .stderr(Stdio::inherit());
    #[cfg(unix)]
    command.process_group(0);

    let mut child = command.spawn().map_err(|source| ServiceError::Launch {
      name: "service-runner".to_string(),
      source,
    })?;
    debug!(program = %program.display(), %address, pid = ?child.id(), "spawned supervisor");

    let stream: TcpStream = tokio::select! {
      accepted = listener.accept() => accepted.map_err(ServiceError::Transport)?.0,
      status = child.wait() => return Err(ServiceError::SupervisorExited(status?)),
      _ = tokio::time::sleep(HANDSHAKE_TIMEOUT) => {
        let _ = child.start_kill();
        return Err(ServiceError::HandshakeTimeout(HANDSHAKE_TIMEOUT));
      }
    };
    info!(%address, pid = ?child.id(), "supervisor connected");
    Ok(SupervisorConnection::new(stream))
  }
}

#[async_trait]
impl ServiceManager for SupervisorClient {
  async fn install(&self, service: &Service) -> Result<(), ServiceError> {
    self
      .request(SupervisorRequest::Install {
        service: service.clone(),
      })
      .await
      .map(|_| ())
  }

  async fn uninstall(&self, name: &str) -> Result<(), ServiceError> {
    self
      .request(SupervisorRequest::Uninstall { name: name.to_string() })
      .await
      .map(|_| ())
  }

  async fn list(&self) -> Result<Vec<String>, ServiceError> {
    self.request(SupervisorRequest::List).await
  }

  fn kind(&self) -> &'static str {
    "builtin"
  }
}

//! Newline-delimited JSON messages between the supervisor and its client.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use super::{Service, ServiceError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum SupervisorRequest {
  Install { service: Service },
  Uninstall { name: String },
  List,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupervisorResponse {
  pub ok: bool,
  #[serde(default)]
  pub message: String,
  #[serde(default)]
  pub names: Vec<String>,
}

impl SupervisorResponse {
  pub fn names(names: Vec<String>) -> Self {
    Self {
      ok: true,
      names,
      ..Default::default()
    }
  }

  pub fn error(message: impl Into<String>) -> Self {
    Self {
      ok: false,
      message: message.into(),
      names: Vec::new(),
    }
  }

  pub fn into_result(self) -> Result<Vec<String>, ServiceError> {
    if self.ok {
      Ok(self.names)
    } else {
      Err(ServiceError::Remote(self.message))
    }
  }
}

/// Write one message followed by a newline.
pub async fn write_message<W, T>(writer: &mut W, message: &T) -> Result<(), ServiceError>
where
  W: AsyncWrite + Unpin,
  T: Serialize,
{
  let mut line = serde_json::to_vec(message)?;
  line.push(b'\n');
  writer.write_all(&line).await.map_err(ServiceError::Transport)?;
  writer.flush().await.map_err(ServiceError::Transport)
}

/// Read one message. `Ok(None)` means the peer closed the stream.
pub async fn read_message<R, T>(reader: &mut R) -> Result<Option<T>, ServiceError>
where
  R: AsyncBufRead + Unpin,
  T: DeserializeOwned,
{
  let mut line = String::new();
  loop {
    line.clear();
    let read = reader.read_line(&mut line).await.map_err(ServiceError::Transport)?;
    if read == 0 {
      return Ok(None);
    }
    if !line.trim().is_empty() {
      break;
    }
  }
  Ok(Some(serde_json::from_str(line.trim_end())?))
}

//! HTTP(S) storage via `reqwest`.

use std::io::Cursor;

use async_trait::async_trait;
use reqwest::header::{ETAG, IF_NONE_MATCH, LAST_MODIFIED};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use tokio::io::AsyncReadExt;
use tracing::debug;

use super::{ByteStream, StorageError, StorageProvider};
use crate::config::Location;

#[derive(Debug, Clone, Default)]
pub struct HttpStorage {
  client: Client,
}

impl HttpStorage {
  pub fn new() -> Self {
    Self { client: Client::new() }
  }

  /// URL for a location: `scheme://host/path?query`.
  pub fn url(location: &Location) -> String {
    let scheme = location.get("scheme").unwrap_or(location.kind());
    let mut url = format!("{}://{}{}", scheme, location.host(), location.path());
    if let Some(query) = location.get("query").filter(|q| !q.is_empty()) {
      url.push('?');
      url.push_str(query);
    }
    url
  }

  fn request(&self, method: Method, location: &Location) -> RequestBuilder {
    let mut request = self.client.request(method, Self::url(location));
    for (name, value) in location.headers() {
      request = request.header(name, value);
    }
    if let Some(user) = location.get("user") {
      request = request.basic_auth(user, location.get("password"));
    }
    request
  }

  async fn send(&self, request: RequestBuilder, location: &Location) -> Result<reqwest::Response, StorageError> {
    request.send().await.map_err(|source| StorageError::Http {
      location: location.to_string(),
      source,
    })
  }
}

fn check(response: &reqwest::Response, location: &Location) -> Result<(), StorageError> {
  if response.status().is_success() {
    return Ok(());
  }
  Err(StorageError::Status {
    location: location.to_string(),
    status: response.status().as_u16(),
  })
}

#[async_trait]
impl StorageProvider for HttpStorage {
  async fn get(&self, location: &Location) -> Result<ByteStream, StorageError> {
    let response = self.send(self.request(Method::GET, location), location).await?;
    check(&response, location)?;
    let bytes = response.bytes().await.map_err(|source| StorageError::Http {
      location: location.to_string(),
      source,
    })?;
    debug!(location = %location, bytes = bytes.len(), "fetched");
    Ok(Box::pin(Cursor::new(bytes)))
  }

  async fn put(&self, location: &Location, mut data: ByteStream) -> Result<(), StorageError> {
    let mut body = Vec::new();
    data
      .read_to_end(&mut body)
      .await
      .map_err(|e| StorageError::io(location, e))?;
    let response = self.send(self.request(Method::PUT, location).body(body), location).await?;
    check(&response, location)
  }

  async fn list(&self, location: &Location) -> Result<Vec<String>, StorageError> {
    Err(StorageError::Unsupported {
      scheme: location.kind().to_string(),
      operation: "list",
    })
  }

  async fn delete(&self, location: &Location) -> Result<(), StorageError> {
    let response = self.send(self.request(Method::DELETE, location), location).await?;
    check(&response, location)
  }

  async fn version(&self, location: &Location, previous: &str) -> Result<String, StorageError> {
    let mut request = self.request(Method::HEAD, location);
    if !previous.is_empty() {
      request = request.header(IF_NONE_MATCH, previous);
    }
    let response = self.send(request, location).await?;
    if response.status() == StatusCode::NOT_MODIFIED || response.status() == StatusCode::FOUND {
      return Ok(previous.to_string());
    }
    check(&response, location)?;

    let headers = response.headers();
    let token = headers
      .get(ETAG)
      .or_else(|| headers.get(LAST_MODIFIED))
      .and_then(|v| v.to_str().ok())
      .unwrap_or_default();
    Ok(token.to_string())
  }
}

//! Scheme-tagged storage locations.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use super::ConfigError;

/// Scheme used for locations given as plain filesystem paths.
pub const LOCAL_SCHEME: &str = "local";

/// Key prefix for extra request headers (`Headers.Authorization`, ...).
pub const HEADER_PREFIX: &str = "Headers.";

/// A storage location: a flat key/value record whose `type` key selects the
/// storage provider.
///
/// Well-known keys are `type`, `scheme`, `host`, `path`, `query`, `user`,
/// `password` and `Headers.*`. Providers ignore keys they don't understand.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Location(BTreeMap<String, String>);

impl Location {
  /// Parse a URL-like string. Anything without `://` is a local path.
  pub fn parse(raw: &str) -> Result<Self, ConfigError> {
    if !raw.contains("://") {
      let mut map = BTreeMap::new();
      map.insert("type".to_string(), LOCAL_SCHEME.to_string());
      map.insert("path".to_string(), raw.to_string());
      return Ok(Self(map));
    }

    let url = reqwest::Url::parse(raw).map_err(|e| ConfigError::InvalidLocation {
      location: raw.to_string(),
      message: e.to_string(),
    })?;

    let mut map = BTreeMap::new();
    map.insert("type".to_string(), url.scheme().to_string());
    map.insert("scheme".to_string(), url.scheme().to_string());
    let mut host = url.host_str().unwrap_or_default().to_string();
    if let Some(port) = url.port() {
      host = format!("{}:{}", host, port);
    }
    map.insert("host".to_string(), host);
    map.insert("path".to_string(), url.path().to_string());
    map.insert("query".to_string(), url.query().unwrap_or_default().to_string());
    if !url.username().is_empty() {
      map.insert("user".to_string(), url.username().to_string());
      map.insert("password".to_string(), url.password().unwrap_or_default().to_string());
    }
    Ok(Self(map))
  }

  pub fn from_map(map: BTreeMap<String, String>) -> Self {
    Self(map)
  }

  pub fn get(&self, key: &str) -> Option<&str> {
    self.0.get(key).map(String::as_str)
  }

  pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
    self.0.insert(key.into(), value.into());
  }

  /// Storage provider key. Locations without a `type` are treated as local.
  pub fn kind(&self) -> &str {
    self.get("type").unwrap_or(LOCAL_SCHEME)
  }

  pub fn host(&self) -> &str {
    self.get("host").unwrap_or_default()
  }

  pub fn path(&self) -> &str {
    self.get("path").unwrap_or_default()
  }

  /// `Headers.*` entries with the prefix stripped.
  pub fn headers(&self) -> impl Iterator<Item = (&str, &str)> {
    self
      .0
      .iter()
      .filter_map(|(k, v)| k.strip_prefix(HEADER_PREFIX).map(|name| (name, v.as_str())))
  }

  /// Final path component, if any.
  pub fn file_name(&self) -> Option<&str> {
    self.path().rsplit('/').next().filter(|name| !name.is_empty())
  }

  /// Extension of the final path component, keeping a `.tar` prefix for
  /// compressed tarballs (`.tar.gz`, `.tar.xz`, ...).
  pub fn ext(&self) -> String {
    let path = self.path();
    let base = path.rsplit('/').next().unwrap_or_default();
    let ext = match base.rfind('.') {
      Some(idx) => &base[idx..],
      None => return String::new(),
    };
    let tar_ext = format!(".tar{}", ext);
    if path.ends_with(&tar_ext) {
      return tar_ext;
    }
    ext.to_string()
  }

  /// Same location with `name` appended to the path.
  pub fn join(&self, name: &str) -> Self {
    let mut joined = self.clone();
    let path = self.path();
    let sep = if path.is_empty() || path.ends_with('/') { "" } else { "/" };
    joined.set("path", format!("{}{}{}", path, sep, name));
    joined
  }
}

impl fmt::Display for Location {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.kind() {
      LOCAL_SCHEME => write!(f, "{}", self.path()),
      kind => {
        write!(f, "{}://{}{}", kind, self.host(), self.path())?;
        match self.get("query") {
          Some(q) if !q.is_empty() => write!(f, "?{}", q),
          _ => Ok(()),
        }
      }
    }
  }
}

impl std::str::FromStr for Location {
  type Err = ConfigError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::parse(s)
  }
}

impl<'de> Deserialize<'de> for Location {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
      Url(String),
      Map(BTreeMap<String, serde_yaml::Value>),
    }

    match Raw::deserialize(deserializer)? {
      Raw::Url(raw) => Location::parse(&raw).map_err(serde::de::Error::custom),
      Raw::Map(map) => {
        let mut out = BTreeMap::new();
        for (key, value) in map {
          let value = match value {
            serde_yaml::Value::String(s) => s,
            serde_yaml::Value::Bool(b) => b.to_string(),
            serde_yaml::Value::Number(n) => n.to_string(),
            serde_yaml::Value::Null => String::new(),
            other => {
              return Err(serde::de::Error::custom(format!(
                "location key '{}' must be a scalar, got {:?}",
                key, other
              )));
            }
          };
          out.insert(key, value);
        }
        Ok(Location(out))
      }
    }
  }
}

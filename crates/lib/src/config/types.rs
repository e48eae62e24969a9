//! Desired-state records: the configuration document and its applications.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use serde::{Deserialize, Deserializer, Serialize};

use super::{ConfigError, Location};
use crate::consts::SERVICE_PREFIX;
use crate::platform::StackPaths;
use crate::service::Service;
use crate::util::hash::{Fingerprint, Fingerprinted, HashError};

/// The configuration document: the full desired end state of a node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub applications: Vec<Application>,
}

impl Config {
  /// Parse and validate a YAML configuration document.
  pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
    let config: Config = serde_yaml::from_str(yaml)?;
    config.validate()?;
    Ok(config)
  }

  /// Application names must be unique, non-empty, and usable as a single
  /// directory name.
  pub fn validate(&self) -> Result<(), ConfigError> {
    let mut seen = BTreeSet::new();
    for app in &self.applications {
      let name = app.name.as_str();
      if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(ConfigError::InvalidName(name.to_string()));
      }
      if !seen.insert(name) {
        return Err(ConfigError::DuplicateName(name.to_string()));
      }
    }
    Ok(())
  }
}

/// One deployable unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
  pub name: String,
  pub source: Location,
  /// Hardlinks created after extraction: link name → existing target, both
  /// relative to the application directory.
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub links: BTreeMap<String, String>,
  /// Literal files written after extraction: relative path → content.
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub files: BTreeMap<String, String>,
  #[serde(default, skip_serializing_if = "ApplicationService::is_empty")]
  pub service: ApplicationService,
}

impl Fingerprinted for Application {}
impl Fingerprinted for Location {}

impl Application {
  /// Fingerprint of the whole record.
  pub fn content_fingerprint(&self) -> Result<Fingerprint, HashError> {
    self.fingerprint()
  }

  /// Fingerprint of the source location only.
  pub fn source_fingerprint(&self) -> Result<Fingerprint, HashError> {
    self.source.fingerprint()
  }

  pub fn service_name(&self) -> String {
    format!("{}{}", SERVICE_PREFIX, self.name)
  }

  pub fn has_service(&self) -> bool {
    !self.service.is_empty()
  }

  pub fn application_path(&self, paths: &StackPaths) -> PathBuf {
    paths.application_path(&self.name)
  }

  pub fn download_path(&self, paths: &StackPaths) -> PathBuf {
    paths.download_path(&self.name, &self.source.ext())
  }

  /// Service record handed to the service manager.
  pub fn to_service(&self, paths: &StackPaths) -> Service {
    Service {
      name: self.service_name(),
      directory: self.application_path(paths),
      command: self.service.command.clone(),
      environment: self.service.environment.clone(),
    }
  }
}

/// Command and environment of an application's service. An empty command
/// means the application has no service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplicationService {
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub command: Vec<String>,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub environment: BTreeMap<String, String>,
}

impl ApplicationService {
  pub fn is_empty(&self) -> bool {
    self.command.is_empty()
  }
}

impl<'de> Deserialize<'de> for ApplicationService {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Command {
      List(Vec<String>),
      Line(String),
    }

    #[derive(Deserialize)]
    struct Raw {
      #[serde(default)]
      command: Option<Command>,
      #[serde(default)]
      environment: Option<BTreeMap<String, String>>,
    }

    let raw = Raw::deserialize(deserializer)?;
    let command = match raw.command {
      Some(Command::List(list)) => list,
      Some(Command::Line(line)) => line.split_whitespace().map(str::to_string).collect(),
      None => Vec::new(),
    };
    Ok(Self {
      command,
      environment: raw.environment.unwrap_or_default(),
    })
  }
}

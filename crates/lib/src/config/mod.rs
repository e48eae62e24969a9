//! Configuration documents and storage locations.

mod location;
mod types;

pub use location::{HEADER_PREFIX, LOCAL_SCHEME, Location};
pub use types::{Application, ApplicationService, Config};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to parse configuration: {0}")]
  Yaml(#[from] serde_yaml::Error),

  #[error("invalid location '{location}': {message}")]
  InvalidLocation { location: String, message: String },

  #[error("invalid application name '{0}'")]
  InvalidName(String),

  #[error("duplicate application name '{0}'")]
  DuplicateName(String),
}

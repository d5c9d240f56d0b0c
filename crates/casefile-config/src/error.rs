use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read config file {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("invalid config: {0}")]
  Parse(#[from] serde_json::Error),

  #[error("duplicate remote output name: {0}")]
  DuplicateRemote(String),
}

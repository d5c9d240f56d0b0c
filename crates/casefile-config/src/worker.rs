use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// A remote output destination that duplicates task artifacts.
///
/// Remotes are filesystem roots (an archive volume, a mounted bucket, ...).
/// Each task's artifacts land under `{root}/{task_id}/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteOutputConfig {
  /// Identifier reported in fan-out results and warnings.
  pub name: String,

  /// Root directory of the destination.
  pub root: PathBuf,
}

/// Configuration of a worker process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerConfig {
  /// Identity reported in task results. Defaults to the host name.
  #[serde(default)]
  pub worker_name: Option<String>,

  /// Root under which per-task output directories are created.
  #[serde(default)]
  pub base_output_dir: Option<PathBuf>,

  /// Remote destinations every local artifact is duplicated to.
  #[serde(default)]
  pub remote_outputs: Vec<RemoteOutputConfig>,
}

impl WorkerConfig {
  /// Parse a config from a JSON string.
  pub fn from_json(content: &str) -> Result<Self, ConfigError> {
    let config: WorkerConfig = serde_json::from_str(content)?;
    config.validate()?;
    Ok(config)
  }

  /// Read and parse a config file.
  pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    Self::from_json(&content)
  }

  /// Resolve the worker identity: the configured name, else the host name.
  pub fn worker_name(&self) -> String {
    match &self.worker_name {
      Some(name) => name.clone(),
      None => host_name(),
    }
  }

  fn validate(&self) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for remote in &self.remote_outputs {
      if !seen.insert(remote.name.as_str()) {
        return Err(ConfigError::DuplicateRemote(remote.name.clone()));
      }
    }
    Ok(())
  }
}

/// The name of this host, or `"unknown"` if it cannot be determined.
pub fn host_name() -> String {
  hostname::get()
    .map(|h| h.to_string_lossy().to_string())
    .unwrap_or_else(|_| "unknown".to_string())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_full_config() {
    let config = WorkerConfig::from_json(
      r#"{
        "worker_name": "worker-1",
        "base_output_dir": "/var/casefile/output",
        "remote_outputs": [
          { "name": "archive", "root": "/mnt/archive" }
        ]
      }"#,
    )
    .unwrap();

    assert_eq!(config.worker_name(), "worker-1");
    assert_eq!(
      config.base_output_dir,
      Some(PathBuf::from("/var/casefile/output"))
    );
    assert_eq!(config.remote_outputs.len(), 1);
    assert_eq!(config.remote_outputs[0].name, "archive");
  }

  #[test]
  fn test_parse_empty_config_uses_defaults() {
    let config = WorkerConfig::from_json("{}").unwrap();
    assert_eq!(config, WorkerConfig::default());
    assert!(!config.worker_name().is_empty());
  }

  #[test]
  fn test_duplicate_remote_rejected() {
    let result = WorkerConfig::from_json(
      r#"{ "remote_outputs": [
        { "name": "a", "root": "/one" },
        { "name": "a", "root": "/two" }
      ] }"#,
    );
    assert!(matches!(result, Err(ConfigError::DuplicateRemote(name)) if name == "a"));
  }

  #[test]
  fn test_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("worker.json");
    std::fs::write(&path, r#"{ "worker_name": "from-file" }"#).unwrap();

    let config = WorkerConfig::from_file(&path).unwrap();
    assert_eq!(config.worker_name(), "from-file");
  }

  #[test]
  fn test_from_missing_file() {
    let result = WorkerConfig::from_file("/nonexistent/worker.json");
    assert!(matches!(result, Err(ConfigError::Read { .. })));
  }
}

use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use futures::StreamExt;
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use tracing::debug;

use crate::{ArtifactStore, ByteStream, StoreError};

/// Errors raised while duplicating an artifact to a writer's destination.
///
/// Fan-out treats these as per-writer warnings; they never abort sibling
/// writers or the closing of a result.
#[derive(Debug, thiserror::Error)]
pub enum WriterError {
  /// The artifact could not be opened for reading.
  #[error("writer '{writer}' failed to read {path}: {source}")]
  Read {
    writer: String,
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  /// No storage key can be derived from the path.
  #[error("writer '{writer}' cannot derive a storage key for {path}")]
  InvalidPath { writer: String, path: PathBuf },

  /// The backing store failed.
  #[error("writer '{writer}' failed to store {path}: {source}")]
  Store {
    writer: String,
    path: PathBuf,
    #[source]
    source: StoreError,
  },
}

/// The local writer: identifies the task's working directory.
///
/// Artifacts already live in this directory, so the local writer is the one
/// member of a writer set that fan-out skips.
#[derive(Debug, Clone, Default)]
pub struct LocalWriter {
  output_dir: Option<PathBuf>,
}

impl LocalWriter {
  pub fn new(output_dir: impl Into<PathBuf>) -> Self {
    Self {
      output_dir: Some(output_dir.into()),
    }
  }

  /// A local writer whose directory was never configured.
  pub fn unset() -> Self {
    Self { output_dir: None }
  }

  pub fn output_dir(&self) -> Option<&Path> {
    self.output_dir.as_deref()
  }
}

/// Key directory for artifacts that live outside the task's output
/// directory. Reserved: an artifact inside the output directory under a
/// top-level directory of this name is rejected.
pub const EXTERNAL_KEY_DIR: &str = "_external";

/// A remote writer: duplicates artifacts into an [`ArtifactStore`].
///
/// Artifacts inside the source root (the task's output directory) are
/// stored under `{prefix}/{relative path}`. Anything else is stored under
/// `{prefix}/_external/{absolute path}`, so distinct paths never share a key.
#[derive(Clone)]
pub struct RemoteWriter {
  name: String,
  prefix: String,
  source_root: Option<PathBuf>,
  store: Arc<dyn ArtifactStore>,
}

impl RemoteWriter {
  pub fn new(
    name: impl Into<String>,
    prefix: impl Into<String>,
    store: Arc<dyn ArtifactStore>,
  ) -> Self {
    Self {
      name: name.into(),
      prefix: prefix.into(),
      source_root: None,
      store,
    }
  }

  pub fn with_source_root(mut self, root: impl Into<PathBuf>) -> Self {
    self.source_root = Some(root.into());
    self
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn source_root(&self) -> Option<&Path> {
    self.source_root.as_deref()
  }

  /// Storage key for a local artifact path, or `None` if no key can be
  /// derived (no file name, `..` components, reserved directory).
  pub fn key_for(&self, path: &Path) -> Option<String> {
    path.file_name()?;

    let inside = self
      .source_root
      .as_deref()
      .and_then(|root| path.strip_prefix(root).ok());
    let (relative, external) = match inside {
      Some(relative) => (relative, false),
      None => (path, true),
    };

    let mut parts = Vec::new();
    for component in relative.components() {
      match component {
        Component::Normal(part) => parts.push(part.to_string_lossy().to_string()),
        Component::ParentDir => return None,
        Component::RootDir | Component::Prefix(_) | Component::CurDir => {}
      }
    }
    if parts.is_empty() || (!external && parts[0] == EXTERNAL_KEY_DIR) {
      return None;
    }

    if external {
      parts.insert(0, EXTERNAL_KEY_DIR.to_string());
    }
    if !self.prefix.is_empty() {
      parts.insert(0, self.prefix.clone());
    }
    Some(parts.join("/"))
  }

  async fn write(&self, path: &Path) -> Result<(), WriterError> {
    let key = self.key_for(path).ok_or_else(|| WriterError::InvalidPath {
      writer: self.name.clone(),
      path: path.to_path_buf(),
    })?;

    let file = File::open(path).await.map_err(|source| WriterError::Read {
      writer: self.name.clone(),
      path: path.to_path_buf(),
      source,
    })?;
    let data: ByteStream = Box::pin(ReaderStream::new(file).map(|r| r.map_err(StoreError::Io)));

    self
      .store
      .put(&key, data)
      .await
      .map_err(|source| WriterError::Store {
        writer: self.name.clone(),
        path: path.to_path_buf(),
        source,
      })?;

    debug!(writer = %self.name, key = %key, "artifact stored");
    Ok(())
  }
}

impl fmt::Debug for RemoteWriter {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("RemoteWriter")
      .field("name", &self.name)
      .field("prefix", &self.prefix)
      .field("source_root", &self.source_root)
      .finish_non_exhaustive()
  }
}

/// A member of a task's writer set.
#[derive(Debug, Clone)]
pub enum OutputWriter {
  Local(LocalWriter),
  Remote(RemoteWriter),
}

impl OutputWriter {
  pub const LOCAL_NAME: &'static str = "local";

  pub fn name(&self) -> &str {
    match self {
      Self::Local(_) => Self::LOCAL_NAME,
      Self::Remote(w) => w.name(),
    }
  }

  pub fn is_local(&self) -> bool {
    matches!(self, Self::Local(_))
  }

  /// Make remote keys relative to `dir`, the task's output directory.
  pub fn bind_output_dir(&mut self, dir: &Path) {
    if let Self::Remote(w) = self {
      w.source_root = Some(dir.to_path_buf());
    }
  }

  /// Persist the artifact at `path` to this writer's destination.
  ///
  /// The local variant is a no-op: the artifact is already in place.
  pub async fn write(&self, path: &Path) -> Result<(), WriterError> {
    match self {
      Self::Local(_) => Ok(()),
      Self::Remote(w) => w.write(path).await,
    }
  }
}

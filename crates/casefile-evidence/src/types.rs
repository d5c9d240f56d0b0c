use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use crate::{Evidence, EvidenceError, EvidenceKind};

fn name_from_path(path: &Path) -> String {
  path
    .file_name()
    .map(|n| n.to_string_lossy().to_string())
    .unwrap_or_else(|| path.display().to_string())
}

async fn metadata(name: &str, path: &Path) -> Result<std::fs::Metadata, EvidenceError> {
  fs::metadata(path)
    .await
    .map_err(|e| EvidenceError::preprocess(name, format!("{}: {}", path.display(), e)))
}

/// A single file.
#[derive(Debug, Clone)]
pub struct FileEvidence {
  name: String,
  local_path: Option<PathBuf>,
}

impl FileEvidence {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    let path = path.into();
    Self {
      name: name_from_path(&path),
      local_path: Some(path),
    }
  }

  /// A file known to the job manager that has no copy on this host.
  pub fn without_local_copy(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      local_path: None,
    }
  }
}

#[async_trait]
impl Evidence for FileEvidence {
  fn kind(&self) -> EvidenceKind {
    EvidenceKind::File
  }

  fn name(&self) -> &str {
    &self.name
  }

  fn local_path(&self) -> Option<&Path> {
    self.local_path.as_deref()
  }

  async fn preprocess(&self) -> Result<(), EvidenceError> {
    let Some(path) = &self.local_path else {
      return Ok(());
    };
    if !metadata(&self.name, path).await?.is_file() {
      return Err(EvidenceError::preprocess(&self.name, "not a regular file"));
    }
    Ok(())
  }
}

/// A directory tree.
#[derive(Debug, Clone)]
pub struct DirectoryEvidence {
  name: String,
  local_path: PathBuf,
}

impl DirectoryEvidence {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    let path = path.into();
    Self {
      name: name_from_path(&path),
      local_path: path,
    }
  }
}

#[async_trait]
impl Evidence for DirectoryEvidence {
  fn kind(&self) -> EvidenceKind {
    EvidenceKind::Directory
  }

  fn name(&self) -> &str {
    &self.name
  }

  fn local_path(&self) -> Option<&Path> {
    Some(&self.local_path)
  }

  async fn preprocess(&self) -> Result<(), EvidenceError> {
    if !metadata(&self.name, &self.local_path).await?.is_dir() {
      return Err(EvidenceError::preprocess(&self.name, "not a directory"));
    }
    Ok(())
  }
}

/// A raw disk image.
///
/// Preprocessing checks the image is a non-empty regular file and records
/// its size for later reporting.
#[derive(Debug)]
pub struct DiskImageEvidence {
  name: String,
  local_path: PathBuf,
  size: OnceLock<u64>,
}

impl DiskImageEvidence {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    let path = path.into();
    Self {
      name: name_from_path(&path),
      local_path: path,
      size: OnceLock::new(),
    }
  }

  /// Image size in bytes, known once preprocessing succeeded.
  pub fn size(&self) -> Option<u64> {
    self.size.get().copied()
  }
}

#[async_trait]
impl Evidence for DiskImageEvidence {
  fn kind(&self) -> EvidenceKind {
    EvidenceKind::DiskImage
  }

  fn name(&self) -> &str {
    &self.name
  }

  fn local_path(&self) -> Option<&Path> {
    Some(&self.local_path)
  }

  async fn preprocess(&self) -> Result<(), EvidenceError> {
    let meta = metadata(&self.name, &self.local_path).await?;
    if !meta.is_file() {
      return Err(EvidenceError::preprocess(&self.name, "not a regular file"));
    }
    if meta.len() == 0 {
      return Err(EvidenceError::preprocess(&self.name, "image is empty"));
    }
    let _ = self.size.set(meta.len());
    debug!(evidence = %self.name, size = meta.len(), "disk image attached");
    Ok(())
  }

  async fn postprocess(&self) -> Result<(), EvidenceError> {
    debug!(evidence = %self.name, "disk image released");
    Ok(())
  }
}

/// A text artifact produced by a task.
#[derive(Debug, Clone)]
pub struct ReportEvidence {
  name: String,
  local_path: PathBuf,
}

impl ReportEvidence {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    let path = path.into();
    Self {
      name: name_from_path(&path),
      local_path: path,
    }
  }
}

#[async_trait]
impl Evidence for ReportEvidence {
  fn kind(&self) -> EvidenceKind {
    EvidenceKind::Report
  }

  fn name(&self) -> &str {
    &self.name
  }

  fn local_path(&self) -> Option<&Path> {
    Some(&self.local_path)
  }
}

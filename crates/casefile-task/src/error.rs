//! Task and result errors.

use std::backtrace::Backtrace;
use std::error::Error as _;
use std::path::PathBuf;

use casefile_evidence::EvidenceError;
use serde::{Deserialize, Serialize};

use crate::runner::TaskState;

/// Errors raised by operations on a [`TaskResult`](crate::TaskResult).
#[derive(Debug, thiserror::Error)]
pub enum ResultError {
  /// The writer factory produced no writers.
  #[error("no output writers configured")]
  NoWriters,

  /// The writer set has no local writer.
  #[error("no local output writer configured")]
  NoLocalWriter,

  /// The local writer has no output directory.
  #[error("local output writer has no output directory set")]
  LocalDirUnset,

  /// The output directory could not be created.
  #[error("failed to create output directory {path}: {source}")]
  CreateOutputDir {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  /// `close` was called on a closed result.
  #[error("result is already closed")]
  AlreadyClosed,

  /// An artifact operation was attempted after the writers were released.
  #[error("result is closed, output writers have been released")]
  Closed,
}

impl ResultError {
  /// Whether this error stems from a missing or broken writer configuration.
  pub fn is_configuration(&self) -> bool {
    matches!(
      self,
      Self::NoWriters | Self::NoLocalWriter | Self::LocalDirUnset | Self::CreateOutputDir { .. }
    )
  }
}

/// Errors that can occur while setting up or running a task.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
  /// The result could not be built or was misused.
  #[error(transparent)]
  Result(#[from] ResultError),

  /// The evidence declares a local path that is absent on this host.
  #[error("evidence local path {} does not exist", .path.display())]
  EvidenceNotFound { path: PathBuf },

  /// An evidence lifecycle hook failed.
  #[error(transparent)]
  Evidence(#[from] EvidenceError),

  /// Task logic failed.
  #[error("{message}")]
  Execution { message: String },

  /// Task logic hit an I/O error.
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  /// Setup or run panicked.
  #[error("task panicked: {message}")]
  Panicked { message: String },

  /// A lifecycle step was invoked out of order.
  #[error("task is {actual:?}, expected {expected:?}")]
  InvalidState {
    expected: TaskState,
    actual: TaskState,
  },
}

impl TaskError {
  /// Create an execution error.
  pub fn execution(message: impl Into<String>) -> Self {
    Self::Execution {
      message: message.into(),
    }
  }

  pub fn kind(&self) -> FailureKind {
    match self {
      Self::Result(e) if e.is_configuration() => FailureKind::Configuration,
      Self::Result(_) | Self::InvalidState { .. } => FailureKind::InvalidState,
      Self::EvidenceNotFound { .. } => FailureKind::EvidenceNotFound,
      Self::Evidence(EvidenceError::Preprocess { .. }) => FailureKind::Preprocess,
      Self::Evidence(EvidenceError::Postprocess { .. }) => FailureKind::Postprocess,
      Self::Execution { .. } | Self::Io(_) => FailureKind::Execution,
      Self::Panicked { .. } => FailureKind::Panic,
    }
  }
}

/// Category of a task failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
  Configuration,
  EvidenceNotFound,
  Preprocess,
  Postprocess,
  Execution,
  Panic,
  InvalidState,
}

/// Structured failure detail attached to a failed result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
  pub kind: FailureKind,
  pub message: String,
  pub traceback: String,
}

impl ErrorDetail {
  pub fn new(kind: FailureKind, message: impl Into<String>, traceback: impl Into<String>) -> Self {
    Self {
      kind,
      message: message.into(),
      traceback: traceback.into(),
    }
  }

  /// Build the detail for `err`: its source chain followed by the backtrace
  /// at the point of capture.
  pub fn from_error(err: &TaskError) -> Self {
    let mut traceback = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
      traceback.push_str(&format!("\ncaused by: {}", cause));
      source = cause.source();
    }
    traceback.push_str(&format!("\n\nbacktrace:\n{}", Backtrace::force_capture()));

    Self {
      kind: err.kind(),
      message: err.to_string(),
      traceback,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_kind_mapping() {
    assert_eq!(
      TaskError::from(ResultError::NoWriters).kind(),
      FailureKind::Configuration
    );
    assert_eq!(
      TaskError::from(ResultError::AlreadyClosed).kind(),
      FailureKind::InvalidState
    );
    assert_eq!(
      TaskError::from(EvidenceError::preprocess("disk", "mount failed")).kind(),
      FailureKind::Preprocess
    );
    assert_eq!(TaskError::execution("boom").kind(), FailureKind::Execution);
  }

  #[test]
  fn test_detail_includes_source_chain() {
    let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
    let err = TaskError::from(ResultError::CreateOutputDir {
      path: PathBuf::from("/out"),
      source: io,
    });

    let detail = ErrorDetail::from_error(&err);
    assert_eq!(detail.kind, FailureKind::Configuration);
    assert!(detail.message.contains("/out"));
    assert!(detail.traceback.contains("caused by: denied"));
    assert!(detail.traceback.contains("backtrace:"));
  }

  #[test]
  fn test_evidence_not_found_message() {
    let err = TaskError::EvidenceNotFound {
      path: PathBuf::from("/missing/disk.raw"),
    };
    assert_eq!(
      err.to_string(),
      "evidence local path /missing/disk.raw does not exist"
    );
  }
}

//! Casefile Evidence
//!
//! Evidence is the unit of data a task consumes or produces: a disk image,
//! a file, a directory, a report written by a previous task.
//!
//! The [`Evidence`] trait is the contract the task lifecycle relies on. It
//! exposes an optional local path and two lifecycle hooks:
//! - `preprocess` runs once before task logic (validate, mount, extract)
//! - `postprocess` runs once when the task result closes, success or not
//!
//! Evidence instances are created upstream and may outlive any single task,
//! so tasks only ever borrow them.

mod error;
mod types;

pub use error::EvidenceError;
pub use types::{DirectoryEvidence, DiskImageEvidence, FileEvidence, ReportEvidence};

use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// The variant of a piece of evidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceKind {
  DiskImage,
  File,
  Directory,
  Report,
}

/// Serializable description of a piece of evidence, used in result records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceDescriptor {
  pub kind: EvidenceKind,
  pub name: String,
  pub local_path: Option<String>,
}

/// Evidence capability.
///
/// Both hooks default to no-ops. `postprocess` must be safe to call even if
/// `preprocess` never ran or failed part way.
#[async_trait]
pub trait Evidence: Send + Sync + fmt::Debug {
  /// The evidence variant.
  fn kind(&self) -> EvidenceKind;

  /// Human-readable name.
  fn name(&self) -> &str;

  /// Path of the local copy, if one exists on this host.
  fn local_path(&self) -> Option<&Path>;

  /// Prepare the evidence before a task runs against it.
  async fn preprocess(&self) -> Result<(), EvidenceError> {
    Ok(())
  }

  /// Release whatever `preprocess` acquired.
  async fn postprocess(&self) -> Result<(), EvidenceError> {
    Ok(())
  }

  fn descriptor(&self) -> EvidenceDescriptor {
    EvidenceDescriptor {
      kind: self.kind(),
      name: self.name().to_string(),
      local_path: self.local_path().map(|p| p.display().to_string()),
    }
  }
}

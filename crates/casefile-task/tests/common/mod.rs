//! Shared fixtures for casefile-task integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use casefile_evidence::{Evidence, EvidenceError, EvidenceKind};
use casefile_output::{
  ArtifactStore, ByteStream, LocalWriter, OutputWriter, RemoteWriter, StoreError, WriterContext,
  WriterFactory,
};
use futures::StreamExt;

/// Store that records every key it receives.
#[derive(Default)]
pub struct RecordingStore {
  keys: Mutex<Vec<String>>,
}

impl RecordingStore {
  pub fn keys(&self) -> Vec<String> {
    self.keys.lock().unwrap().clone()
  }

  pub fn count(&self, suffix: &str) -> usize {
    self.keys().iter().filter(|k| k.ends_with(suffix)).count()
  }
}

#[async_trait]
impl ArtifactStore for RecordingStore {
  async fn put(&self, key: &str, mut data: ByteStream) -> Result<(), StoreError> {
    while let Some(chunk) = data.next().await {
      chunk?;
    }
    self.keys.lock().unwrap().push(key.to_string());
    Ok(())
  }
}

/// Store that rejects every artifact.
pub struct FailingStore;

#[async_trait]
impl ArtifactStore for FailingStore {
  async fn put(&self, key: &str, _data: ByteStream) -> Result<(), StoreError> {
    Err(StoreError::Rejected {
      key: key.to_string(),
      message: "backend unavailable".to_string(),
    })
  }
}

/// Factory with a local writer under `base` plus the given remotes.
pub fn factory(
  base: &Path,
  remotes: Vec<(&'static str, Arc<dyn ArtifactStore>)>,
) -> Arc<dyn WriterFactory> {
  let base = base.to_path_buf();
  Arc::new(move |ctx: &WriterContext| {
    let root = ctx.base_output_dir.clone().unwrap_or_else(|| base.clone());
    let mut writers = vec![OutputWriter::Local(LocalWriter::new(
      root.join(ctx.dir_name()),
    ))];
    for (name, store) in &remotes {
      writers.push(OutputWriter::Remote(RemoteWriter::new(
        *name,
        ctx.task_id.clone(),
        Arc::clone(store),
      )));
    }
    writers
  })
}

/// Evidence that counts lifecycle hook invocations.
#[derive(Debug, Default)]
pub struct TrackedEvidence {
  pub path: Option<PathBuf>,
  pub fail_preprocess: bool,
  pub fail_postprocess: bool,
  pub preprocessed: AtomicUsize,
  pub postprocessed: AtomicUsize,
}

impl TrackedEvidence {
  pub fn at(path: impl Into<PathBuf>) -> Self {
    Self {
      path: Some(path.into()),
      ..Default::default()
    }
  }

  pub fn preprocess_count(&self) -> usize {
    self.preprocessed.load(Ordering::SeqCst)
  }

  pub fn postprocess_count(&self) -> usize {
    self.postprocessed.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl Evidence for TrackedEvidence {
  fn kind(&self) -> EvidenceKind {
    EvidenceKind::File
  }

  fn name(&self) -> &str {
    "tracked"
  }

  fn local_path(&self) -> Option<&Path> {
    self.path.as_deref()
  }

  async fn preprocess(&self) -> Result<(), EvidenceError> {
    self.preprocessed.fetch_add(1, Ordering::SeqCst);
    if self.fail_preprocess {
      return Err(EvidenceError::preprocess("tracked", "mount failed"));
    }
    Ok(())
  }

  async fn postprocess(&self) -> Result<(), EvidenceError> {
    self.postprocessed.fetch_add(1, Ordering::SeqCst);
    if self.fail_postprocess {
      return Err(EvidenceError::postprocess("tracked", "unmount failed"));
    }
    Ok(())
  }
}

/// Write a small evidence file into `dir`.
pub fn evidence_file(dir: &Path) -> PathBuf {
  let path = dir.join("evidence.bin");
  std::fs::write(&path, b"evidence").unwrap();
  path
}

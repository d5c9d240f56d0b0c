use std::path::PathBuf;
use std::sync::Arc;

use casefile_config::WorkerConfig;

use crate::{ArtifactStore, FsStore, LocalWriter, OutputWriter, RemoteWriter};

/// What a factory knows about the task it builds writers for.
#[derive(Debug, Clone)]
pub struct WriterContext {
  pub task_id: String,
  pub task_name: String,
  /// Task-level override of the worker's base output directory.
  pub base_output_dir: Option<PathBuf>,
}

impl WriterContext {
  /// Name of the task's output directory: `{task_name}-{task_id}`.
  ///
  /// Path separators in the task name are replaced with `_`, so the
  /// directory is always a direct child of the base directory.
  pub fn dir_name(&self) -> String {
    let name: String = self
      .task_name
      .chars()
      .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
      .collect();
    format!("{}-{}", name, self.task_id)
  }
}

/// Produces the writer set for one task execution.
///
/// Any `Fn(&WriterContext) -> Vec<OutputWriter>` closure is a factory.
pub trait WriterFactory: Send + Sync {
  fn writers(&self, ctx: &WriterContext) -> Vec<OutputWriter>;
}

impl<F> WriterFactory for F
where
  F: Fn(&WriterContext) -> Vec<OutputWriter> + Send + Sync,
{
  fn writers(&self, ctx: &WriterContext) -> Vec<OutputWriter> {
    self(ctx)
  }
}

/// Writer factory driven by the worker configuration.
///
/// The local directory is `{base_output_dir}/{task_name}-{task_id}`, unique
/// per task. Remote stores are created once and shared by every writer set.
pub struct ConfiguredWriterFactory {
  base_output_dir: Option<PathBuf>,
  remotes: Vec<(String, Arc<dyn ArtifactStore>)>,
}

impl ConfiguredWriterFactory {
  pub fn new(config: &WorkerConfig) -> Self {
    let remotes = config
      .remote_outputs
      .iter()
      .map(|r| {
        let store: Arc<dyn ArtifactStore> = Arc::new(FsStore::new(&r.root));
        (r.name.clone(), store)
      })
      .collect();

    Self {
      base_output_dir: config.base_output_dir.clone(),
      remotes,
    }
  }

  /// Register an additional remote destination.
  pub fn with_remote(mut self, name: impl Into<String>, store: Arc<dyn ArtifactStore>) -> Self {
    self.remotes.push((name.into(), store));
    self
  }
}

impl WriterFactory for ConfiguredWriterFactory {
  fn writers(&self, ctx: &WriterContext) -> Vec<OutputWriter> {
    let local = ctx
      .base_output_dir
      .as_ref()
      .or(self.base_output_dir.as_ref())
      .map(|base| LocalWriter::new(base.join(ctx.dir_name())))
      .unwrap_or_else(LocalWriter::unset);

    let mut writers = vec![OutputWriter::Local(local)];
    writers.extend(self.remotes.iter().map(|(name, store)| {
      OutputWriter::Remote(RemoteWriter::new(
        name.clone(),
        ctx.task_id.clone(),
        Arc::clone(store),
      ))
    }));
    writers
  }
}

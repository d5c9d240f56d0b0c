//! Task trait and the execution state machine around it.

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use casefile_evidence::Evidence;
use casefile_output::WriterFactory;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{error, info, instrument, warn};

use crate::error::{ErrorDetail, TaskError};
use crate::result::{ResultParams, TaskResult};
use crate::sink::{LogSink, TracingSink};

/// Process-unique task identifier, rendered as 32 hex characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(uuid::Uuid);

impl TaskId {
  pub fn new() -> Self {
    Self(uuid::Uuid::new_v4())
  }
}

impl Default for TaskId {
  fn default() -> Self {
    Self::new()
  }
}

impl fmt::Display for TaskId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0.simple())
  }
}

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
  Created,
  SetUp,
  Running,
  Closed { successful: bool },
}

/// The attributes of a task persisted by the job manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredTask {
  pub id: String,
  pub name: String,
}

/// Analysis logic run against a piece of evidence.
///
/// `run` is the only extension point. It records its findings on `result`
/// and should set a meaningful status; closing is optional, the runner
/// closes the result if `run` did not.
#[async_trait]
pub trait Task: Send + Sync {
  /// Human-readable label. Defaults to the implementing type's name.
  fn name(&self) -> String {
    let full = std::any::type_name::<Self>();
    full.rsplit("::").next().unwrap_or(full).to_string()
  }

  async fn run(&self, evidence: &dyn Evidence, result: &mut TaskResult) -> Result<(), TaskError>;
}

/// Drives one execution of a [`Task`]: setup, run, close.
pub struct TaskRunner<T> {
  id: TaskId,
  name: String,
  base_output_dir: Option<PathBuf>,
  output_dir: Option<PathBuf>,
  state: TaskState,
  result: Option<TaskResult>,
  /// Job manager handle for this task's state record. Not interpreted here.
  pub state_key: Option<String>,
  /// Executor-specific stub referencing the remote task. Not interpreted here.
  pub stub: Option<serde_json::Value>,
  task: T,
  writers: Arc<dyn WriterFactory>,
  sink: Arc<dyn LogSink>,
  worker_name: String,
}

impl<T: Task> TaskRunner<T> {
  /// Create a runner with a fresh id, mirroring logs to `tracing`.
  pub fn new(task: T, writers: Arc<dyn WriterFactory>) -> Self {
    Self {
      id: TaskId::new(),
      name: task.name(),
      base_output_dir: None,
      output_dir: None,
      state: TaskState::Created,
      result: None,
      state_key: None,
      stub: None,
      task,
      writers,
      sink: Arc::new(TracingSink),
      worker_name: casefile_config::host_name(),
    }
  }

  pub fn with_name(mut self, name: impl Into<String>) -> Self {
    self.name = name.into();
    self
  }

  /// Root for this task's output directory, overriding the worker's.
  pub fn with_base_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
    self.base_output_dir = Some(dir.into());
    self
  }

  pub fn with_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
    self.sink = sink;
    self
  }

  pub fn with_worker_name(mut self, worker_name: impl Into<String>) -> Self {
    self.worker_name = worker_name.into();
    self
  }

  pub fn id(&self) -> TaskId {
    self.id
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn state(&self) -> TaskState {
    self.state
  }

  pub fn base_output_dir(&self) -> Option<&Path> {
    self.base_output_dir.as_deref()
  }

  /// Set once during setup.
  pub fn output_dir(&self) -> Option<&Path> {
    self.output_dir.as_deref()
  }

  pub fn task(&self) -> &T {
    &self.task
  }

  pub fn stored(&self) -> StoredTask {
    StoredTask {
      id: self.id.to_string(),
      name: self.name.clone(),
    }
  }

  fn result_params(&self, evidence: Arc<dyn Evidence>) -> ResultParams {
    ResultParams {
      task_id: self.id.to_string(),
      task_name: self.name.clone(),
      worker_name: self.worker_name.clone(),
      base_output_dir: self.base_output_dir.clone(),
      input_evidence: Some(evidence),
      evidence: Vec::new(),
    }
  }

  fn expect_state(&self, expected: TaskState) -> Result<(), TaskError> {
    if self.state != expected {
      return Err(TaskError::InvalidState {
        expected,
        actual: self.state,
      });
    }
    Ok(())
  }

  /// Build the result and prepare the evidence.
  ///
  /// The result is kept even when the evidence check or preprocessing
  /// fails, so the failure can be reported on it.
  pub async fn setup(
    &mut self,
    evidence: Arc<dyn Evidence>,
  ) -> Result<&mut TaskResult, TaskError> {
    self.expect_state(TaskState::Created)?;

    let params = self.result_params(Arc::clone(&evidence));
    let result = TaskResult::new(params, self.writers.as_ref(), Arc::clone(&self.sink)).await?;
    self.output_dir = result.output_dir().map(Path::to_path_buf);
    self.state = TaskState::SetUp;
    let result = self.result.insert(result);

    if let Some(path) = evidence.local_path()
      && !fs::try_exists(path).await.unwrap_or(false)
    {
      return Err(TaskError::EvidenceNotFound {
        path: path.to_path_buf(),
      });
    }
    evidence.preprocess().await?;

    Ok(result)
  }

  /// Run the task logic against the result built by [`setup`](Self::setup).
  pub async fn run(&mut self, evidence: &dyn Evidence) -> Result<(), TaskError> {
    self.expect_state(TaskState::SetUp)?;
    let Some(result) = self.result.as_mut() else {
      return Err(TaskError::InvalidState {
        expected: TaskState::SetUp,
        actual: self.state,
      });
    };

    self.state = TaskState::Running;
    self.task.run(evidence, result).await
  }

  async fn setup_and_run(&mut self, evidence: &Arc<dyn Evidence>) -> Result<(), TaskError> {
    self.setup(Arc::clone(evidence)).await?;
    self.run(evidence.as_ref()).await
  }

  /// Set up and run the task, always returning a closed result.
  ///
  /// Errors and panics from setup or run never reach the caller. They are
  /// converted into a failed result whose error detail carries the message
  /// and trace.
  #[instrument(
    name = "task_run",
    skip(self, evidence),
    fields(task_id = %self.id, task_name = %self.name)
  )]
  pub async fn run_wrapper(&mut self, evidence: Arc<dyn Evidence>) -> TaskResult {
    info!(evidence = %evidence.name(), "task started");

    let outcome = AssertUnwindSafe(self.setup_and_run(&evidence))
      .catch_unwind()
      .await;
    let failure = match outcome {
      Ok(Ok(())) => None,
      Ok(Err(e)) => Some(e),
      Err(panic) => Some(TaskError::Panicked {
        message: panic_message(panic.as_ref()),
      }),
    };

    let mut result = match self.result.take() {
      Some(result) => result,
      None => TaskResult::detached(self.result_params(evidence), Arc::clone(&self.sink)),
    };

    match failure {
      None => {
        if !result.is_closed()
          && let Err(e) = result.close(true, None).await
        {
          error!(error = %e, "failed to close result");
        }
      }
      Some(e) => fail(&mut result, e).await,
    }

    let successful = result.successful().unwrap_or(false);
    // a rejected re-run leaves the first execution's state in place
    if !matches!(self.state, TaskState::Closed { .. }) {
      self.state = TaskState::Closed { successful };
    }
    info!(
      successful,
      status = result.status().unwrap_or_default(),
      "task finished"
    );
    result
  }
}

/// Record `err` on `result` and close it as failed.
///
/// The detail is logged before closing so the persisted log carries it. A
/// result the task already closed is marked failed without closing again.
async fn fail(result: &mut TaskResult, err: TaskError) {
  let detail = ErrorDetail::from_error(&err);
  let status = format!("Task failed with exception: [{}]", err);
  error!(error = %err, "task failed");

  if result.is_closed() {
    warn!(error = %err, "task failed after closing its result");
    result.fail_closed(detail, status);
    return;
  }

  for line in detail.traceback.lines() {
    result.log(line);
  }
  if let Err(e) = result.set_error_detail(detail) {
    error!(error = %e, "failed to record error detail");
  }
  if let Err(e) = result.close(false, Some(status)).await {
    error!(error = %e, "failed to close result");
  }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
  if let Some(s) = panic.downcast_ref::<&str>() {
    (*s).to_string()
  } else if let Some(s) = panic.downcast_ref::<String>() {
    s.clone()
  } else {
    "unknown panic".to_string()
  }
}

//! Task result: status, timing, produced evidence, log and error detail of
//! one task execution.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use casefile_evidence::{Evidence, EvidenceDescriptor};
use casefile_output::{OutputWriter, WriterContext, WriterFactory};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, warn};

use crate::error::{ErrorDetail, FailureKind, ResultError};
use crate::sink::LogSink;

/// Name of the log artifact written into the output directory on close.
pub const LOG_FILE_NAME: &str = "worker-log.txt";

/// Inputs for building a [`TaskResult`].
#[derive(Debug, Default)]
pub struct ResultParams {
  pub task_id: String,
  pub task_name: String,
  pub worker_name: String,
  pub base_output_dir: Option<PathBuf>,
  pub input_evidence: Option<Arc<dyn Evidence>>,
  /// Produced evidence to seed the result with.
  pub evidence: Vec<Box<dyn Evidence>>,
}

/// Outcome of fanning one artifact out to the remote writers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FanOutReport {
  /// Writers that stored the artifact.
  pub written: Vec<String>,
  /// Writers that failed, with the failure message.
  pub failed: Vec<(String, String)>,
}

/// Full serializable view of a result, handed to the job manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResultRecord {
  pub task_id: String,
  pub task_name: String,
  pub worker_name: String,
  pub successful: bool,
  pub status: String,
  pub error: Option<ErrorDetail>,
  pub run_time: Option<Duration>,
  pub start_time: DateTime<Utc>,
  pub evidence: Vec<EvidenceDescriptor>,
  pub input_evidence: Option<EvidenceDescriptor>,
  pub output_dir: Option<PathBuf>,
  pub warnings: Vec<String>,
}

/// The minimal durable projection of a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredResult {
  pub status: Option<String>,
  pub successful: Option<bool>,
}

/// The outcome of one task execution.
///
/// A result is closed exactly once. Closing releases the writer set, after
/// which the result holds no live resource handles and artifact operations
/// fail with [`ResultError::Closed`].
pub struct TaskResult {
  task_id: String,
  task_name: String,
  worker_name: String,
  start_time: DateTime<Utc>,
  started: Instant,
  run_time: Option<Duration>,
  status: Option<String>,
  successful: Option<bool>,
  error: Option<ErrorDetail>,
  evidence: Vec<Box<dyn Evidence>>,
  input_evidence: Option<Arc<dyn Evidence>>,
  log: Vec<String>,
  output_dir: Option<PathBuf>,
  writers: Option<Vec<OutputWriter>>,
  warnings: Vec<String>,
  closed: bool,
  sink: Arc<dyn LogSink>,
}

impl TaskResult {
  /// Build a result whose writers come from `factory`.
  ///
  /// The output directory is taken from the local writer and created if
  /// missing. Remote writers store artifacts under keys relative to it.
  pub async fn new(
    params: ResultParams,
    factory: &dyn WriterFactory,
    sink: Arc<dyn LogSink>,
  ) -> Result<Self, ResultError> {
    let ctx = WriterContext {
      task_id: params.task_id.clone(),
      task_name: params.task_name.clone(),
      base_output_dir: params.base_output_dir.clone(),
    };
    let mut writers = factory.writers(&ctx);
    let output_dir = local_output_dir(&writers)?.to_path_buf();
    for writer in &mut writers {
      writer.bind_output_dir(&output_dir);
    }

    fs::create_dir_all(&output_dir)
      .await
      .map_err(|source| ResultError::CreateOutputDir {
        path: output_dir.clone(),
        source,
      })?;

    let mut result = Self::detached(params, sink);
    result.output_dir = Some(output_dir);
    result.writers = Some(writers);
    Ok(result)
  }

  /// Build a result without writers or output directory.
  ///
  /// Used when a regular result cannot be built, so a failure can still be
  /// reported. Closing it persists nothing.
  pub fn detached(params: ResultParams, sink: Arc<dyn LogSink>) -> Self {
    Self {
      task_id: params.task_id,
      task_name: params.task_name,
      worker_name: params.worker_name,
      start_time: Utc::now(),
      started: Instant::now(),
      run_time: None,
      status: None,
      successful: None,
      error: None,
      evidence: params.evidence,
      input_evidence: params.input_evidence,
      log: Vec::new(),
      output_dir: None,
      writers: None,
      warnings: Vec::new(),
      closed: false,
      sink,
    }
  }

  pub fn task_id(&self) -> &str {
    &self.task_id
  }

  pub fn task_name(&self) -> &str {
    &self.task_name
  }

  pub fn worker_name(&self) -> &str {
    &self.worker_name
  }

  pub fn start_time(&self) -> DateTime<Utc> {
    self.start_time
  }

  pub fn run_time(&self) -> Option<Duration> {
    self.run_time
  }

  pub fn status(&self) -> Option<&str> {
    self.status.as_deref()
  }

  pub fn set_status(&mut self, status: impl Into<String>) {
    self.status = Some(status.into());
  }

  /// `None` until the result is closed.
  pub fn successful(&self) -> Option<bool> {
    self.successful
  }

  pub fn error(&self) -> Option<&ErrorDetail> {
    self.error.as_ref()
  }

  pub fn evidence(&self) -> &[Box<dyn Evidence>] {
    &self.evidence
  }

  pub fn input_evidence(&self) -> Option<&Arc<dyn Evidence>> {
    self.input_evidence.as_ref()
  }

  pub fn log_messages(&self) -> &[String] {
    &self.log
  }

  pub fn output_dir(&self) -> Option<&Path> {
    self.output_dir.as_deref()
  }

  /// Non-fatal problems met while closing (writer failures, postprocessing).
  pub fn warnings(&self) -> &[String] {
    &self.warnings
  }

  pub fn is_closed(&self) -> bool {
    self.closed
  }

  /// Append a message to the log and mirror it to the diagnostic sink.
  pub fn log(&mut self, message: impl Into<String>) {
    let message = message.into();
    self.sink.log(&self.task_id, &message);
    self.log.push(message);
  }

  /// Append a produced piece of evidence.
  pub fn add_evidence(&mut self, evidence: Box<dyn Evidence>) {
    self.evidence.push(evidence);
  }

  /// Record failure detail. A later call replaces an earlier one.
  ///
  /// Only allowed before close: a closed result's outcome is final.
  pub fn set_error(
    &mut self,
    message: impl Into<String>,
    traceback: impl Into<String>,
  ) -> Result<(), ResultError> {
    self.set_error_detail(ErrorDetail::new(FailureKind::Execution, message, traceback))
  }

  pub fn set_error_detail(&mut self, detail: ErrorDetail) -> Result<(), ResultError> {
    if self.closed {
      return Err(ResultError::Closed);
    }
    self.error = Some(detail);
    Ok(())
  }

  /// Turn a closed result into a failure after the fact.
  ///
  /// Used when the task faults after closing the result itself. The close
  /// steps are not repeated.
  pub(crate) fn fail_closed(&mut self, detail: ErrorDetail, status: String) {
    self.successful = Some(false);
    self.error = Some(detail);
    self.status = Some(status);
  }

  /// Duplicate the artifact at `path` to every writer except the local one.
  ///
  /// A failing writer is recorded as a warning and does not stop the
  /// remaining writers.
  pub async fn save_local_file(&mut self, path: &Path) -> Result<FanOutReport, ResultError> {
    let writers = self.writers.as_deref().ok_or(ResultError::Closed)?;
    Ok(fan_out(writers, path, &self.task_id, &mut self.warnings).await)
  }

  /// Close the result. Must be called exactly once.
  ///
  /// When `status` is absent a default embedding the run time and worker
  /// name is used. A result carrying error detail never closes as
  /// successful.
  pub async fn close(&mut self, success: bool, status: Option<String>) -> Result<(), ResultError> {
    if self.closed {
      return Err(ResultError::AlreadyClosed);
    }

    let success = match (&self.error, success) {
      (Some(detail), true) => {
        warn!(
          task_id = %self.task_id,
          error = %detail.message,
          "closing result with error detail as failed"
        );
        false
      }
      _ => success,
    };
    let run_time = self.started.elapsed();
    self.successful = Some(success);
    self.run_time = Some(run_time);

    let status = status.unwrap_or_else(|| match (&self.error, success) {
      (Some(detail), _) => format!("Task failed: {}", detail.message),
      (None, true) => format!(
        "Completed successfully in {} on {}",
        format_run_time(run_time),
        self.worker_name
      ),
      (None, false) => format!(
        "Task failed after {} on {}",
        format_run_time(run_time),
        self.worker_name
      ),
    });
    self.log(status.clone());

    let log_path = self.persist_log().await;
    if let Some(writers) = self.writers.as_deref() {
      let produced = self.evidence.iter().filter_map(|e| e.local_path());
      for path in log_path.as_deref().into_iter().chain(produced) {
        fan_out(writers, path, &self.task_id, &mut self.warnings).await;
      }
    }

    if let Some(input) = &self.input_evidence
      && let Err(e) = input.postprocess().await
    {
      warn!(task_id = %self.task_id, error = %e, "evidence postprocessing failed");
      self.warnings.push(e.to_string());
    }

    self.writers = None;
    self.status = Some(status);
    self.closed = true;
    debug!(task_id = %self.task_id, successful = success, "result closed");
    Ok(())
  }

  /// Write the log to the output directory, if there is one.
  async fn persist_log(&mut self) -> Option<PathBuf> {
    let dir = self.output_dir.as_ref()?;
    if !fs::try_exists(dir).await.unwrap_or(false) {
      return None;
    }

    let path = dir.join(LOG_FILE_NAME);
    let mut content = self.log.join("\n");
    content.push('\n');

    match fs::write(&path, content).await {
      Ok(()) => Some(path),
      Err(e) => {
        warn!(task_id = %self.task_id, error = %e, "failed to write log artifact");
        self
          .warnings
          .push(format!("failed to write {}: {}", path.display(), e));
        None
      }
    }
  }

  pub fn to_record(&self) -> TaskResultRecord {
    TaskResultRecord {
      task_id: self.task_id.clone(),
      task_name: self.task_name.clone(),
      worker_name: self.worker_name.clone(),
      successful: self.successful.unwrap_or(false),
      status: self.status.clone().unwrap_or_default(),
      error: self.error.clone(),
      run_time: self.run_time,
      start_time: self.start_time,
      evidence: self.evidence.iter().map(|e| e.descriptor()).collect(),
      input_evidence: self.input_evidence.as_ref().map(|e| e.descriptor()),
      output_dir: self.output_dir.clone(),
      warnings: self.warnings.clone(),
    }
  }

  pub fn stored(&self) -> StoredResult {
    StoredResult {
      status: self.status.clone(),
      successful: self.successful,
    }
  }
}

impl std::fmt::Debug for TaskResult {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("TaskResult")
      .field("task_id", &self.task_id)
      .field("task_name", &self.task_name)
      .field("status", &self.status)
      .field("successful", &self.successful)
      .field("closed", &self.closed)
      .finish_non_exhaustive()
  }
}

/// Write `path` to every remote writer, recording failures in `warnings`.
async fn fan_out(
  writers: &[OutputWriter],
  path: &Path,
  task_id: &str,
  warnings: &mut Vec<String>,
) -> FanOutReport {
  let mut report = FanOutReport::default();

  for writer in writers.iter().filter(|w| !w.is_local()) {
    match writer.write(path).await {
      Ok(()) => report.written.push(writer.name().to_string()),
      Err(e) => {
        warn!(
          task_id = %task_id,
          writer = %writer.name(),
          error = %e,
          "output writer failed"
        );
        warnings.push(e.to_string());
        report.failed.push((writer.name().to_string(), e.to_string()));
      }
    }
  }

  report
}

fn local_output_dir(writers: &[OutputWriter]) -> Result<&Path, ResultError> {
  if writers.is_empty() {
    return Err(ResultError::NoWriters);
  }

  let local = writers
    .iter()
    .find_map(|w| match w {
      OutputWriter::Local(local) => Some(local),
      OutputWriter::Remote(_) => None,
    })
    .ok_or(ResultError::NoLocalWriter)?;

  local.output_dir().ok_or(ResultError::LocalDirUnset)
}

/// Render a run time as `H:MM:SS.ffffff`.
pub fn format_run_time(run_time: Duration) -> String {
  let secs = run_time.as_secs();
  format!(
    "{}:{:02}:{:02}.{:06}",
    secs / 3600,
    (secs / 60) % 60,
    secs % 60,
    run_time.subsec_micros()
  )
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::sink::NoopSink;
  use casefile_output::LocalWriter;

  fn params(id: &str) -> ResultParams {
    ResultParams {
      task_id: id.to_string(),
      task_name: "TestTask".to_string(),
      worker_name: "worker-1".to_string(),
      ..Default::default()
    }
  }

  #[test]
  fn test_format_run_time() {
    assert_eq!(format_run_time(Duration::from_micros(1_500_000)), "0:00:01.500000");
    assert_eq!(format_run_time(Duration::from_secs(3_725)), "1:02:05.000000");
  }

  #[tokio::test]
  async fn test_no_writers() {
    let factory = |_: &WriterContext| Vec::<OutputWriter>::new();
    let result = TaskResult::new(params("t"), &factory, Arc::new(NoopSink)).await;
    assert!(matches!(result, Err(ResultError::NoWriters)));
  }

  #[tokio::test]
  async fn test_local_dir_unset() {
    let factory = |_: &WriterContext| vec![OutputWriter::Local(LocalWriter::unset())];
    let result = TaskResult::new(params("t"), &factory, Arc::new(NoopSink)).await;
    assert!(matches!(result, Err(ResultError::LocalDirUnset)));
  }

  #[tokio::test]
  async fn test_creates_output_dir() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("nested").join("task");
    let target = out.clone();
    let factory = move |_: &WriterContext| vec![OutputWriter::Local(LocalWriter::new(&target))];

    let result = TaskResult::new(params("t"), &factory, Arc::new(NoopSink))
      .await
      .unwrap();
    assert_eq!(result.output_dir(), Some(out.as_path()));
    assert!(out.is_dir());
  }

  #[tokio::test]
  async fn test_set_error_last_call_wins() {
    let mut result = TaskResult::detached(params("t"), Arc::new(NoopSink));
    result.set_error("first", "trace-1").unwrap();
    result.set_error("second", "trace-2").unwrap();

    let error = result.error().unwrap();
    assert_eq!(error.message, "second");
    assert_eq!(error.traceback, "trace-2");
  }

  #[tokio::test]
  async fn test_close_with_error_is_failure() {
    let mut result = TaskResult::detached(params("t"), Arc::new(NoopSink));
    result.set_error("disk unreadable", "trace").unwrap();
    result.close(true, None).await.unwrap();

    assert_eq!(result.successful(), Some(false));
    assert_eq!(result.status(), Some("Task failed: disk unreadable"));
  }

  #[tokio::test]
  async fn test_set_error_after_close_rejected() {
    let mut result = TaskResult::detached(params("t"), Arc::new(NoopSink));
    result.close(true, None).await.unwrap();

    assert!(matches!(
      result.set_error("late", "trace"),
      Err(ResultError::Closed)
    ));
    assert_eq!(result.successful(), Some(true));
    assert!(result.error().is_none());
  }

  #[tokio::test]
  async fn test_fail_closed_keeps_error_on_failure_only() {
    let mut result = TaskResult::detached(params("t"), Arc::new(NoopSink));
    result.close(true, Some("done".to_string())).await.unwrap();
    result.fail_closed(
      ErrorDetail::new(FailureKind::Execution, "late", "trace"),
      "Task failed with exception: [late]".to_string(),
    );

    assert_eq!(result.successful(), Some(false));
    assert_eq!(result.error().unwrap().message, "late");
    assert_eq!(result.status(), Some("Task failed with exception: [late]"));
  }

  #[tokio::test]
  async fn test_detached_close_persists_nothing() {
    let mut result = TaskResult::detached(params("t"), Arc::new(NoopSink));
    result.log("hello");
    result.close(false, Some("failed".to_string())).await.unwrap();

    assert!(result.is_closed());
    assert_eq!(result.stored().status.as_deref(), Some("failed"));
    assert_eq!(result.log_messages(), ["hello", "failed"]);
    assert!(matches!(
      result.save_local_file(Path::new("/tmp/x")).await,
      Err(ResultError::Closed)
    ));
  }
}

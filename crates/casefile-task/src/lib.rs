//! Casefile Task
//!
//! This crate provides the worker-side task lifecycle: a [`Task`] consumes a
//! piece of evidence, runs analysis logic, and always hands back a closed,
//! serializable [`TaskResult`], even when the task fails or panics.
//!
//! # Lifecycle
//!
//! ```text
//! Created ──setup──▶ SetUp ──run──▶ Running ──close──▶ Closed(success | failure)
//!    │                 │                │
//!    └─────────────────┴────────────────┴──fault──▶ Closed(failure)
//! ```
//!
//! [`TaskRunner::run_wrapper`] is the entry point for executors. Any error or
//! panic raised by setup or run is contained there and converted into a
//! failed result carrying an [`ErrorDetail`].
//!
//! Closing a result persists its log as `worker-log.txt` in the task's
//! output directory, fans every local artifact out to the remote writers,
//! postprocesses the input evidence and releases the writer set.

mod error;
mod result;
mod runner;
mod sink;

pub use error::{ErrorDetail, FailureKind, ResultError, TaskError};
pub use result::{
  FanOutReport, LOG_FILE_NAME, ResultParams, StoredResult, TaskResult, TaskResultRecord,
  format_run_time,
};
pub use runner::{StoredTask, Task, TaskId, TaskRunner, TaskState};
pub use sink::{ChannelSink, LogRecord, LogSink, NoopSink, TracingSink};

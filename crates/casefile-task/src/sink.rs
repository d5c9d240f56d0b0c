//! Diagnostic sinks that mirror task log messages.
//!
//! Every message logged on a result is mirrored to the sink the result was
//! built with. Sinks are shared across concurrently running tasks and must
//! tolerate concurrent use; ordering is only guaranteed within one task.

use tokio::sync::mpsc;
use tracing::info;

/// A log message mirrored from a task result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
  pub task_id: String,
  pub message: String,
}

/// Receives every message logged on a task result.
pub trait LogSink: Send + Sync {
  fn log(&self, task_id: &str, message: &str);
}

/// Mirrors messages to `tracing` at info level. The default sink.
#[derive(Debug, Clone, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
  fn log(&self, task_id: &str, message: &str) {
    info!(task_id = %task_id, "{}", message);
  }
}

/// Discards all messages.
#[derive(Debug, Clone, Default)]
pub struct NoopSink;

impl LogSink for NoopSink {
  fn log(&self, _task_id: &str, _message: &str) {}
}

/// Sends messages to an unbounded channel, for streaming task logs elsewhere.
#[derive(Debug, Clone)]
pub struct ChannelSink {
  sender: mpsc::UnboundedSender<LogRecord>,
}

impl ChannelSink {
  pub fn new(sender: mpsc::UnboundedSender<LogRecord>) -> Self {
    Self { sender }
  }
}

impl LogSink for ChannelSink {
  fn log(&self, task_id: &str, message: &str) {
    // receiver may have been dropped
    let _ = self.sender.send(LogRecord {
      task_id: task_id.to_string(),
      message: message.to_string(),
    });
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_channel_sink_preserves_order() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let sink = ChannelSink::new(tx);

    sink.log("t1", "first");
    sink.log("t1", "second");

    assert_eq!(rx.try_recv().unwrap().message, "first");
    assert_eq!(rx.try_recv().unwrap().message, "second");
    assert!(rx.try_recv().is_err());
  }

  #[test]
  fn test_channel_sink_survives_dropped_receiver() {
    let (tx, rx) = mpsc::unbounded_channel();
    drop(rx);
    ChannelSink::new(tx).log("t1", "ignored");
  }
}

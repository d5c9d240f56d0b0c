use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;

/// A boxed stream of bytes for artifact data.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, StoreError>> + Send>>;

/// Error type for artifact storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
  /// An I/O error occurred.
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  /// The backend refused the artifact.
  #[error("store rejected {key}: {message}")]
  Rejected { key: String, message: String },
}

/// Artifact storage backend for remote writers.
///
/// Implementations durably persist the bytes identified by a key. Keys are
/// `/`-separated relative paths. Streams keep large artifacts (disk images,
/// archives) out of memory.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
  /// Store an artifact under `key`, replacing any previous content.
  async fn put(&self, key: &str, data: ByteStream) -> Result<(), StoreError>;
}

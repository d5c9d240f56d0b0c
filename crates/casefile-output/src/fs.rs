use std::path::PathBuf;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;

use crate::{ArtifactStore, ByteStream, StoreError};

/// Filesystem-backed artifact store.
///
/// Each artifact is stored at `{root}/{key}`; parent directories are created
/// on demand. Suitable for archive volumes and mounted object storage.
pub struct FsStore {
  root: PathBuf,
}

impl FsStore {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  fn key_to_path(&self, key: &str) -> PathBuf {
    self.root.join(key)
  }
}

#[async_trait]
impl ArtifactStore for FsStore {
  async fn put(&self, key: &str, data: ByteStream) -> Result<(), StoreError> {
    let path = self.key_to_path(key);
    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent).await?;
    }

    let mut file = File::create(&path).await?;
    let mut stream = data;
    while let Some(chunk) = stream.next().await {
      file.write_all(&chunk?).await?;
    }
    file.flush().await?;
    Ok(())
  }
}

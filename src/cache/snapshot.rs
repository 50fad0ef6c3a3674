//! Cache storage persistence

use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use super::storage::{CacheStorage, StorageSnapshot};

const SNAPSHOT_MAGIC: &[u8] = b"PORTALSW";
const SNAPSHOT_VERSION: u8 = 1;

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),
  #[error("Serialization error: {0}")]
  Serialize(#[from] rmp_serde::encode::Error),
  #[error("Deserialization error: {0}")]
  Deserialize(#[from] rmp_serde::decode::Error),
  #[error("Invalid snapshot format: {0}")]
  InvalidFormat(String),
}

/// Reads and writes a [`CacheStorage`] to a single file
pub struct SnapshotManager {
  path: PathBuf,
}

impl SnapshotManager {
  pub fn new(path: impl AsRef<Path>) -> Self {
    Self {
      path: path.as_ref().to_path_buf(),
    }
  }

  /// Write every cache to disk. Returns the number of cached responses.
  pub async fn save(&self, storage: &CacheStorage) -> Result<usize, SnapshotError> {
    let snapshot = storage.snapshot();
    let count = snapshot.caches.values().map(|c| c.len()).sum();

    if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
      fs::create_dir_all(parent).await?;
    }

    // Write to a temp file, then rename over the old snapshot
    let temp_path = self.path.with_extension("tmp");
    let mut file = File::create(&temp_path).await?;
    file.write_all(SNAPSHOT_MAGIC).await?;
    file.write_all(&[SNAPSHOT_VERSION]).await?;
    let payload = rmp_serde::to_vec_named(&snapshot)?;
    file.write_all(&payload).await?;
    file.sync_all().await?;
    drop(file);
    fs::rename(&temp_path, &self.path).await?;

    tracing::info!(
      "Cache snapshot saved: {} responses to {}",
      count,
      self.path.display()
    );
    Ok(count)
  }

  /// Load the snapshot into `storage`, replacing its contents.
  /// A missing file is not an error and leaves `storage` untouched.
  pub async fn load(&self, storage: &CacheStorage) -> Result<usize, SnapshotError> {
    if !self.path.exists() {
      return Ok(0);
    }

    let mut data = Vec::new();
    File::open(&self.path).await?.read_to_end(&mut data).await?;

    let header_len = SNAPSHOT_MAGIC.len() + 1;
    if data.len() < header_len || &data[..SNAPSHOT_MAGIC.len()] != SNAPSHOT_MAGIC {
      return Err(SnapshotError::InvalidFormat("invalid magic header".into()));
    }
    let version = data[SNAPSHOT_MAGIC.len()];
    if version != SNAPSHOT_VERSION {
      return Err(SnapshotError::InvalidFormat(format!(
        "unsupported version: {}",
        version
      )));
    }

    let snapshot: StorageSnapshot = rmp_serde::from_slice(&data[header_len..])?;
    let count = snapshot.caches.values().map(|c| c.len()).sum();
    storage.restore(snapshot);

    tracing::info!(
      "Cache snapshot loaded: {} responses from {}",
      count,
      self.path.display()
    );
    Ok(count)
  }
}

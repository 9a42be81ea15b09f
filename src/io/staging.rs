use std::io;
use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tracing::debug;
use uuid::Uuid;

/// Shared scratch directory for uploaded transcripts.
///
/// Concurrent requests write here without locking. Every staged name carries a
/// millisecond timestamp and a fresh uuid, and files are only ever created,
/// never overwritten.
#[derive(Debug, Clone)]
pub struct StagingDir {
    root: PathBuf,
}

impl StagingDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write `contents` to `<millis>_<uuid>_<file_name>` and return the path.
    ///
    /// Any directory components in `file_name` are dropped. Fails with
    /// `AlreadyExists` rather than replacing another request's file.
    pub async fn stage(&self, file_name: &str, contents: &[u8]) -> io::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.root).await?;

        let path = self
            .root
            .join(staged_name(file_name, timestamp_millis(), Uuid::new_v4()));
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;
        file.write_all(contents).await?;
        file.flush().await?;

        debug!("Staged {} bytes to {:?}", contents.len(), path);
        Ok(path)
    }
}

fn timestamp_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn staged_name(file_name: &str, millis: i64, id: Uuid) -> String {
    // Clients may send names with either separator regardless of our platform
    let base = file_name
        .rsplit(['/', '\\'])
        .next()
        .filter(|s| !s.is_empty() && *s != "." && *s != "..")
        .unwrap_or("upload");
    format!("{}_{}_{}", millis, id.simple(), base)
}

//! Transient upload storage
//!
//! Uploaded bytes are streamed to `<root>/uploads/<file_id><ext>` so memory use
//! stays bounded by the chunk size, not the file size. Paths are namespaced by
//! the per-request file id; concurrent requests never share a path.

use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use anyhow::Context;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::types::{AppError, AppResult};

const UPLOADS_DIR: &str = "uploads";

/// An upload sitting in transient storage.
#[derive(Debug, Clone)]
pub struct StagedFile {
    pub path: PathBuf,
    pub size: u64,
}

#[derive(Debug, Clone)]
pub struct TransientStore {
    uploads_dir: PathBuf,
    max_upload_bytes: u64,
}

impl TransientStore {
    pub async fn new(root: impl AsRef<Path>, max_upload_bytes: u64) -> anyhow::Result<Self> {
        let uploads_dir = root.as_ref().join(UPLOADS_DIR);
        fs::create_dir_all(&uploads_dir)
            .await
            .with_context(|| format!("Failed to create transient directory {:?}", uploads_dir))?;

        Ok(Self {
            uploads_dir,
            max_upload_bytes,
        })
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_bytes
    }

    pub fn upload_path(&self, file_id: &Uuid, extension: &str) -> PathBuf {
        self.uploads_dir.join(format!("{}{}", file_id, extension))
    }

    /// Stream `body` into `path`, aborting as soon as the size bound is crossed.
    ///
    /// The partial file is removed on any failure, and also when this future is
    /// dropped before finishing (client disconnect, request timeout).
    pub async fn write_stream<S, E>(&self, path: &Path, body: S) -> AppResult<StagedFile>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Display,
    {
        let mut body = std::pin::pin!(body);
        let guard = PartialUpload::new(path);
        let mut file = fs::File::create(path)
            .await
            .with_context(|| format!("Failed to create transient file {:?}", path))?;
        let mut size: u64 = 0;

        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| AppError::Validation(format!("Failed to read upload: {}", e)))?;
            size += chunk.len() as u64;
            if size > self.max_upload_bytes {
                return Err(AppError::Validation(format!(
                    "File exceeds maximum upload size of {} bytes",
                    self.max_upload_bytes
                )));
            }
            file.write_all(&chunk)
                .await
                .with_context(|| format!("Failed to write transient file {:?}", path))?;
        }

        file.flush().await.context("Failed to flush transient file")?;
        drop(file);
        guard.commit();
        debug!(path = ?path, size, "Upload staged");

        Ok(StagedFile {
            path: path.to_path_buf(),
            size,
        })
    }

    /// Best-effort removal. Failures are logged, never returned.
    pub async fn remove(&self, path: &Path) {
        match fs::remove_file(path).await {
            Ok(()) => debug!(path = ?path, "Transient file removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = ?path, error = %e, "Failed to remove transient file"),
        }
    }

    /// Delete leftovers older than `max_age`, e.g. from clients that disconnected
    /// mid-upload before the process restarted. Returns the number removed.
    pub async fn sweep_stale(&self, max_age: Duration) -> usize {
        let mut entries = match fs::read_dir(&self.uploads_dir).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = ?self.uploads_dir, error = %e, "Cannot scan transient directory");
                return 0;
            }
        };

        let now = SystemTime::now();
        let mut removed = 0;
        while let Ok(Some(entry)) = entries.next_entry().await {
            let Ok(metadata) = entry.metadata().await else {
                continue;
            };
            let stale = metadata
                .modified()
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .is_some_and(|age| age >= max_age);
            if metadata.is_file() && stale {
                self.remove(&entry.path()).await;
                removed += 1;
            }
        }

        if removed > 0 {
            info!(removed, "Swept stale transient uploads");
        }
        removed
    }

    /// Run [`sweep_stale`](Self::sweep_stale) every `every` for the life of the process.
    pub fn spawn_sweeper(&self, every: Duration, max_age: Duration) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                store.sweep_stale(max_age).await;
            }
        })
    }
}

/// Removes an upload's file on drop unless [`commit`](Self::commit) was called.
struct PartialUpload {
    path: Option<PathBuf>,
}

impl PartialUpload {
    fn new(path: &Path) -> Self {
        Self {
            path: Some(path.to_path_buf()),
        }
    }

    fn commit(mut self) {
        self.path = None;
    }
}

impl Drop for PartialUpload {
    fn drop(&mut self) {
        let Some(path) = self.path.take() else {
            return;
        };
        // Drop cannot await.
        match std::fs::remove_file(&path) {
            Ok(()) => debug!(path = ?path, "Partial upload removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = ?path, error = %e, "Failed to remove partial upload"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use tempfile::TempDir;

    fn chunks(parts: &[&'static [u8]]) -> impl Stream<Item = Result<Bytes, std::io::Error>> {
        stream::iter(
            parts
                .iter()
                .map(|p| Ok::<_, std::io::Error>(Bytes::from_static(*p)))
                .collect::<Vec<_>>(),
        )
    }

    #[tokio::test]
    async fn test_write_stream() {
        let temp_dir = TempDir::new().unwrap();
        let store = TransientStore::new(temp_dir.path(), 1024).await.unwrap();
        let file_id = Uuid::new_v4();
        let path = store.upload_path(&file_id, ".txt");

        let staged = store.write_stream(&path, chunks(&[b"hello ", b"world"])).await.unwrap();
        assert_eq!(staged.size, 11);
        assert_eq!(fs::read(&path).await.unwrap(), b"hello world");
        assert!(path.ends_with(format!("uploads/{}.txt", file_id)));
    }

    #[tokio::test]
    async fn test_oversized_upload_is_rejected_and_removed() {
        let temp_dir = TempDir::new().unwrap();
        let store = TransientStore::new(temp_dir.path(), 8).await.unwrap();
        let path = store.upload_path(&Uuid::new_v4(), ".pdf");

        let err = store
            .write_stream(&path, chunks(&[b"12345", b"67890"]))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(ref msg) if msg.contains("maximum upload size")));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_stream_error_removes_partial_file() {
        let temp_dir = TempDir::new().unwrap();
        let store = TransientStore::new(temp_dir.path(), 1024).await.unwrap();
        let path = store.upload_path(&Uuid::new_v4(), ".docx");

        let body = stream::iter(vec![
            Ok(Bytes::from_static(b"partial")),
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "client went away")),
        ]);
        let err = store.write_stream(&path, body).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_sweep_stale() {
        let temp_dir = TempDir::new().unwrap();
        let store = TransientStore::new(temp_dir.path(), 1024).await.unwrap();
        let path = store.upload_path(&Uuid::new_v4(), ".txt");
        fs::write(&path, b"left behind").await.unwrap();

        assert_eq!(store.sweep_stale(Duration::from_secs(3600)).await, 0);
        assert!(path.exists());

        assert_eq!(store.sweep_stale(Duration::ZERO).await, 1);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_cancelled_upload_removes_partial_file() {
        let temp_dir = TempDir::new().unwrap();
        let store = TransientStore::new(temp_dir.path(), 1024).await.unwrap();
        let path = store.upload_path(&Uuid::new_v4(), ".pdf");

        // First chunk arrives, then the client stalls forever.
        let body = chunks(&[b"%PDF-1.5 partial"]).chain(stream::pending());
        let result = tokio::time::timeout(Duration::from_millis(200), store.write_stream(&path, body)).await;
        assert!(result.is_err(), "upload should still be pending");
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_sweeper_runs_periodically() {
        let temp_dir = TempDir::new().unwrap();
        let store = TransientStore::new(temp_dir.path(), 1024).await.unwrap();
        let path = store.upload_path(&Uuid::new_v4(), ".txt");
        fs::write(&path, b"orphaned").await.unwrap();

        let handle = store.spawn_sweeper(Duration::from_millis(20), Duration::ZERO);
        for _ in 0..50 {
            if !path.exists() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        handle.abort();
        assert!(!path.exists());
    }
}

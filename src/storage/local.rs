//! Local filesystem blob store
//!
//! Blobs are written to `<root>/<key><ext>` with a temp-file + rename so a
//! reader never observes a half-written output. References are the bare file
//! names; they are never joined with `..` or separators.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::{BlobMeta, BlobStore};
use crate::converter::extension_of;

pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub async fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)
            .await
            .with_context(|| format!("Failed to create blob directory {:?}", root))?;
        Ok(Self { root })
    }

    fn resolve(&self, storage_ref: &str) -> Result<PathBuf> {
        let valid = !storage_ref.is_empty()
            && storage_ref != "."
            && storage_ref != ".."
            && !storage_ref.contains(&['/', '\\'][..])
            && !storage_ref.contains("..");
        if !valid {
            return Err(anyhow!("Invalid blob reference: {:?}", storage_ref));
        }
        Ok(self.root.join(storage_ref))
    }
}

async fn write_atomically(temp_path: &Path, path: &Path, data: &[u8]) -> Result<()> {
    let mut file = fs::File::create(temp_path)
        .await
        .with_context(|| format!("Failed to create {:?}", temp_path))?;
    file.write_all(data)
        .await
        .with_context(|| format!("Failed to write {:?}", temp_path))?;
    file.sync_all().await?;
    drop(file);

    fs::rename(temp_path, path)
        .await
        .with_context(|| format!("Failed to move blob into place at {:?}", path))?;
    Ok(())
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    fn kind(&self) -> &'static str {
        "local"
    }

    async fn put(&self, key: &str, data: Bytes, meta: &BlobMeta) -> Result<String> {
        let storage_ref = format!("{}{}", key, extension_of(&meta.filename));
        let path = self.resolve(&storage_ref)?;
        let temp_path = path.with_extension("partial");

        if let Err(e) = write_atomically(&temp_path, &path, &data).await {
            if let Err(cleanup) = fs::remove_file(&temp_path).await {
                if cleanup.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = ?temp_path, error = %cleanup, "Failed to remove partial blob");
                }
            }
            return Err(e);
        }

        debug!(storage_ref = %storage_ref, size = data.len(), "Local blob written");
        Ok(storage_ref)
    }

    async fn get(&self, storage_ref: &str) -> Result<Vec<u8>> {
        let path = self.resolve(storage_ref)?;
        fs::read(&path)
            .await
            .with_context(|| format!("Failed to read blob {}", storage_ref))
    }

    async fn delete(&self, storage_ref: &str) -> Result<()> {
        let path = self.resolve(storage_ref)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to delete blob {}", storage_ref)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn meta(filename: &str) -> BlobMeta {
        BlobMeta {
            filename: filename.to_string(),
            content_type: "text/plain; charset=utf-8".to_string(),
            original_filename: "report.pdf".to_string(),
            owner_user_id: "anonymous".to_string(),
            conversion_type: "pdf-to-txt".to_string(),
        }
    }

    #[tokio::test]
    async fn test_put_get_delete() {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalBlobStore::new(temp_dir.path()).await.unwrap();

        let storage_ref = store
            .put("3f1c", Bytes::from_static(b"hello"), &meta("report.txt"))
            .await
            .unwrap();
        assert_eq!(storage_ref, "3f1c.txt");
        assert_eq!(store.get(&storage_ref).await.unwrap(), b"hello");

        store.delete(&storage_ref).await.unwrap();
        assert!(store.get(&storage_ref).await.is_err());

        // Already gone
        store.delete(&storage_ref).await.unwrap();
    }

    #[tokio::test]
    async fn test_rejects_escaping_refs() {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalBlobStore::new(temp_dir.path()).await.unwrap();

        for bad in ["", "..", "../etc/passwd", "a/b.txt", "a\\b.txt"] {
            assert!(store.get(bad).await.is_err(), "accepted {bad:?}");
            assert!(store.delete(bad).await.is_err(), "accepted {bad:?}");
        }
    }

    #[tokio::test]
    async fn test_failed_put_leaves_no_partial_file() {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalBlobStore::new(temp_dir.path()).await.unwrap();

        // A non-empty directory at the destination makes the final rename fail.
        let blocker = temp_dir.path().join("k1.txt");
        fs::create_dir_all(blocker.join("occupied")).await.unwrap();

        let result = store
            .put("k1", Bytes::from_static(b"hello"), &meta("report.txt"))
            .await;
        assert!(result.is_err());
        assert!(!temp_dir.path().join("k1.partial").exists());
    }
}

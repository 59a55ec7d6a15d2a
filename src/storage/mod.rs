//! Storage layer
//!
//! Completed conversion outputs live in exactly one [`BlobStore`], chosen at
//! startup from [`StorageConfig`]. Records only ever hold the opaque reference
//! the store hands back from [`BlobStore::put`].
//!
//! Uploads in flight are kept in the [`TransientStore`] and removed once the
//! pipeline finishes with them.

use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use bytes::Bytes;
use sqlx::PgPool;
use tracing::info;

use crate::config::{StorageConfig, StorageProvider};

pub mod database;
pub mod local;
pub mod s3_client;
pub mod transient;

pub use database::DatabaseBlobStore;
pub use local::LocalBlobStore;
pub use s3_client::S3BlobStore;
pub use transient::{StagedFile, TransientStore};

/// Descriptive metadata stored alongside a blob where the backend supports it.
#[derive(Debug, Clone)]
pub struct BlobMeta {
    pub filename: String,
    pub content_type: String,
    pub original_filename: String,
    pub owner_user_id: String,
    pub conversion_type: String,
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Short backend name, recorded in logs.
    fn kind(&self) -> &'static str;

    /// Store `data` under a key derived from `key` and return the storage reference.
    async fn put(&self, key: &str, data: Bytes, meta: &BlobMeta) -> Result<String>;

    async fn get(&self, storage_ref: &str) -> Result<Vec<u8>>;

    /// Remove the blob. Removing a blob that is already gone is not an error.
    async fn delete(&self, storage_ref: &str) -> Result<()>;
}

/// Build the configured blob store.
///
/// `pool` is required for [`StorageProvider::Database`].
pub async fn create_blob_store(
    config: &StorageConfig,
    pool: Option<&PgPool>,
) -> Result<Arc<dyn BlobStore>> {
    let store: Arc<dyn BlobStore> = match config.provider {
        StorageProvider::Database => match pool {
            Some(pool) => Arc::new(DatabaseBlobStore::new(pool.clone())),
            None => bail!("STORAGE_PROVIDER=database requires DATABASE_URL"),
        },
        StorageProvider::S3 => Arc::new(S3BlobStore::new(config)?),
        StorageProvider::Local => Arc::new(LocalBlobStore::new(&config.local_dir).await?),
    };

    info!(backend = store.kind(), "Blob store initialized");
    Ok(store)
}

// S3-compatible blob store (AWS, MinIO, R2, ...)

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use s3::creds::Credentials;
use s3::{Bucket, Region};
use tracing::debug;

use super::{BlobMeta, BlobStore};
use crate::config::StorageConfig;

const KEY_PREFIX: &str = "conversions";

pub struct S3BlobStore {
    bucket: Bucket,
}

impl S3BlobStore {
    pub fn new(config: &StorageConfig) -> Result<Self> {
        if config.s3_bucket.is_empty() {
            return Err(anyhow!("S3_BUCKET must be set when STORAGE_PROVIDER=s3"));
        }

        let region = match &config.s3_endpoint {
            Some(endpoint) => Region::Custom {
                region: config.s3_region.clone(),
                endpoint: endpoint.clone(),
            },
            None => config
                .s3_region
                .parse()
                .with_context(|| format!("Invalid S3 region: {}", config.s3_region))?,
        };

        let credentials = Credentials::new(
            config.s3_access_key_id.as_deref(),
            config.s3_secret_access_key.as_deref(),
            None,
            None,
            None,
        )
        .context("Failed to resolve S3 credentials")?;

        let mut bucket = Bucket::new(&config.s3_bucket, region, credentials)
            .context("Failed to create S3 bucket handle")?;
        if config.s3_endpoint.is_some() {
            bucket = bucket.with_path_style();
        }

        Ok(Self { bucket })
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    fn kind(&self) -> &'static str {
        "s3"
    }

    async fn put(&self, key: &str, data: Bytes, meta: &BlobMeta) -> Result<String> {
        let object_key = format!("{}/{}/{}", KEY_PREFIX, key, meta.filename);
        let response = self
            .bucket
            .put_object_with_content_type(&object_key, &data, &meta.content_type)
            .await
            .with_context(|| format!("S3 put failed for {}", object_key))?;
        debug!(key = %object_key, status = response.status_code(), size = data.len(), "S3 put");
        Ok(object_key)
    }

    async fn get(&self, storage_ref: &str) -> Result<Vec<u8>> {
        let response = self
            .bucket
            .get_object(storage_ref)
            .await
            .with_context(|| format!("S3 get failed for {}", storage_ref))?;
        Ok(response.bytes().to_vec())
    }

    async fn delete(&self, storage_ref: &str) -> Result<()> {
        self.bucket
            .delete_object(storage_ref)
            .await
            .with_context(|| format!("S3 delete failed for {}", storage_ref))?;
        Ok(())
    }
}

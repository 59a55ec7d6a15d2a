// Blob storage inside Postgres (bytea rows in `conversion_blobs`)

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use sqlx::PgPool;
use uuid::Uuid;

use super::{BlobMeta, BlobStore};

pub struct DatabaseBlobStore {
    pool: PgPool,
}

impl DatabaseBlobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn parse_ref(storage_ref: &str) -> Result<Uuid> {
        Uuid::parse_str(storage_ref).map_err(|_| anyhow!("Invalid blob reference: {}", storage_ref))
    }
}

#[async_trait]
impl BlobStore for DatabaseBlobStore {
    fn kind(&self) -> &'static str {
        "database"
    }

    async fn put(&self, _key: &str, data: Bytes, meta: &BlobMeta) -> Result<String> {
        let blob_id = Uuid::new_v4();
        let metadata = serde_json::json!({
            "originalFilename": meta.original_filename,
            "ownerUserId": meta.owner_user_id,
            "conversionType": meta.conversion_type,
        });

        sqlx::query(
            r#"
            INSERT INTO conversion_blobs (id, filename, content_type, length, data, metadata)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(blob_id)
        .bind(&meta.filename)
        .bind(&meta.content_type)
        .bind(data.len() as i64)
        .bind(data.as_ref())
        .bind(metadata)
        .execute(&self.pool)
        .await
        .context("Failed to insert conversion blob")?;

        Ok(blob_id.to_string())
    }

    async fn get(&self, storage_ref: &str) -> Result<Vec<u8>> {
        let blob_id = Self::parse_ref(storage_ref)?;
        let data: Option<Vec<u8>> =
            sqlx::query_scalar("SELECT data FROM conversion_blobs WHERE id = $1")
                .bind(blob_id)
                .fetch_optional(&self.pool)
                .await
                .context("Failed to read conversion blob")?;

        data.ok_or_else(|| anyhow!("Blob {} not found", storage_ref))
    }

    async fn delete(&self, storage_ref: &str) -> Result<()> {
        let blob_id = Self::parse_ref(storage_ref)?;
        sqlx::query("DELETE FROM conversion_blobs WHERE id = $1")
            .bind(blob_id)
            .execute(&self.pool)
            .await
            .context("Failed to delete conversion blob")?;
        Ok(())
    }
}

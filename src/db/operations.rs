use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::ConversionRepository;
use crate::models::{ConversionRecord, ConversionStatus, StatsResponse, TypeCount};
use crate::types::{AppError, AppResult, ConversionType};

// Note: runtime query_as with FromRow so builds don't need DATABASE_URL at compile time

#[derive(Debug, sqlx::FromRow)]
struct ConversionRow {
    file_id: Uuid,
    user_id: String,
    original_filename: String,
    output_filename: String,
    conversion_type: String,
    status: String,
    storage_ref: Option<String>,
    input_size: Option<i64>,
    error_message: Option<String>,
    created_at: DateTime<Utc>,
    download_count: i64,
}

impl TryFrom<ConversionRow> for ConversionRecord {
    type Error = AppError;

    fn try_from(row: ConversionRow) -> AppResult<Self> {
        let conversion_type = ConversionType::from_tag(&row.conversion_type).ok_or_else(|| {
            AppError::Internal(format!("Unknown conversion_type in database: {}", row.conversion_type))
        })?;
        let status = ConversionStatus::from_tag(&row.status)
            .ok_or_else(|| AppError::Internal(format!("Unknown status in database: {}", row.status)))?;

        Ok(ConversionRecord {
            file_id: row.file_id,
            user_id: row.user_id,
            original_filename: row.original_filename,
            output_filename: row.output_filename,
            conversion_type,
            status,
            storage_ref: row.storage_ref,
            input_size: row.input_size,
            error_message: row.error_message,
            created_at: row.created_at,
            download_count: row.download_count,
        })
    }
}

const SELECT_COLUMNS: &str = r#"
    SELECT file_id, user_id, original_filename, output_filename, conversion_type,
           status, storage_ref, input_size, error_message, created_at, download_count
    FROM conversions
"#;

pub struct PgConversionRepository {
    pool: PgPool,
}

impl PgConversionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConversionRepository for PgConversionRepository {
    fn kind(&self) -> &'static str {
        "postgres"
    }

    async fn insert(&self, record: &ConversionRecord) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO conversions (
                file_id, user_id, original_filename, output_filename, conversion_type,
                status, storage_ref, input_size, error_message, created_at, download_count
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(record.file_id)
        .bind(&record.user_id)
        .bind(&record.original_filename)
        .bind(&record.output_filename)
        .bind(record.conversion_type.as_str())
        .bind(record.status.as_str())
        .bind(&record.storage_ref)
        .bind(record.input_size)
        .bind(&record.error_message)
        .bind(record.created_at)
        .bind(record.download_count)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find(&self, file_id: Uuid) -> AppResult<Option<ConversionRecord>> {
        let row = sqlx::query_as::<_, ConversionRow>(&format!("{} WHERE file_id = $1", SELECT_COLUMNS))
            .bind(file_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(ConversionRecord::try_from).transpose()
    }

    async fn list_for_user(&self, user_id: &str, limit: i64) -> AppResult<Vec<ConversionRecord>> {
        let rows = sqlx::query_as::<_, ConversionRow>(&format!(
            "{} WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2",
            SELECT_COLUMNS
        ))
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ConversionRecord::try_from).collect()
    }

    async fn increment_download_count(&self, file_id: Uuid) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE conversions SET download_count = download_count + 1 WHERE file_id = $1",
        )
        .bind(file_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, file_id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM conversions WHERE file_id = $1")
            .bind(file_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn stats(&self) -> AppResult<StatsResponse> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT conversion_type, COUNT(*)::BIGINT
            FROM conversions
            GROUP BY conversion_type
            ORDER BY conversion_type
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut stats = Vec::with_capacity(rows.len());
        for (tag, count) in rows {
            let conversion_type = ConversionType::from_tag(&tag).ok_or_else(|| {
                AppError::Internal(format!("Unknown conversion_type in database: {}", tag))
            })?;
            stats.push(TypeCount { conversion_type, count });
        }
        let total_conversions = stats.iter().map(|s| s.count).sum();

        Ok(StatsResponse {
            stats,
            total_conversions,
        })
    }

    async fn health_check(&self) -> AppResult<()> {
        super::health_check(&self.pool).await?;
        Ok(())
    }
}

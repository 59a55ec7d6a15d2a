//! Conversion record persistence
//!
//! [`ConversionRepository`] is the record store seen by the pipeline. Postgres
//! backs it in production; [`MemoryConversionRepository`] stands in when no
//! database is configured and in tests.

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{ConversionRecord, StatsResponse};
use crate::types::AppResult;

pub mod memory;
pub mod operations;
pub mod pool;

pub use memory::MemoryConversionRepository;
pub use operations::PgConversionRepository;
pub use pool::*;

#[async_trait]
pub trait ConversionRepository: Send + Sync {
    /// Short backend name for health output.
    fn kind(&self) -> &'static str;

    async fn insert(&self, record: &ConversionRecord) -> AppResult<()>;

    async fn find(&self, file_id: Uuid) -> AppResult<Option<ConversionRecord>>;

    /// Most recent first, at most `limit` rows.
    async fn list_for_user(&self, user_id: &str, limit: i64) -> AppResult<Vec<ConversionRecord>>;

    /// Atomically add one to `download_count`. Returns `false` if no such record.
    async fn increment_download_count(&self, file_id: Uuid) -> AppResult<bool>;

    /// Returns `false` if no such record.
    async fn delete(&self, file_id: Uuid) -> AppResult<bool>;

    /// Per-type counts. `total_conversions` is always the sum of the per-type counts.
    async fn stats(&self) -> AppResult<StatsResponse>;

    async fn health_check(&self) -> AppResult<()>;
}

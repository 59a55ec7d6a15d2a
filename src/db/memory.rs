use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::ConversionRepository;
use crate::models::{ConversionRecord, StatsResponse, TypeCount};
use crate::types::{AppError, AppResult, ConversionType};

/// In-process record store. Contents are lost on restart.
#[derive(Clone, Default)]
pub struct MemoryConversionRepository {
    inner: Arc<RwLock<HashMap<Uuid, ConversionRecord>>>,
}

impl MemoryConversionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[async_trait]
impl ConversionRepository for MemoryConversionRepository {
    fn kind(&self) -> &'static str {
        "memory"
    }

    async fn insert(&self, record: &ConversionRecord) -> AppResult<()> {
        let mut guard = self.inner.write().await;
        if guard.contains_key(&record.file_id) {
            return Err(AppError::Internal(format!("Duplicate file id {}", record.file_id)));
        }
        guard.insert(record.file_id, record.clone());
        Ok(())
    }

    async fn find(&self, file_id: Uuid) -> AppResult<Option<ConversionRecord>> {
        let guard = self.inner.read().await;
        Ok(guard.get(&file_id).cloned())
    }

    async fn list_for_user(&self, user_id: &str, limit: i64) -> AppResult<Vec<ConversionRecord>> {
        let guard = self.inner.read().await;
        let mut records: Vec<ConversionRecord> = guard
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records.truncate(limit.max(0) as usize);
        Ok(records)
    }

    async fn increment_download_count(&self, file_id: Uuid) -> AppResult<bool> {
        let mut guard = self.inner.write().await;
        match guard.get_mut(&file_id) {
            Some(record) => {
                record.download_count += 1;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, file_id: Uuid) -> AppResult<bool> {
        let mut guard = self.inner.write().await;
        Ok(guard.remove(&file_id).is_some())
    }

    async fn stats(&self) -> AppResult<StatsResponse> {
        let guard = self.inner.read().await;
        let mut counts: HashMap<ConversionType, i64> = HashMap::new();
        for record in guard.values() {
            *counts.entry(record.conversion_type).or_insert(0) += 1;
        }

        let stats: Vec<TypeCount> = ConversionType::ALL
            .iter()
            .filter_map(|ty| {
                counts.get(ty).map(|&count| TypeCount {
                    conversion_type: *ty,
                    count,
                })
            })
            .collect();
        let total_conversions = stats.iter().map(|s| s.count).sum();

        Ok(StatsResponse {
            stats,
            total_conversions,
        })
    }

    async fn health_check(&self) -> AppResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ConversionStatus;
    use chrono::{Duration, Utc};

    fn record(user_id: &str, ty: ConversionType, minutes_ago: i64) -> ConversionRecord {
        ConversionRecord {
            file_id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            original_filename: "in.pdf".to_string(),
            output_filename: "in.txt".to_string(),
            conversion_type: ty,
            status: ConversionStatus::Completed,
            storage_ref: Some("ref".to_string()),
            input_size: Some(10),
            error_message: None,
            created_at: Utc::now() - Duration::minutes(minutes_ago),
            download_count: 0,
        }
    }

    #[tokio::test]
    async fn test_list_for_user_newest_first_and_limited() {
        let repo = MemoryConversionRepository::new();
        for minutes_ago in 0..25 {
            repo.insert(&record("alice", ConversionType::PdfToTxt, minutes_ago)).await.unwrap();
        }
        repo.insert(&record("bob", ConversionType::PdfToTxt, 0)).await.unwrap();

        let listed = repo.list_for_user("alice", 20).await.unwrap();
        assert_eq!(listed.len(), 20);
        assert!(listed.windows(2).all(|w| w[0].created_at >= w[1].created_at));
        assert!(listed.iter().all(|r| r.user_id == "alice"));
    }

    #[tokio::test]
    async fn test_duplicate_file_id_rejected() {
        let repo = MemoryConversionRepository::new();
        let rec = record("alice", ConversionType::DocxToTxt, 0);
        repo.insert(&rec).await.unwrap();
        assert!(repo.insert(&rec).await.is_err());
        assert_eq!(repo.len().await, 1);
    }

    #[tokio::test]
    async fn test_concurrent_increments_are_not_lost() {
        let repo = MemoryConversionRepository::new();
        let rec = record("alice", ConversionType::PdfToTxt, 0);
        repo.insert(&rec).await.unwrap();

        let handles: Vec<_> = (0..50)
            .map(|_| {
                let repo = repo.clone();
                let file_id = rec.file_id;
                tokio::spawn(async move { repo.increment_download_count(file_id).await.unwrap() })
            })
            .collect();
        for handle in handles {
            assert!(handle.await.unwrap());
        }

        let stored = repo.find(rec.file_id).await.unwrap().unwrap();
        assert_eq!(stored.download_count, 50);
        assert!(!repo.increment_download_count(Uuid::new_v4()).await.unwrap());
    }

    #[tokio::test]
    async fn test_stats_sum_to_total() {
        let repo = MemoryConversionRepository::new();
        repo.insert(&record("a", ConversionType::PdfToTxt, 0)).await.unwrap();
        repo.insert(&record("a", ConversionType::PdfToTxt, 1)).await.unwrap();
        repo.insert(&record("b", ConversionType::TxtToPdf, 2)).await.unwrap();

        let stats = repo.stats().await.unwrap();
        assert_eq!(stats.total_conversions, 3);
        assert_eq!(
            stats.stats,
            vec![
                TypeCount { conversion_type: ConversionType::PdfToTxt, count: 2 },
                TypeCount { conversion_type: ConversionType::TxtToPdf, count: 1 },
            ]
        );
    }
}

//! Conversion pipeline
//!
//! Upload → transient storage → extension check → converter → blob store →
//! record. Every attempt ends with exactly one record, `completed` or
//! `failed`, and the transient upload is removed on every path before the
//! outcome is recorded.
//!
//! The HTTP layer drives this in two phases ([`ConversionService::stage_upload`]
//! then [`ConversionService::complete`]) because multipart fields may arrive
//! in any order. [`ConversionService::handle_conversion`] runs both.

use std::fmt::Display;
use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use futures::Stream;
use tokio::fs;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::converter::{self, extension_of, output_filename};
use crate::db::ConversionRepository;
use crate::models::{
    download_url, ConversionRecord, ConversionStatus, StatsResponse, ANONYMOUS_USER,
};
use crate::storage::{BlobMeta, BlobStore, StagedFile, TransientStore};
use crate::types::{AppError, AppResult, ConversionType};

/// How many records the history view returns.
pub const HISTORY_LIMIT: i64 = 20;

/// An upload that has been written to transient storage but not yet converted.
#[derive(Debug)]
pub struct StagedUpload {
    pub file_id: Uuid,
    pub declared_name: String,
    pub file: StagedFile,
}

#[derive(Debug, Clone)]
pub struct ConversionOutcome {
    pub record: ConversionRecord,
    pub download_url: String,
}

#[derive(Debug, Clone)]
pub struct DownloadedFile {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub filename: String,
}

pub struct ConversionService {
    repository: Arc<dyn ConversionRepository>,
    blobs: Arc<dyn BlobStore>,
    transient: TransientStore,
}

impl ConversionService {
    pub fn new(
        repository: Arc<dyn ConversionRepository>,
        blobs: Arc<dyn BlobStore>,
        transient: TransientStore,
    ) -> Self {
        Self {
            repository,
            blobs,
            transient,
        }
    }

    pub fn repository(&self) -> &dyn ConversionRepository {
        self.repository.as_ref()
    }

    pub fn blob_backend(&self) -> &'static str {
        self.blobs.kind()
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.transient.max_upload_bytes()
    }

    /// Upload, convert and persist in one call.
    pub async fn handle_conversion<S, E>(
        &self,
        body: S,
        declared_name: &str,
        conversion_type: ConversionType,
        user_id: &str,
    ) -> AppResult<ConversionOutcome>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Display,
    {
        let staged = self.stage_upload(body, declared_name).await?;
        self.complete(staged, conversion_type, user_id).await
    }

    /// Assign a fresh file id and stream the upload into transient storage.
    pub async fn stage_upload<S, E>(&self, body: S, declared_name: &str) -> AppResult<StagedUpload>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Display,
    {
        let file_id = Uuid::new_v4();
        let declared_name = sanitize_filename(declared_name);
        let path = self
            .transient
            .upload_path(&file_id, &extension_of(&declared_name));

        let file = self.transient.write_stream(&path, body).await?;
        info!(file_id = %file_id, filename = %declared_name, size = file.size, "Upload received");

        Ok(StagedUpload {
            file_id,
            declared_name,
            file,
        })
    }

    /// Drop a staged upload that will not be converted.
    pub async fn discard(&self, staged: StagedUpload) {
        self.transient.remove(&staged.file.path).await;
    }

    pub async fn complete(
        &self,
        staged: StagedUpload,
        conversion_type: ConversionType,
        user_id: &str,
    ) -> AppResult<ConversionOutcome> {
        let user_id = normalize_user_id(user_id);
        let output_name = output_filename(&staged.declared_name, conversion_type);

        let output = match self.convert_staged(&staged, conversion_type).await {
            Ok(output) => output,
            Err(err) => {
                self.transient.remove(&staged.file.path).await;
                self.record_failure(&staged, conversion_type, &user_id, &output_name, &err)
                    .await;
                return Err(err);
            }
        };

        let meta = BlobMeta {
            filename: output_name.clone(),
            content_type: conversion_type.output_mime().to_string(),
            original_filename: staged.declared_name.clone(),
            owner_user_id: user_id.clone(),
            conversion_type: conversion_type.to_string(),
        };
        let output_size = output.len();
        let storage_ref = match self
            .blobs
            .put(&staged.file_id.to_string(), Bytes::from(output), &meta)
            .await
        {
            Ok(storage_ref) => storage_ref,
            Err(e) => {
                let err = AppError::Storage(e);
                self.transient.remove(&staged.file.path).await;
                self.record_failure(&staged, conversion_type, &user_id, &output_name, &err)
                    .await;
                return Err(err);
            }
        };

        let record = ConversionRecord {
            file_id: staged.file_id,
            user_id,
            original_filename: staged.declared_name.clone(),
            output_filename: output_name,
            conversion_type,
            status: ConversionStatus::Completed,
            storage_ref: Some(storage_ref.clone()),
            input_size: Some(staged.file.size as i64),
            error_message: None,
            created_at: Utc::now(),
            download_count: 0,
        };

        if let Err(err) = self.repository.insert(&record).await {
            if let Err(e) = self.blobs.delete(&storage_ref).await {
                warn!(file_id = %record.file_id, error = %e, "Failed to release orphaned blob");
            }
            self.transient.remove(&staged.file.path).await;
            return Err(err);
        }

        self.transient.remove(&staged.file.path).await;

        info!(
            file_id = %record.file_id,
            conversion_type = %conversion_type,
            user_id = %record.user_id,
            input_size = staged.file.size,
            output_size,
            backend = self.blobs.kind(),
            "Conversion completed"
        );

        Ok(ConversionOutcome {
            download_url: download_url(&record.file_id),
            record,
        })
    }

    async fn convert_staged(
        &self,
        staged: &StagedUpload,
        conversion_type: ConversionType,
    ) -> AppResult<Vec<u8>> {
        // Cheap check first: no read, no parse on a mismatched upload.
        converter::validate_extension(&staged.declared_name, conversion_type)?;

        let input = fs::read(&staged.file.path)
            .await
            .map_err(|e| AppError::Storage(anyhow::anyhow!("Failed to read staged upload: {}", e)))?;

        let output = tokio::task::spawn_blocking(move || converter::convert(&input, conversion_type))
            .await
            .map_err(|e| AppError::Internal(format!("Converter task failed: {}", e)))??;

        Ok(output)
    }

    async fn record_failure(
        &self,
        staged: &StagedUpload,
        conversion_type: ConversionType,
        user_id: &str,
        output_name: &str,
        err: &AppError,
    ) {
        warn!(
            file_id = %staged.file_id,
            conversion_type = %conversion_type,
            error = %err,
            "Conversion failed"
        );

        let record = ConversionRecord {
            file_id: staged.file_id,
            user_id: user_id.to_string(),
            original_filename: staged.declared_name.clone(),
            output_filename: output_name.to_string(),
            conversion_type,
            status: ConversionStatus::Failed,
            storage_ref: None,
            input_size: Some(staged.file.size as i64),
            error_message: Some(err.public_message()),
            created_at: Utc::now(),
            download_count: 0,
        };

        if let Err(e) = self.repository.insert(&record).await {
            error!(file_id = %staged.file_id, error = %e, "Failed to persist failed conversion record");
        }
    }

    /// Bytes, MIME type and filename of a completed conversion.
    ///
    /// Bumps `download_count` on success; a failed bump is logged and does not
    /// stop delivery.
    pub async fn fetch_output(&self, file_id: Uuid) -> AppResult<DownloadedFile> {
        let record = self.find_record(file_id).await?;
        let storage_ref = match (&record.status, &record.storage_ref) {
            (ConversionStatus::Completed, Some(storage_ref)) => storage_ref,
            _ => return Err(AppError::NotFound(file_id.to_string())),
        };

        let bytes = self.blobs.get(storage_ref).await?;

        match self.repository.increment_download_count(file_id).await {
            Ok(true) => {}
            Ok(false) => warn!(file_id = %file_id, "Record vanished before download count update"),
            Err(e) => warn!(file_id = %file_id, error = %e, "Failed to increment download count"),
        }

        Ok(DownloadedFile {
            bytes,
            mime_type: record.conversion_type.output_mime().to_string(),
            filename: record.output_filename,
        })
    }

    pub async fn record_download(&self, file_id: Uuid) -> AppResult<()> {
        if self.repository.increment_download_count(file_id).await? {
            Ok(())
        } else {
            Err(AppError::NotFound(file_id.to_string()))
        }
    }

    /// Release the stored output (attempted first) and then drop the record.
    pub async fn delete_conversion(&self, file_id: Uuid) -> AppResult<()> {
        let record = self.find_record(file_id).await?;

        if let Some(storage_ref) = &record.storage_ref {
            if let Err(e) = self.blobs.delete(storage_ref).await {
                warn!(file_id = %file_id, error = %e, "Failed to delete stored output");
            }
        }

        if !self.repository.delete(file_id).await? {
            return Err(AppError::NotFound(file_id.to_string()));
        }

        info!(file_id = %file_id, "Conversion deleted");
        Ok(())
    }

    pub async fn list_conversions(&self, user_id: &str) -> AppResult<Vec<ConversionRecord>> {
        self.repository
            .list_for_user(&normalize_user_id(user_id), HISTORY_LIMIT)
            .await
    }

    pub async fn stats(&self) -> AppResult<StatsResponse> {
        self.repository.stats().await
    }

    async fn find_record(&self, file_id: Uuid) -> AppResult<ConversionRecord> {
        self.repository
            .find(file_id)
            .await?
            .ok_or_else(|| AppError::NotFound(file_id.to_string()))
    }
}

/// Final path component of a client-supplied filename.
pub fn sanitize_filename(declared_name: &str) -> String {
    let name = declared_name
        .rsplit(&['/', '\\'][..])
        .next()
        .unwrap_or_default()
        .trim();
    if name.is_empty() || name == "." || name == ".." {
        "upload".to_string()
    } else {
        name.to_string()
    }
}

pub fn normalize_user_id(user_id: &str) -> String {
    let trimmed = user_id.trim();
    if trimmed.is_empty() {
        ANONYMOUS_USER.to_string()
    } else {
        trimmed.to_string()
    }
}

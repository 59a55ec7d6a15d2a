use axum::{
    extract::{Multipart, State},
    routing::post,
    Json, Router,
};
use tracing::{debug, info};

use crate::models::{AppState, ConvertResponse, ANONYMOUS_USER};
use crate::pipeline::StagedUpload;
use crate::types::{AppError, AppResult, ConversionType};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/convert", post(convert))
        .with_state(state)
}

/// `multipart/form-data` with `file`, `conversionType` and optional `userId`.
///
/// The file part is streamed to transient storage as soon as it arrives, so
/// the text fields may come before or after it.
async fn convert(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<Json<ConvertResponse>> {
    let service = &state.service;
    let mut staged: Option<StagedUpload> = None;
    let mut conversion_type: Option<String> = None;
    let mut user_id: Option<String> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                if let Some(staged) = staged.take() {
                    service.discard(staged).await;
                }
                return Err(AppError::Validation(format!("Failed to read upload: {}", e)));
            }
        };

        let name = field.name().unwrap_or_default().to_string();
        debug!(field = %name, filename = ?field.file_name(), "Received multipart field");

        match name.as_str() {
            "file" if staged.is_none() => {
                let filename = field.file_name().unwrap_or_default().to_string();
                staged = Some(service.stage_upload(field, &filename).await?);
            }
            "conversionType" | "userId" => {
                let value = match field.text().await {
                    Ok(value) => value,
                    Err(e) => {
                        if let Some(staged) = staged.take() {
                            service.discard(staged).await;
                        }
                        return Err(AppError::Validation(format!("Failed to read upload: {}", e)));
                    }
                };
                if name == "conversionType" {
                    conversion_type = Some(value);
                } else {
                    user_id = Some(value);
                }
            }
            _ => {}
        }
    }

    let Some(staged) = staged else {
        return Err(AppError::Validation("No file provided".to_string()));
    };

    let requested = conversion_type.unwrap_or_default();
    let conversion_type = match requested.trim().parse::<ConversionType>() {
        Ok(ty) => ty,
        Err(e) => {
            service.discard(staged).await;
            return Err(e.into());
        }
    };

    let user_id = user_id.unwrap_or_else(|| ANONYMOUS_USER.to_string());
    let outcome = service.complete(staged, conversion_type, &user_id).await?;

    info!(file_id = %outcome.record.file_id, "Convert request served");

    Ok(Json(ConvertResponse {
        success: true,
        file_id: outcome.record.file_id,
        conversion_type: outcome.record.conversion_type,
        output_filename: outcome.record.output_filename,
        download_url: outcome.download_url,
    }))
}

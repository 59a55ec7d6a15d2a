use axum::{
    extract::{Path, State},
    http::HeaderMap,
    routing::{get, put},
    Json, Router,
};
use uuid::Uuid;

use crate::models::{AppState, ConversionsResponse, SuccessResponse, ANONYMOUS_USER};
use crate::types::{AppError, AppResult};

pub const USER_ID_HEADER: &str = "x-user-id";

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/conversions", get(list_conversions))
        .route(
            "/api/conversions/{file_id}",
            put(record_download).delete(delete_conversion),
        )
        .with_state(state)
}

/// A malformed id can never name a record, so it is reported as not found.
pub(crate) fn parse_file_id(raw: &str) -> AppResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| AppError::NotFound(raw.to_string()))
}

async fn list_conversions(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<Json<ConversionsResponse>> {
    let user_id = headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or(ANONYMOUS_USER);

    let records = state.service.list_conversions(user_id).await?;

    Ok(Json(ConversionsResponse {
        conversions: records.into_iter().map(Into::into).collect(),
    }))
}

async fn record_download(
    State(state): State<AppState>,
    Path(file_id): Path<String>,
) -> AppResult<Json<SuccessResponse>> {
    let file_id = parse_file_id(&file_id)?;
    state.service.record_download(file_id).await?;
    Ok(Json(SuccessResponse { success: true }))
}

async fn delete_conversion(
    State(state): State<AppState>,
    Path(file_id): Path<String>,
) -> AppResult<Json<SuccessResponse>> {
    let file_id = parse_file_id(&file_id)?;
    state.service.delete_conversion(file_id).await?;
    Ok(Json(SuccessResponse { success: true }))
}

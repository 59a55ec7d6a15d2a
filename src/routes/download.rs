use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};

use super::conversions::parse_file_id;
use crate::models::AppState;
use crate::types::AppResult;

const IMMUTABLE_CACHE: &str = "public, max-age=31536000, immutable";

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/download/{file_id}", get(download))
        .with_state(state)
}

async fn download(
    State(state): State<AppState>,
    Path(file_id): Path<String>,
) -> AppResult<Response> {
    let file_id = parse_file_id(&file_id)?;
    let file = state.service.fetch_output(file_id).await?;

    Ok((
        [
            (header::CONTENT_TYPE, file.mime_type),
            (header::CONTENT_DISPOSITION, content_disposition(&file.filename)),
            (header::CACHE_CONTROL, IMMUTABLE_CACHE.to_string()),
        ],
        file.bytes,
    )
        .into_response())
}

/// `attachment` disposition with an ASCII fallback name plus the RFC 5987 form.
fn content_disposition(filename: &str) -> String {
    let fallback: String = filename
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii() && !c.is_ascii_control() => c,
            _ => '_',
        })
        .collect();

    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        urlencoding::encode(filename)
    )
}

use axum::{extract::State, routing::get, Json, Router};

use crate::models::{AppState, StatsResponse};
use crate::types::AppResult;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/stats", get(stats))
        .with_state(state)
}

async fn stats(State(state): State<AppState>) -> AppResult<Json<StatsResponse>> {
    Ok(Json(state.service.stats().await?))
}

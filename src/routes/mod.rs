//! API Routes
//!
//! - `/api/convert` - Upload and convert a document
//! - `/api/conversions` - Conversion history, download counting, deletion
//! - `/api/download/{fileId}` - Stored output retrieval
//! - `/api/stats` - Per-type conversion counts
//! - `/api/health` - Health checks

pub mod conversions;
pub mod convert;
pub mod download;
pub mod health;
pub mod stats;

use axum::extract::DefaultBodyLimit;
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::middleware::cors_layer;
use crate::models::AppState;

/// Room for multipart boundaries and the text fields on top of the file itself.
const MULTIPART_OVERHEAD_BYTES: u64 = 64 * 1024;

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    info!("Creating application router");

    let body_limit = state
        .service
        .max_upload_bytes()
        .saturating_add(MULTIPART_OVERHEAD_BYTES);
    let cors = cors_layer(&state.config.server.cors_allowed_origins);

    Router::new()
        .merge(convert::router(state.clone()))
        .merge(conversions::router(state.clone()))
        .merge(download::router(state.clone()))
        .merge(stats::router(state.clone()))
        .merge(health::router(state))
        .layer(DefaultBodyLimit::max(
            usize::try_from(body_limit).unwrap_or(usize::MAX),
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

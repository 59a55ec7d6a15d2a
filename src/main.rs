use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};

use converthub::config::Config;
use converthub::db::{self, ConversionRepository, MemoryConversionRepository, PgConversionRepository};
use converthub::pipeline::ConversionService;
use converthub::storage::{create_blob_store, TransientStore};
use converthub::utils::init_logger;
use converthub::{create_router, AppState};

const STALE_UPLOAD_AGE: Duration = Duration::from_secs(60 * 60);
const SWEEP_INTERVAL: Duration = Duration::from_secs(15 * 60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::from_env()?;

    let _log_guard = init_logger(config.logging.log_dir.as_deref());
    info!("Configuration loaded: {:?}", config.server);

    // Connect to database
    let pool = match config.database.url.as_deref() {
        Some(url) => {
            let pool = db::create_pool(&config.database, url).await?;
            db::run_migrations(&pool).await?;
            Some(pool)
        }
        None => {
            warn!("DATABASE_URL not set; conversion records are kept in memory and lost on restart");
            None
        }
    };

    let repository: Arc<dyn ConversionRepository> = match &pool {
        Some(pool) => Arc::new(PgConversionRepository::new(pool.clone())),
        None => Arc::new(MemoryConversionRepository::new()),
    };
    let blobs = create_blob_store(&config.storage, pool.as_ref()).await?;

    let transient =
        TransientStore::new(&config.upload.transient_dir, config.upload.max_upload_bytes).await?;
    let swept = transient.sweep_stale(STALE_UPLOAD_AGE).await;
    if swept > 0 {
        info!(count = swept, "Removed stale transient uploads");
    }
    let sweeper = transient.spawn_sweeper(SWEEP_INTERVAL, STALE_UPLOAD_AGE);

    info!(
        repository = repository.kind(),
        blob_store = blobs.kind(),
        max_upload_bytes = config.upload.max_upload_bytes,
        "Storage initialized"
    );

    // Create shared state
    let service = ConversionService::new(repository, blobs, transient);
    let state = AppState {
        service: Arc::new(service),
        config: config.clone(),
    };

    let app = create_router(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", config.server.host, config.server.port))?;
    let listener = TcpListener::bind(addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    sweeper.abort();
    if let Some(pool) = pool {
        pool.close().await;
    }
    info!("Server shutdown complete");

    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown...");
        },
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown...");
        },
    }
}

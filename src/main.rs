use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use tokio::{net::TcpListener, signal};
use tracing_subscriber::EnvFilter;

use pdfdigest::{
    artifacts::{PgUploadStore, UploadStore},
    auth::jwt::JwtService,
    config::AppConfig,
    db,
    ingest::{IngestPipeline, StagingArea},
    routes,
    state::AppState,
    storage::{ObjectStorage, S3Storage},
    summarizer::build_summarizer,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "server",
        database_url = %config.redacted_database_url(),
        pool_size = config.database_max_pool_size,
        s3_bucket = %config.s3_bucket,
        summarizer_url = %config.summarizer.base_url,
        summarizer_timeout_secs = config.summarizer.timeout.as_secs(),
        summarizer_max_retries = config.summarizer.max_retries,
        max_upload_bytes = config.max_upload_bytes,
        "loaded configuration"
    );

    let pool = db::init_pool_with_size(&config.database_url, config.database_max_pool_size)?;
    let applied = {
        let pool = pool.clone();
        tokio::task::spawn_blocking(move || db::run_migrations(&pool))
            .await
            .context("migration task panicked")??
    };
    tracing::info!(applied, "database migrations up to date");

    let objects: Arc<dyn ObjectStorage> = Arc::new(S3Storage::from_config(&config).await?);
    let uploads: Arc<dyn UploadStore> = Arc::new(PgUploadStore::new(pool.clone(), objects));
    let summarizer = build_summarizer(&config.summarizer)?;

    let staging = StagingArea::new(config.staging_dir.clone());
    staging
        .ensure_exists()
        .with_context(|| format!("failed to create staging dir {}", staging.dir().display()))?;
    tracing::info!(staging_dir = %staging.dir().display(), "staging area ready");

    let pipeline = IngestPipeline::new(
        uploads.clone(),
        summarizer.clone(),
        staging,
        config.max_upload_bytes,
    );
    let jwt = JwtService::from_config(&config)?;

    let addr: SocketAddr = format!("{}:{}", config.server_host, config.server_port)
        .parse()
        .context("SERVER_HOST/SERVER_PORT do not form a valid socket address")?;

    let state = AppState::new(pool, config, uploads, summarizer, pipeline, jwt);
    let app = routes::create_router(state);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("received shutdown signal");
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

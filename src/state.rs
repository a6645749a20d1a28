use std::sync::Arc;

use diesel::{
    pg::PgConnection,
    r2d2::{ConnectionManager, PooledConnection},
};

use crate::{
    artifacts::UploadStore,
    auth::jwt::JwtService,
    config::AppConfig,
    db::PgPool,
    error::{AppError, AppResult},
    ingest::IngestPipeline,
    summarizer::Summarizer,
};

type PgPooledConnection = PooledConnection<ConnectionManager<PgConnection>>;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<AppConfig>,
    pub uploads: Arc<dyn UploadStore>,
    pub summarizer: Arc<dyn Summarizer>,
    pub pipeline: Arc<IngestPipeline>,
    pub jwt: JwtService,
}

impl AppState {
    pub fn new(
        pool: PgPool,
        config: AppConfig,
        uploads: Arc<dyn UploadStore>,
        summarizer: Arc<dyn Summarizer>,
        pipeline: IngestPipeline,
        jwt: JwtService,
    ) -> Self {
        Self {
            pool,
            config: Arc::new(config),
            uploads,
            summarizer,
            pipeline: Arc::new(pipeline),
            jwt,
        }
    }

    pub fn db(&self) -> AppResult<PgPooledConnection> {
        self.pool
            .get()
            .map_err(|err| AppError::storage(format!("database pool error: {err}")))
    }
}

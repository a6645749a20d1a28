//! Persistence of uploads: metadata rows in PostgreSQL, blobs in object storage.
//!
//! The store enforces no ownership rules. Callers authorize through
//! [`crate::ownership`] before reading or deleting.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::NaiveDateTime;
use thiserror::Error;
use uuid::Uuid;

use crate::models::Upload;

#[cfg(test)]
pub(crate) mod memory;
mod postgres;

pub use postgres::PgUploadStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("database error: {0}")]
    Database(diesel::result::Error),
    #[error("database pool error: {0}")]
    Pool(String),
    #[error("object storage error: {0:#}")]
    Object(anyhow::Error),
    #[error("storage task failed: {0}")]
    Task(String),
}

impl From<diesel::result::Error> for StoreError {
    fn from(value: diesel::result::Error) -> Self {
        match value {
            diesel::result::Error::NotFound => StoreError::NotFound,
            other => StoreError::Database(other),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Everything needed to persist a freshly summarized upload.
#[derive(Debug, Clone)]
pub struct NewUploadArtifacts {
    pub owner_id: Uuid,
    pub filename: String,
    pub input: Bytes,
    pub summary: Bytes,
}

/// Listing row: metadata only, never the blobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadListing {
    pub id: Uuid,
    pub filename: String,
    pub created_at: NaiveDateTime,
    pub has_summary: bool,
}

impl From<&Upload> for UploadListing {
    fn from(upload: &Upload) -> Self {
        Self {
            id: upload.id,
            filename: upload.filename.clone(),
            created_at: upload.created_at,
            has_summary: upload.has_summary(),
        }
    }
}

#[async_trait]
pub trait UploadStore: Send + Sync + 'static {
    /// Writes both blobs and the metadata row. Either all of it becomes
    /// visible or none of it does.
    async fn create(&self, artifacts: NewUploadArtifacts) -> StoreResult<Upload>;

    async fn get(&self, id: Uuid) -> StoreResult<Upload>;

    /// Uploads of one owner, newest first.
    async fn list_by_owner(&self, owner_id: Uuid) -> StoreResult<Vec<UploadListing>>;

    /// Blob reads take the record the caller already loaded and authorized,
    /// so the row is not looked up a second time. `NotFound` when the object
    /// behind the key is gone.
    async fn input_blob(&self, upload: &Upload) -> StoreResult<Bytes>;

    /// `NotFound` when the record has no summary or its object is gone.
    async fn summary_blob(&self, upload: &Upload) -> StoreResult<Bytes>;

    async fn delete(&self, id: Uuid) -> StoreResult<()>;

    /// Removes every upload of `owner_id` and returns how many were removed.
    async fn delete_by_owner(&self, owner_id: Uuid) -> StoreResult<usize>;
}

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{NaiveDateTime, Utc};
use diesel::{prelude::*, PgConnection};
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use uuid::Uuid;

use super::{NewUploadArtifacts, StoreError, StoreResult, UploadListing, UploadStore};
use crate::{
    db::PgPool,
    models::{NewUpload, Upload},
    schema::uploads,
    storage::{
        artifact_key, inline_content_disposition, ArtifactKind, ObjectNotFound, ObjectStorage,
        PDF_CONTENT_TYPE,
    },
};

pub struct PgUploadStore {
    pool: PgPool,
    objects: Arc<dyn ObjectStorage>,
}

impl PgUploadStore {
    pub fn new(pool: PgPool, objects: Arc<dyn ObjectStorage>) -> Self {
        Self { pool, objects }
    }

    async fn with_conn<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut PgConnection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get().map_err(|err| StoreError::Pool(err.to_string()))?;
            f(&mut conn)
        })
        .await
        .map_err(|err| StoreError::Task(err.to_string()))?
    }

    async fn put_pdf(&self, key: &str, bytes: &Bytes, filename: &str) -> StoreResult<()> {
        self.objects
            .put_object(
                key,
                bytes.to_vec(),
                Some(PDF_CONTENT_TYPE.to_string()),
                inline_content_disposition(filename),
            )
            .await
            .map_err(StoreError::Object)
    }

    /// Best effort: by the time this runs the row is gone (or never existed),
    /// so leftover objects are unreachable and only worth a warning.
    async fn remove_objects(&self, keys: impl IntoIterator<Item = String>) {
        for key in keys {
            if let Err(err) = self.objects.delete_object(&key).await {
                warn!(key = %key, error = %err, "failed to remove upload object");
            }
        }
    }

    async fn fetch_object(&self, key: &str) -> StoreResult<Bytes> {
        self.objects
            .get_object(key)
            .await
            .map(Bytes::from)
            .map_err(|err| object_read_error(key, err))
    }
}

fn object_read_error(key: &str, err: anyhow::Error) -> StoreError {
    if err.downcast_ref::<ObjectNotFound>().is_some() {
        warn!(key = %key, "upload object missing from storage");
        StoreError::NotFound
    } else {
        StoreError::Object(err)
    }
}

fn object_keys(upload: Upload) -> impl Iterator<Item = String> {
    std::iter::once(upload.input_key).chain(upload.summary_key)
}

#[async_trait]
impl UploadStore for PgUploadStore {
    async fn create(&self, artifacts: NewUploadArtifacts) -> StoreResult<Upload> {
        let NewUploadArtifacts {
            owner_id,
            filename,
            input,
            summary,
        } = artifacts;

        let id = Uuid::new_v4();
        let input_key = artifact_key(owner_id, id, ArtifactKind::Input);
        let summary_key = artifact_key(owner_id, id, ArtifactKind::Summary);
        let now = Utc::now().naive_utc();

        self.put_pdf(&input_key, &input, &filename).await?;
        if let Err(err) = self.put_pdf(&summary_key, &summary, &filename).await {
            self.remove_objects([input_key]).await;
            return Err(err);
        }

        let new_upload = NewUpload {
            id,
            owner_id,
            filename,
            input_key: input_key.clone(),
            input_size_bytes: input.len() as i64,
            input_checksum: hex::encode(Sha256::digest(&input)),
            summary_key: Some(summary_key.clone()),
            summary_size_bytes: Some(summary.len() as i64),
            created_at: now,
            summary_generated_at: Some(now),
        };

        let inserted = self
            .with_conn(move |conn| {
                let upload = diesel::insert_into(uploads::table)
                    .values(&new_upload)
                    .get_result::<Upload>(conn)?;
                Ok(upload)
            })
            .await;

        match inserted {
            Ok(upload) => {
                info!(upload_id = %upload.id, owner_id = %upload.owner_id, "upload persisted");
                Ok(upload)
            }
            Err(err) => {
                self.remove_objects([input_key, summary_key]).await;
                Err(err)
            }
        }
    }

    async fn get(&self, id: Uuid) -> StoreResult<Upload> {
        self.with_conn(move |conn| Ok(uploads::table.find(id).first::<Upload>(conn)?))
            .await
    }

    async fn list_by_owner(&self, owner_id: Uuid) -> StoreResult<Vec<UploadListing>> {
        self.with_conn(move |conn| {
            let rows = uploads::table
                .filter(uploads::owner_id.eq(owner_id))
                .order((uploads::created_at.desc(), uploads::id.desc()))
                .select((
                    uploads::id,
                    uploads::filename,
                    uploads::created_at,
                    uploads::summary_key.is_not_null(),
                ))
                .load::<(Uuid, String, NaiveDateTime, bool)>(conn)?;

            Ok(rows
                .into_iter()
                .map(|(id, filename, created_at, has_summary)| UploadListing {
                    id,
                    filename,
                    created_at,
                    has_summary,
                })
                .collect())
        })
        .await
    }

    async fn input_blob(&self, upload: &Upload) -> StoreResult<Bytes> {
        self.fetch_object(&upload.input_key).await
    }

    async fn summary_blob(&self, upload: &Upload) -> StoreResult<Bytes> {
        let key = upload.summary_key.as_deref().ok_or(StoreError::NotFound)?;
        self.fetch_object(key).await
    }

    async fn delete(&self, id: Uuid) -> StoreResult<()> {
        let removed = self
            .with_conn(move |conn| {
                Ok(diesel::delete(uploads::table.find(id)).get_result::<Upload>(conn)?)
            })
            .await?;

        self.remove_objects(object_keys(removed)).await;
        info!(upload_id = %id, "upload deleted");
        Ok(())
    }

    async fn delete_by_owner(&self, owner_id: Uuid) -> StoreResult<usize> {
        let removed = self
            .with_conn(move |conn| {
                Ok(
                    diesel::delete(uploads::table.filter(uploads::owner_id.eq(owner_id)))
                        .get_results::<Upload>(conn)?,
                )
            })
            .await?;

        let count = removed.len();
        self.remove_objects(removed.into_iter().flat_map(object_keys)).await;
        info!(owner_id = %owner_id, count, "removed uploads of owner");
        Ok(count)
    }
}

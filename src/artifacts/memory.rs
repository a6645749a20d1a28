use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex,
    },
};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::{NewUploadArtifacts, StoreError, StoreResult, UploadListing, UploadStore};
use crate::{
    models::Upload,
    storage::{artifact_key, ArtifactKind},
};

struct Entry {
    upload: Upload,
    input: Bytes,
    summary: Option<Bytes>,
}

/// In-process store for unit tests.
#[derive(Default)]
pub(crate) struct MemoryUploadStore {
    entries: Mutex<HashMap<Uuid, Entry>>,
    fail_writes: AtomicBool,
}

impl MemoryUploadStore {
    pub(crate) fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// Inserts a record without a summary, a state only older data can be in.
    pub(crate) fn insert_without_summary(
        &self,
        owner_id: Uuid,
        filename: &str,
        input: &[u8],
    ) -> Uuid {
        let id = Uuid::new_v4();
        let upload = Upload {
            id,
            owner_id,
            filename: filename.to_string(),
            input_key: artifact_key(owner_id, id, ArtifactKind::Input),
            input_size_bytes: input.len() as i64,
            input_checksum: hex::encode(Sha256::digest(input)),
            summary_key: None,
            summary_size_bytes: None,
            created_at: Utc::now().naive_utc(),
            summary_generated_at: None,
        };
        self.entries.lock().unwrap().insert(
            id,
            Entry {
                upload,
                input: Bytes::copy_from_slice(input),
                summary: None,
            },
        );
        id
    }
}

#[async_trait]
impl UploadStore for MemoryUploadStore {
    async fn create(&self, artifacts: NewUploadArtifacts) -> StoreResult<Upload> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Pool("database unavailable".into()));
        }

        let id = Uuid::new_v4();
        let now = Utc::now().naive_utc();
        let upload = Upload {
            id,
            owner_id: artifacts.owner_id,
            filename: artifacts.filename,
            input_key: artifact_key(artifacts.owner_id, id, ArtifactKind::Input),
            input_size_bytes: artifacts.input.len() as i64,
            input_checksum: hex::encode(Sha256::digest(&artifacts.input)),
            summary_key: Some(artifact_key(artifacts.owner_id, id, ArtifactKind::Summary)),
            summary_size_bytes: Some(artifacts.summary.len() as i64),
            created_at: now,
            summary_generated_at: Some(now),
        };
        self.entries.lock().unwrap().insert(
            id,
            Entry {
                upload: upload.clone(),
                input: artifacts.input,
                summary: Some(artifacts.summary),
            },
        );
        Ok(upload)
    }

    async fn get(&self, id: Uuid) -> StoreResult<Upload> {
        self.entries
            .lock()
            .unwrap()
            .get(&id)
            .map(|entry| entry.upload.clone())
            .ok_or(StoreError::NotFound)
    }

    async fn list_by_owner(&self, owner_id: Uuid) -> StoreResult<Vec<UploadListing>> {
        let entries = self.entries.lock().unwrap();
        let mut listings: Vec<UploadListing> = entries
            .values()
            .filter(|entry| entry.upload.owner_id == owner_id)
            .map(|entry| UploadListing::from(&entry.upload))
            .collect();
        listings.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(listings)
    }

    async fn input_blob(&self, upload: &Upload) -> StoreResult<Bytes> {
        self.entries
            .lock()
            .unwrap()
            .get(&upload.id)
            .map(|entry| entry.input.clone())
            .ok_or(StoreError::NotFound)
    }

    async fn summary_blob(&self, upload: &Upload) -> StoreResult<Bytes> {
        self.entries
            .lock()
            .unwrap()
            .get(&upload.id)
            .and_then(|entry| entry.summary.clone())
            .ok_or(StoreError::NotFound)
    }

    async fn delete(&self, id: Uuid) -> StoreResult<()> {
        self.entries
            .lock()
            .unwrap()
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }

    async fn delete_by_owner(&self, owner_id: Uuid) -> StoreResult<usize> {
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|_, entry| entry.upload.owner_id != owner_id);
        Ok(before - entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_without_summary_list_and_read_as_missing() {
        let store = MemoryUploadStore::default();
        let owner = Uuid::new_v4();
        let id = store.insert_without_summary(owner, "legacy.pdf", b"%PDF-1.4 legacy");

        let listings = store.list_by_owner(owner).await.unwrap();
        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].id, id);
        assert!(!listings[0].has_summary);

        let upload = store.get(id).await.unwrap();
        assert_eq!(upload.summary_key, None);
        assert_eq!(
            store.input_blob(&upload).await.unwrap(),
            Bytes::from_static(b"%PDF-1.4 legacy")
        );
        assert!(matches!(
            store.summary_blob(&upload).await,
            Err(StoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn listing_is_newest_first_and_per_owner() {
        let store = MemoryUploadStore::default();
        let owner = Uuid::new_v4();
        let mut ids = Vec::new();
        for name in ["a.pdf", "b.pdf", "c.pdf"] {
            let upload = store
                .create(NewUploadArtifacts {
                    owner_id: owner,
                    filename: name.to_string(),
                    input: Bytes::from_static(b"%PDF-1.4"),
                    summary: Bytes::from_static(b"%PDF-1.4 summary"),
                })
                .await
                .unwrap();
            ids.push(upload.id);
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }
        store.insert_without_summary(Uuid::new_v4(), "other.pdf", b"%PDF-1.4");

        let listed: Vec<Uuid> = store
            .list_by_owner(owner)
            .await
            .unwrap()
            .into_iter()
            .map(|listing| listing.id)
            .collect();
        ids.reverse();
        assert_eq!(listed, ids);
    }
}

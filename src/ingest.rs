//! Upload ingestion: validate, stage, summarize, persist.
//!
//! The staged copy of an upload lives in a [`StagedFile`] owned by the request
//! that created it. Dropping it deletes the file, so every exit path releases
//! the staging area, including the request future being dropped mid-call.

use std::{
    io::{self, Write},
    path::{Path, PathBuf},
    sync::Arc,
};

use bytes::Bytes;
use tempfile::NamedTempFile;
use thiserror::Error;
use tokio::task;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    artifacts::{NewUploadArtifacts, StoreError, UploadStore},
    models::Upload,
    summarizer::{Summarizer, UpstreamError},
};

pub const MAX_FILENAME_CHARS: usize = 255;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("{0}")]
    Validation(String),
    #[error("file is {size} bytes; the limit is {max} bytes")]
    TooLarge { size: usize, max: usize },
    #[error("failed to stage upload: {0}")]
    Staging(#[from] io::Error),
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
    #[error("failed to persist upload: {0}")]
    Storage(#[from] StoreError),
}

/// Directory in which in-flight uploads are staged.
#[derive(Debug, Clone)]
pub struct StagingArea {
    dir: PathBuf,
}

impl StagingArea {
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self {
            dir: dir.unwrap_or_else(std::env::temp_dir),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn ensure_exists(&self) -> io::Result<()> {
        std::fs::create_dir_all(&self.dir)
    }

    pub async fn stage(&self, bytes: Bytes) -> io::Result<StagedFile> {
        let dir = self.dir.clone();
        task::spawn_blocking(move || -> io::Result<StagedFile> {
            let mut file = tempfile::Builder::new()
                .prefix("upload-")
                .suffix(".pdf")
                .tempfile_in(&dir)?;
            file.write_all(&bytes)?;
            file.flush()?;
            Ok(StagedFile { file })
        })
        .await
        .map_err(io::Error::other)?
    }
}

/// A staged upload on disk; removed when dropped.
pub struct StagedFile {
    file: NamedTempFile,
}

impl StagedFile {
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub async fn read(&self) -> io::Result<Bytes> {
        tokio::fs::read(self.path()).await.map(Bytes::from)
    }

    /// Removes the file now, reporting failures instead of swallowing them in `Drop`.
    pub fn release(self) {
        let path = self.path().to_path_buf();
        if let Err(err) = self.file.close() {
            warn!(path = %path.display(), error = %err, "failed to remove staged upload");
        }
    }
}

pub struct IngestPipeline {
    store: Arc<dyn UploadStore>,
    summarizer: Arc<dyn Summarizer>,
    staging: StagingArea,
    max_upload_bytes: usize,
}

impl IngestPipeline {
    pub fn new(
        store: Arc<dyn UploadStore>,
        summarizer: Arc<dyn Summarizer>,
        staging: StagingArea,
        max_upload_bytes: usize,
    ) -> Self {
        Self {
            store,
            summarizer,
            staging,
            max_upload_bytes,
        }
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_bytes
    }

    pub async fn ingest(
        &self,
        owner_id: Uuid,
        filename: &str,
        bytes: Bytes,
    ) -> Result<Upload, IngestError> {
        let filename = validate_filename(filename)?;
        self.validate_size(bytes.len())?;

        let staged = self.staging.stage(bytes).await?;
        debug!(path = %staged.path().display(), "staged upload");

        let result = self.summarize_and_store(owner_id, &filename, &staged).await;
        staged.release();

        let upload = result?;
        info!(
            upload_id = %upload.id,
            owner_id = %owner_id,
            filename = %upload.filename,
            input_bytes = upload.input_size_bytes,
            summary_bytes = upload.summary_size_bytes.unwrap_or_default(),
            "upload summarized"
        );
        Ok(upload)
    }

    async fn summarize_and_store(
        &self,
        owner_id: Uuid,
        filename: &str,
        staged: &StagedFile,
    ) -> Result<Upload, IngestError> {
        let input = staged.read().await?;
        let summary = self.summarizer.summarize(input.clone(), filename).await?;

        let upload = self
            .store
            .create(NewUploadArtifacts {
                owner_id,
                filename: filename.to_string(),
                input,
                summary,
            })
            .await?;
        Ok(upload)
    }

    fn validate_size(&self, size: usize) -> Result<(), IngestError> {
        if size == 0 {
            return Err(IngestError::Validation("file must not be empty".into()));
        }
        if size > self.max_upload_bytes {
            return Err(IngestError::TooLarge {
                size,
                max: self.max_upload_bytes,
            });
        }
        Ok(())
    }
}

/// Keeps only the final path segment of a client-supplied name.
fn validate_filename(raw: &str) -> Result<String, IngestError> {
    let name = raw
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    if name.is_empty() {
        return Err(IngestError::Validation("filename is required".into()));
    }
    if name.chars().count() > MAX_FILENAME_CHARS {
        return Err(IngestError::Validation(format!(
            "filename must be at most {MAX_FILENAME_CHARS} characters"
        )));
    }
    Ok(name.to_string())
}

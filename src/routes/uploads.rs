use axum::{
    body::Bytes,
    extract::{
        multipart::MultipartRejection, rejection::PathRejection, Json, Multipart, Path, State,
    },
    http::{
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
        HeaderMap, HeaderValue, StatusCode,
    },
};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use tracing::{error, info};
use uuid::Uuid;

use crate::{
    artifacts::UploadListing,
    auth::AuthenticatedUser,
    error::{AppError, AppResult},
    models::Upload,
    normalize::normalize,
    ownership::{authorize_delete, authorize_read},
    state::AppState,
    storage::{inline_content_disposition, PDF_CONTENT_TYPE},
};

/// Multipart field names accepted for the uploaded document.
const FILE_FIELDS: &[&str] = &["pdf", "file"];

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub id: Uuid,
    pub filename: String,
    pub timestamp: DateTime<Utc>,
    pub has_summary: bool,
    pub input_size_bytes: i64,
    pub summary_size_bytes: Option<i64>,
}

impl From<Upload> for UploadResponse {
    fn from(upload: Upload) -> Self {
        Self {
            has_summary: upload.has_summary(),
            id: upload.id,
            filename: upload.filename,
            timestamp: as_utc(upload.created_at),
            input_size_bytes: upload.input_size_bytes,
            summary_size_bytes: upload.summary_size_bytes,
        }
    }
}

#[derive(Serialize)]
pub struct CreateUploadResponse {
    pub message: String,
    pub upload: UploadResponse,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadListItem {
    pub id: Uuid,
    pub filename: String,
    pub timestamp: DateTime<Utc>,
    pub has_summary: bool,
}

impl From<UploadListing> for UploadListItem {
    fn from(listing: UploadListing) -> Self {
        Self {
            id: listing.id,
            filename: listing.filename,
            timestamp: as_utc(listing.created_at),
            has_summary: listing.has_summary,
        }
    }
}

#[derive(Serialize)]
pub struct UploadListResponse {
    pub uploads: Vec<UploadListItem>,
}

#[derive(Serialize)]
pub struct SummaryTextResponse {
    pub text: String,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

pub async fn create_upload(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<(StatusCode, Json<CreateUploadResponse>)> {
    let mut multipart = multipart?;
    let mut file: Option<(String, Bytes)> = None;

    while let Some(field) = multipart.next_field().await.map_err(|err| {
        error!(error = %err, "invalid multipart data");
        multipart_error(err.status(), format!("invalid multipart data: {err}"))
    })? {
        let is_file_field = field
            .name()
            .is_some_and(|name| FILE_FIELDS.contains(&name));
        if !is_file_field || file.is_some() {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        let data = field.bytes().await.map_err(|err| {
            error!(error = %err, "failed to read file bytes");
            multipart_error(err.status(), format!("failed to read file bytes: {err}"))
        })?;
        file = Some((filename, data));
    }

    let (filename, bytes) = file.ok_or_else(|| {
        error!("upload rejected: missing file field");
        AppError::bad_request("a PDF file is required in the `pdf` field")
    })?;

    let upload = state
        .pipeline
        .ingest(user.user_id, &filename, bytes)
        .await
        .map_err(|err| {
            error!(error = %err, filename = %filename, owner_id = %user.user_id, "upload failed");
            AppError::from(err)
        })?;

    Ok((
        StatusCode::CREATED,
        Json(CreateUploadResponse {
            message: "File uploaded and summarized".to_string(),
            upload: upload.into(),
        }),
    ))
}

pub async fn list_uploads(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<UploadListResponse>> {
    let listings = state.uploads.list_by_owner(user.user_id).await?;
    Ok(Json(UploadListResponse {
        uploads: listings.into_iter().map(UploadListItem::from).collect(),
    }))
}

pub async fn get_input(
    State(state): State<AppState>,
    upload_id: Result<Path<Uuid>, PathRejection>,
    user: AuthenticatedUser,
) -> AppResult<(HeaderMap, Bytes)> {
    let Path(upload_id) = upload_id?;
    let upload = state.uploads.get(upload_id).await?;
    authorize_read(&user, &upload)?;
    let bytes = state.uploads.input_blob(&upload).await?;
    Ok((pdf_headers(&upload.filename)?, bytes))
}

pub async fn get_summary(
    State(state): State<AppState>,
    upload_id: Result<Path<Uuid>, PathRejection>,
    user: AuthenticatedUser,
) -> AppResult<(HeaderMap, Bytes)> {
    let Path(upload_id) = upload_id?;
    let upload = state.uploads.get(upload_id).await?;
    authorize_read(&user, &upload)?;
    let bytes = state.uploads.summary_blob(&upload).await?;
    Ok((pdf_headers(&summary_filename(&upload.filename))?, bytes))
}

pub async fn get_summary_text(
    State(state): State<AppState>,
    upload_id: Result<Path<Uuid>, PathRejection>,
    user: AuthenticatedUser,
) -> AppResult<Json<SummaryTextResponse>> {
    let Path(upload_id) = upload_id?;
    let upload = state.uploads.get(upload_id).await?;
    authorize_read(&user, &upload)?;
    let summary = state.uploads.summary_blob(&upload).await?;

    let raw = state
        .summarizer
        .extract_text(summary, &summary_filename(&upload.filename))
        .await?;

    Ok(Json(SummaryTextResponse {
        text: normalize(&raw),
    }))
}

pub async fn delete_upload(
    State(state): State<AppState>,
    upload_id: Result<Path<Uuid>, PathRejection>,
    user: AuthenticatedUser,
) -> AppResult<Json<MessageResponse>> {
    let Path(upload_id) = upload_id?;
    let upload = state.uploads.get(upload_id).await?;
    authorize_delete(&user, &upload)?;
    state.uploads.delete(upload_id).await?;

    info!(upload_id = %upload_id, caller_id = %user.user_id, "upload removed by request");
    Ok(Json(MessageResponse {
        message: "Upload deleted".to_string(),
    }))
}

fn as_utc(value: NaiveDateTime) -> DateTime<Utc> {
    DateTime::from_naive_utc_and_offset(value, Utc)
}

fn summary_filename(filename: &str) -> String {
    let stem = filename
        .strip_suffix(".pdf")
        .or_else(|| filename.strip_suffix(".PDF"))
        .unwrap_or(filename);
    format!("{stem}-summary.pdf")
}

fn pdf_headers(filename: &str) -> AppResult<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(PDF_CONTENT_TYPE));
    if let Some(disposition) = inline_content_disposition(filename) {
        headers.insert(
            CONTENT_DISPOSITION,
            HeaderValue::from_str(&disposition).map_err(AppError::internal)?,
        );
    }
    Ok(headers)
}

fn multipart_error(status: StatusCode, message: String) -> AppError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::payload_too_large("uploaded file exceeds the size limit")
    } else {
        AppError::bad_request(message)
    }
}

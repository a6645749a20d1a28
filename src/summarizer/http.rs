use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{
    header::CONTENT_TYPE,
    multipart::{Form, Part},
    Client, Response,
};
use serde::Deserialize;
use tracing::{debug, error};
use url::Url;

use super::{truncate_detail, Summarizer, UpstreamError};
use crate::{config::SummarizerConfig, storage::PDF_CONTENT_TYPE};

const PDF_FIELD: &str = "pdf_file";
const MAX_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Deserialize)]
struct ExtractTextResponse {
    text: String,
}

/// Talks to the summarization service over HTTP. Performs exactly one attempt
/// per call; wrap it in a `RetryingSummarizer` for retries.
pub struct HttpSummarizer {
    client: Client,
    summarize_url: Url,
    extract_text_url: Url,
    timeout: Duration,
}

impl HttpSummarizer {
    pub fn new(config: &SummarizerConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.timeout.min(MAX_CONNECT_TIMEOUT))
            .build()
            .context("failed to build summarizer HTTP client")?;

        let base = with_trailing_slash(config.base_url.clone());
        let summarize_url = base
            .join("summarize")
            .context("invalid summarizer base URL")?;
        let extract_text_url = base
            .join("extract-text")
            .context("invalid summarizer base URL")?;

        Ok(Self {
            client,
            summarize_url,
            extract_text_url,
            timeout: config.timeout,
        })
    }

    async fn post_pdf(
        &self,
        url: &Url,
        pdf: Bytes,
        filename: &str,
    ) -> Result<Response, UpstreamError> {
        let part = Part::bytes(pdf.to_vec())
            .file_name(filename.to_string())
            .mime_str(PDF_CONTENT_TYPE)
            .map_err(|err| UpstreamError::Malformed(format!("invalid multipart part: {err}")))?;
        let form = Form::new().part(PDF_FIELD, part);

        debug!(%url, filename, size_bytes = pdf.len(), "sending document to summarizer");
        let response = self
            .client
            .post(url.clone())
            .multipart(form)
            .send()
            .await
            .map_err(|err| self.transport_error(err))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(%url, %status, body = %body, "summarizer request failed");
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                detail: truncate_detail(&body),
            });
        }

        Ok(response)
    }

    fn transport_error(&self, err: reqwest::Error) -> UpstreamError {
        if err.is_timeout() {
            UpstreamError::Timeout(self.timeout)
        } else if err.is_decode() {
            UpstreamError::Malformed(err.to_string())
        } else {
            UpstreamError::Unreachable(err.to_string())
        }
    }
}

#[async_trait]
impl Summarizer for HttpSummarizer {
    async fn summarize(&self, pdf: Bytes, filename: &str) -> Result<Bytes, UpstreamError> {
        let response = self.post_pdf(&self.summarize_url, pdf, filename).await?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();
        if !is_pdf_content_type(&content_type) {
            return Err(UpstreamError::Malformed(format!(
                "expected {PDF_CONTENT_TYPE}, got {:?}",
                content_type
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|err| self.transport_error(err))?;
        if body.is_empty() {
            return Err(UpstreamError::Malformed("empty summary document".into()));
        }

        debug!(size_bytes = body.len(), "received summary document");
        Ok(body)
    }

    async fn extract_text(&self, pdf: Bytes, filename: &str) -> Result<String, UpstreamError> {
        let response = self.post_pdf(&self.extract_text_url, pdf, filename).await?;
        let body = response
            .bytes()
            .await
            .map_err(|err| self.transport_error(err))?;
        let parsed: ExtractTextResponse = serde_json::from_slice(&body)
            .map_err(|err| UpstreamError::Malformed(format!("invalid extract-text body: {err}")))?;
        Ok(parsed.text)
    }
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

fn is_pdf_content_type(value: &str) -> bool {
    let essence = value.split(';').next().unwrap_or_default().trim();
    essence == PDF_CONTENT_TYPE || essence == "application/octet-stream"
}

//! Client side of the external summarization service.
//!
//! The service exposes two multipart endpoints: `/summarize` turns a PDF into a
//! summary PDF and `/extract-text` returns the plain text of a PDF. Callers talk
//! to it through the [`Summarizer`] trait so tests can substitute a fake.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::config::SummarizerConfig;

mod http;
mod retry;

pub use http::HttpSummarizer;
pub use retry::{RetryPolicy, RetryingSummarizer};

/// Upstream bodies are echoed back to clients; keep them short.
pub const MAX_UPSTREAM_DETAIL_BYTES: usize = 512;

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("summarization service unreachable: {0}")]
    Unreachable(String),
    #[error("summarization service did not respond within {0:?}")]
    Timeout(Duration),
    #[error("summarization service returned status {status}")]
    Status { status: u16, detail: String },
    #[error("unexpected response from summarization service: {0}")]
    Malformed(String),
}

impl UpstreamError {
    /// Failures worth another attempt: the service may recover on its own.
    pub fn is_transient(&self) -> bool {
        match self {
            UpstreamError::Unreachable(_) | UpstreamError::Timeout(_) => true,
            UpstreamError::Status { status, .. } => *status >= 500 || *status == 429,
            UpstreamError::Malformed(_) => false,
        }
    }

    pub fn detail(&self) -> Option<&str> {
        match self {
            UpstreamError::Status { detail, .. } if !detail.is_empty() => Some(detail),
            _ => None,
        }
    }
}

#[async_trait]
pub trait Summarizer: Send + Sync + 'static {
    /// Sends a PDF and returns the summary PDF produced from it.
    async fn summarize(&self, pdf: Bytes, filename: &str) -> Result<Bytes, UpstreamError>;

    /// Sends a PDF and returns its extracted plain text.
    async fn extract_text(&self, pdf: Bytes, filename: &str) -> Result<String, UpstreamError>;
}

pub fn build_summarizer(config: &SummarizerConfig) -> anyhow::Result<Arc<dyn Summarizer>> {
    let client = HttpSummarizer::new(config)?;
    if config.max_retries == 0 {
        return Ok(Arc::new(client));
    }

    let policy = RetryPolicy {
        max_retries: config.max_retries,
        backoff: config.retry_backoff,
    };
    Ok(Arc::new(RetryingSummarizer::new(client, policy)))
}

pub(crate) fn truncate_detail(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.len() <= MAX_UPSTREAM_DETAIL_BYTES {
        return trimmed.to_string();
    }
    let mut end = MAX_UPSTREAM_DETAIL_BYTES;
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &trimmed[..end])
}

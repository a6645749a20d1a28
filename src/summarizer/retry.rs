use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::time::sleep;
use tracing::warn;

use super::{Summarizer, UpstreamError};

const MAX_BACKOFF_SHIFT: u32 = 10;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (zero-based): `backoff * 2^attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff
            .saturating_mul(1u32 << attempt.min(MAX_BACKOFF_SHIFT))
    }

    fn should_retry(&self, err: &UpstreamError, attempt: u32) -> bool {
        attempt < self.max_retries && err.is_transient()
    }
}

/// Retries transient upstream failures of the wrapped summarizer.
pub struct RetryingSummarizer<S> {
    inner: S,
    policy: RetryPolicy,
}

impl<S: Summarizer> RetryingSummarizer<S> {
    pub fn new(inner: S, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    async fn back_off(&self, operation: &'static str, err: &UpstreamError, attempt: u32) {
        let delay = self.policy.delay_for(attempt);
        warn!(
            operation,
            attempt = attempt + 1,
            max_retries = self.policy.max_retries,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "summarizer call failed; retrying"
        );
        sleep(delay).await;
    }
}

#[async_trait]
impl<S: Summarizer> Summarizer for RetryingSummarizer<S> {
    async fn summarize(&self, pdf: Bytes, filename: &str) -> Result<Bytes, UpstreamError> {
        let mut attempt = 0;
        loop {
            match self.inner.summarize(pdf.clone(), filename).await {
                Ok(summary) => return Ok(summary),
                Err(err) if self.policy.should_retry(&err, attempt) => {
                    self.back_off("summarize", &err, attempt).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn extract_text(&self, pdf: Bytes, filename: &str) -> Result<String, UpstreamError> {
        let mut attempt = 0;
        loop {
            match self.inner.extract_text(pdf.clone(), filename).await {
                Ok(text) => return Ok(text),
                Err(err) if self.policy.should_retry(&err, attempt) => {
                    self.back_off("extract_text", &err, attempt).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

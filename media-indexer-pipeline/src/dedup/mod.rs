//! Reindex collaborator.
//!
//! The dedup service keeps its own view of the media index. It is told to
//! refresh that view after writes, either once per run or once per document.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, instrument};

/// Errors reported by a reindex collaborator.
#[derive(Error, Debug, Clone)]
pub enum ReindexError {
    /// The request could not be sent or the response could not be read.
    #[error("Reindex request failed: {0}")]
    Request(String),

    /// The collaborator answered with a non-success status.
    #[error("Reindex rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// External collaborator refreshing the dedup view of the index.
#[async_trait]
pub trait Reindexer: Send + Sync {
    /// Rebuild the dedup view of the whole index.
    async fn reindex_all(&self) -> Result<(), ReindexError>;

    /// Refresh the dedup view after `document_id` was written.
    async fn reindex_after(&self, document_id: &str) -> Result<(), ReindexError> {
        debug!(doc_id = %document_id, "Reindexing after document");
        self.reindex_all().await
    }
}

/// Reindexer that does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReindexer;

#[async_trait]
impl Reindexer for NoopReindexer {
    async fn reindex_all(&self) -> Result<(), ReindexError> {
        Ok(())
    }
}

/// Reindexer calling the dedup service over HTTP.
pub struct HttpReindexer {
    client: reqwest::Client,
    url: String,
    index_name: String,
}

impl HttpReindexer {
    pub fn new(url: impl Into<String>, index_name: impl Into<String>) -> Result<Self, ReindexError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|e| ReindexError::Request(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
            index_name: index_name.into(),
        })
    }
}

#[async_trait]
impl Reindexer for HttpReindexer {
    #[instrument(skip(self), fields(url = %self.url))]
    async fn reindex_all(&self) -> Result<(), ReindexError> {
        let response = self
            .client
            .post(&self.url)
            .json(&json!({ "index_name": self.index_name }))
            .send()
            .await
            .map_err(|e| ReindexError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ReindexError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        debug!(status = status.as_u16(), "Reindex accepted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingReindexer {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Reindexer for CountingReindexer {
        async fn reindex_all(&self) -> Result<(), ReindexError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_reindex_after_defaults_to_reindex_all() {
        let reindexer = CountingReindexer::default();
        reindexer.reindex_after("getty_1").await.unwrap();
        reindexer.reindex_after("getty_2").await.unwrap();
        assert_eq!(reindexer.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_noop_reindexer() {
        assert!(NoopReindexer.reindex_all().await.is_ok());
        assert!(NoopReindexer.reindex_after("getty_1").await.is_ok());
    }

    #[test]
    fn test_rejected_message() {
        let err = ReindexError::Rejected {
            status: 503,
            body: "busy".into(),
        };
        assert_eq!(err.to_string(), "Reindex rejected with status 503: busy");
    }
}

//! Loader module for the media indexer pipeline.
//!
//! Loads canonical documents into the media index, either strictly (one
//! document at a time, aborting on the first error) or concurrently (batched
//! bulk requests from a worker pool, isolating failures per item).

mod concurrent;
mod strict;

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, Stream, StreamExt};
use tracing::{debug, error, info, instrument, warn};

use crate::dedup::Reindexer;
use crate::errors::PipelineError;
use media_indexer_repository::{BulkItem, BulkSummary, IndexStore, IndexStoreError};
use media_indexer_shared::CanonicalDocument;

/// How documents are written to the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadStrategy {
    /// One document at a time, with a refresh and reindex after each one.
    #[default]
    Strict,
    /// Batched bulk requests from a pool of workers.
    Concurrent,
}

impl FromStr for LoadStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "strict" | "aggressive" => Ok(Self::Strict),
            "concurrent" | "parallel" => Ok(Self::Concurrent),
            other => Err(format!("unknown load strategy: {other}")),
        }
    }
}

/// Configuration for the bulk loader.
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    pub strategy: LoadStrategy,
    /// Number of bulk workers in the concurrent strategy.
    pub workers: usize,
    /// Maximum number of documents per bulk request.
    pub chunk_size: usize,
    /// Maximum estimated size of a bulk request, in bytes.
    pub max_chunk_bytes: usize,
    /// Maximum number of retry attempts for failed indexing operations.
    pub max_retries: u32,
    /// Initial retry delay in milliseconds.
    pub initial_retry_delay_ms: u64,
    /// Maximum retry delay in milliseconds.
    pub max_retry_delay_ms: u64,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            strategy: LoadStrategy::Strict,
            workers: 4,
            chunk_size: 100,
            max_chunk_bytes: 100 * 1024 * 1024,
            max_retries: 3,
            initial_retry_delay_ms: 100,
            max_retry_delay_ms: 5000,
        }
    }
}

/// Outcome of a load run.
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Documents successfully written.
    pub inserted: usize,
    /// Documents (or input items) that could not be written.
    pub failed: usize,
    /// The first failure of the run.
    pub first_error: Option<PipelineError>,
    /// Whether the run stopped before the input was exhausted.
    pub aborted: bool,
}

impl LoadReport {
    fn record_failure(&mut self, error: PipelineError) {
        self.failed += 1;
        if self.first_error.is_none() {
            self.first_error = Some(error);
        }
    }

    fn abort(&mut self, error: PipelineError) {
        self.record_failure(error);
        self.aborted = true;
    }

    /// Whether the run aborted because the transport failed.
    pub fn transport_failed(&self) -> bool {
        self.aborted && self.first_error.as_ref().is_some_and(PipelineError::is_transport)
    }
}

/// Loader that writes documents into the media index.
pub struct BulkLoader {
    store: Arc<dyn IndexStore>,
    reindexer: Arc<dyn Reindexer>,
    index: String,
    config: LoaderConfig,
}

impl BulkLoader {
    pub fn new(
        store: Arc<dyn IndexStore>,
        reindexer: Arc<dyn Reindexer>,
        index: impl Into<String>,
        config: LoaderConfig,
    ) -> Self {
        Self {
            store,
            reindexer,
            index: index.into(),
            config,
        }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Load every document of `documents`.
    ///
    /// The first item is pulled before any write. If it is an error the run
    /// fails with that error and nothing is written. An empty input yields an
    /// empty report.
    #[instrument(skip_all, fields(index = %self.index, strategy = ?self.config.strategy))]
    pub async fn load<S>(&self, documents: S) -> Result<LoadReport, PipelineError>
    where
        S: Stream<Item = Result<CanonicalDocument, PipelineError>> + Send,
    {
        let mut documents = documents.boxed();

        let first = match documents.next().await {
            None => {
                info!("No documents to load");
                return Ok(LoadReport::default());
            }
            Some(Err(e)) => {
                error!(error = %e, "First document failed; nothing loaded");
                return Err(e);
            }
            Some(Ok(doc)) => doc,
        };
        let documents = stream::iter([Ok(first)]).chain(documents).boxed();

        let report = match self.config.strategy {
            LoadStrategy::Strict => self.load_strict(documents).await,
            LoadStrategy::Concurrent => self.load_concurrent(documents).await,
        };

        info!(
            inserted = report.inserted,
            failed = report.failed,
            aborted = report.aborted,
            "Load finished"
        );
        Ok(report)
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.config.max_retries,
            initial_delay_ms: self.config.initial_retry_delay_ms,
            max_delay_ms: self.config.max_retry_delay_ms,
        }
    }
}

/// Exponential backoff settings for transient store errors.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RetryPolicy {
    max_retries: u32,
    initial_delay_ms: u64,
    max_delay_ms: u64,
}

impl RetryPolicy {
    /// Bulk index a batch with exponential backoff retry logic.
    pub(crate) async fn bulk_index(
        &self,
        store: &dyn IndexStore,
        index: &str,
        batch: &[BulkItem],
    ) -> Result<BulkSummary, IndexStoreError> {
        let mut delay_ms = self.initial_delay_ms;

        for attempt in 0..=self.max_retries {
            match store.bulk_index(index, batch).await {
                Ok(summary) => {
                    if attempt > 0 {
                        info!(attempt, count = batch.len(), "Bulk index succeeded after retry");
                    }
                    return Ok(summary);
                }
                Err(e) if !is_retryable_error(&e) || attempt == self.max_retries => {
                    debug!(error = %e, attempt, "Giving up on bulk index");
                    return Err(e);
                }
                Err(e) => {
                    warn!(
                        attempt = attempt + 1,
                        max_retries = self.max_retries,
                        delay_ms,
                        error = %e,
                        "Bulk index failed, retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    delay_ms = std::cmp::min(delay_ms * 2, self.max_delay_ms);
                }
            }
        }

        Err(IndexStoreError::bulk_operation("Unknown error after retries"))
    }

    /// Index a single document with exponential backoff retry logic.
    pub(crate) async fn index_document(
        &self,
        store: &dyn IndexStore,
        index: &str,
        item: &BulkItem,
    ) -> Result<(), IndexStoreError> {
        let mut delay_ms = self.initial_delay_ms;

        for attempt in 0..=self.max_retries {
            match store.index_document(index, &item.id, &item.body).await {
                Ok(()) => {
                    if attempt > 0 {
                        debug!(attempt, doc_id = %item.id, "Document index succeeded after retry");
                    }
                    return Ok(());
                }
                Err(e) if !is_retryable_error(&e) || attempt == self.max_retries => {
                    debug!(error = %e, attempt, doc_id = %item.id, "Giving up on document");
                    return Err(e);
                }
                Err(e) => {
                    debug!(
                        attempt = attempt + 1,
                        max_retries = self.max_retries,
                        delay_ms,
                        doc_id = %item.id,
                        error = %e,
                        "Document index failed, retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    delay_ms = std::cmp::min(delay_ms * 2, self.max_delay_ms);
                }
            }
        }

        Err(IndexStoreError::index("Unknown error after retries"))
    }
}

/// Determine if an error is retryable (transient failures).
fn is_retryable_error(error: &IndexStoreError) -> bool {
    match error {
        IndexStoreError::ConnectionError(_) => true,
        // A truncated or garbled response usually means the node was overloaded.
        IndexStoreError::ParseError(_) => true,
        IndexStoreError::BulkOperationError(msg) | IndexStoreError::IndexError(msg) => {
            let msg = msg.to_lowercase();
            msg.contains("rate limit")
                || msg.contains("timeout")
                || msg.contains("connection")
                || msg.contains("503")
                || msg.contains("429")
        }
        IndexStoreError::ValidationError(_)
        | IndexStoreError::IndexAlreadyExists(_)
        | IndexStoreError::IndexMissing(_)
        | IndexStoreError::LifecycleError(_)
        | IndexStoreError::RefreshError(_)
        | IndexStoreError::Unknown(_) => false,
    }
}

//! Streaming source adapter.
//!
//! Pulls raw events from an [`EventTransport`], normalizes artifacts and
//! yields canonical documents. Events that cannot be decoded or normalized
//! are dead-lettered and skipped. A transport failure is yielded once and
//! ends the stream.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::Stream;
use tracing::{debug, error, info, warn};

use crate::consumer::dead_letter::{DeadLetter, DeadLetterSink};
use crate::consumer::transport::EventTransport;
use crate::errors::PipelineError;
use crate::processor::Normalizer;
use media_indexer_shared::{CanonicalDocument, StreamEvent};

/// Configuration for the streaming adapter.
#[derive(Debug, Clone, Copy)]
pub struct StreamConfig {
    /// Longest wait for a single event.
    pub read_timeout: Duration,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(600),
        }
    }
}

/// Snapshot of the adapter's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub received: u64,
    pub forwarded: u64,
    pub skipped: u64,
    pub dead_lettered: u64,
}

/// Live counters, shared with whoever needs them after the adapter is consumed.
#[derive(Debug, Default)]
pub struct StreamCounters {
    received: AtomicU64,
    forwarded: AtomicU64,
    skipped: AtomicU64,
    dead_lettered: AtomicU64,
}

impl StreamCounters {
    pub fn snapshot(&self) -> StreamStats {
        StreamStats {
            received: self.received.load(Ordering::Relaxed),
            forwarded: self.forwarded.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            dead_lettered: self.dead_lettered.load(Ordering::Relaxed),
        }
    }
}

/// Adapter from an event transport to a stream of canonical documents.
pub struct ArtifactStreamAdapter<T> {
    transport: T,
    normalizer: Arc<Normalizer>,
    dead_letters: Arc<dyn DeadLetterSink>,
    config: StreamConfig,
    counters: Arc<StreamCounters>,
    done: bool,
}

impl<T: EventTransport + 'static> ArtifactStreamAdapter<T> {
    pub fn new(
        transport: T,
        normalizer: Arc<Normalizer>,
        dead_letters: Arc<dyn DeadLetterSink>,
        config: StreamConfig,
    ) -> Self {
        Self {
            transport,
            normalizer,
            dead_letters,
            config,
            counters: Arc::new(StreamCounters::default()),
            done: false,
        }
    }

    pub fn counters(&self) -> Arc<StreamCounters> {
        self.counters.clone()
    }

    /// Read until the next document, the end of the stream, or a transport failure.
    pub async fn next_document(&mut self) -> Option<Result<CanonicalDocument, PipelineError>> {
        loop {
            if self.done {
                return None;
            }

            let payload = match self.transport.next_event(self.config.read_timeout).await {
                Ok(Some(payload)) => payload,
                Ok(None) => {
                    info!(stats = ?self.counters.snapshot(), "Event stream exhausted");
                    self.done = true;
                    return None;
                }
                Err(e) => {
                    error!(kind = %e.kind, error = %e, "Transport failure; ending stream");
                    self.done = true;
                    return Some(Err(e.into()));
                }
            };
            self.counters.received.fetch_add(1, Ordering::Relaxed);

            match self.decode(&payload).await {
                Ok(Some(doc)) => {
                    self.counters.forwarded.fetch_add(1, Ordering::Relaxed);
                    return Some(Ok(doc));
                }
                Ok(None) => {
                    self.counters.skipped.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => self.dead_letter(&payload, e).await,
            }
        }
    }

    /// Turn the adapter into a stream of documents.
    pub fn into_stream(self) -> impl Stream<Item = Result<CanonicalDocument, PipelineError>> + Send {
        futures::stream::unfold(self, |mut adapter| async move {
            adapter.next_document().await.map(|item| (item, adapter))
        })
    }

    /// Thumbnail work runs on the blocking pool.
    async fn decode(&self, payload: &[u8]) -> Result<Option<CanonicalDocument>, PipelineError> {
        let event: StreamEvent =
            serde_json::from_slice(payload).map_err(|e| PipelineError::decode(e.to_string()))?;
        let normalizer = self.normalizer.clone();
        tokio::task::spawn_blocking(move || normalizer.normalize_event(&event))
            .await
            .map_err(|e| PipelineError::normalization(format!("normalizer task failed: {e}")))?
    }

    async fn dead_letter(&self, payload: &[u8], error: PipelineError) {
        let count = self.counters.dead_lettered.fetch_add(1, Ordering::Relaxed) + 1;
        warn!(
            error = %error,
            payload = %String::from_utf8_lossy(payload),
            dead_lettered = count,
            "Rejected event"
        );

        if let Err(e) = self.dead_letters.send(DeadLetter::new(payload, &error)).await {
            error!(error = %e, "Failed to write dead letter");
        }
        debug!("Continuing with next event");
    }
}

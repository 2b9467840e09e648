//! Concurrent load strategy.
//!
//! A batching stage feeds a bounded channel drained by a fixed pool of bulk
//! workers. Failures are isolated to the items they concern; only a
//! transport failure in the input stops intake.

use std::sync::{Arc, Mutex as StdMutex};

use futures::stream::{BoxStream, StreamExt};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::{BulkLoader, LoadReport, RetryPolicy};
use crate::errors::PipelineError;
use media_indexer_repository::{BulkItem, IndexStore, IndexStoreError};
use media_indexer_shared::CanonicalDocument;

type BatchReceiver = Arc<Mutex<mpsc::Receiver<Vec<BulkItem>>>>;

/// Groups items into batches bounded by count and estimated bytes.
struct Batcher {
    max_items: usize,
    max_bytes: usize,
    items: Vec<BulkItem>,
    bytes: usize,
}

impl Batcher {
    fn new(max_items: usize, max_bytes: usize) -> Self {
        Self {
            max_items: max_items.max(1),
            max_bytes,
            items: Vec::new(),
            bytes: 0,
        }
    }

    /// Add an item, returning a batch when one is complete.
    fn push(&mut self, item: BulkItem) -> Option<Vec<BulkItem>> {
        let size = item.estimated_size();
        let mut full = None;

        if !self.items.is_empty() && self.bytes + size > self.max_bytes {
            full = Some(self.take());
        }
        self.bytes += size;
        self.items.push(item);

        // With max_items == 1 the byte flush above never fires, so at most
        // one batch is ready per push.
        if full.is_none() && self.items.len() >= self.max_items {
            full = Some(self.take());
        }
        full
    }

    fn finish(mut self) -> Option<Vec<BulkItem>> {
        (!self.items.is_empty()).then(|| self.take())
    }

    fn take(&mut self) -> Vec<BulkItem> {
        self.bytes = 0;
        std::mem::take(&mut self.items)
    }
}

/// State shared by the bulk workers.
struct BatchWriter {
    store: Arc<dyn IndexStore>,
    index: String,
    retry: RetryPolicy,
    first_error: StdMutex<Option<PipelineError>>,
}

impl BatchWriter {
    fn record_error(&self, error: PipelineError) {
        if let Ok(mut slot) = self.first_error.lock() {
            if slot.is_none() {
                *slot = Some(error);
            }
        }
    }

    /// Write one batch, returning `(inserted, failed)`.
    async fn write(&self, worker: usize, batch: Vec<BulkItem>) -> (usize, usize) {
        match self
            .retry
            .bulk_index(self.store.as_ref(), &self.index, &batch)
            .await
        {
            Ok(summary) => {
                for result in summary.results.into_iter().filter(|r| !r.success) {
                    let error = result
                        .error
                        .unwrap_or_else(|| IndexStoreError::unknown("item rejected"));
                    warn!(worker, doc_id = %result.id, error = %error, "Document rejected");
                    self.record_error(error.into());
                }
                debug!(worker, succeeded = summary.succeeded, failed = summary.failed, "Batch written");
                (summary.succeeded, summary.failed)
            }
            Err(e) => {
                error!(worker, count = batch.len(), error = %e, "Batch failed");
                self.record_error(e.into());
                (0, batch.len())
            }
        }
    }
}

async fn run_worker(worker: usize, batches: BatchReceiver, writer: Arc<BatchWriter>) -> (usize, usize) {
    let mut inserted = 0;
    let mut failed = 0;

    loop {
        let batch = { batches.lock().await.recv().await };
        let Some(batch) = batch else { break };

        let (ok, bad) = writer.write(worker, batch).await;
        inserted += ok;
        failed += bad;
    }

    debug!(worker, inserted, failed, "Worker finished");
    (inserted, failed)
}

impl BulkLoader {
    pub(super) async fn load_concurrent(
        &self,
        mut documents: BoxStream<'_, Result<CanonicalDocument, PipelineError>>,
    ) -> LoadReport {
        let workers = self.config.workers.max(1);
        let (tx, rx) = mpsc::channel::<Vec<BulkItem>>(workers * 2);
        let batches: BatchReceiver = Arc::new(Mutex::new(rx));
        let writer = Arc::new(BatchWriter {
            store: self.store.clone(),
            index: self.index.clone(),
            retry: self.retry_policy(),
            first_error: StdMutex::new(None),
        });

        let handles: Vec<JoinHandle<(usize, usize)>> = (0..workers)
            .map(|worker| tokio::spawn(run_worker(worker, batches.clone(), writer.clone())))
            .collect();
        info!(workers, chunk_size = self.config.chunk_size, "Started bulk workers");

        // Intake failures take precedence over worker failures as first_error.
        let mut intake = LoadReport::default();
        let mut batcher = Batcher::new(self.config.chunk_size, self.config.max_chunk_bytes);

        while let Some(next) = documents.next().await {
            let item = match next.and_then(|doc| BulkItem::try_from(&doc).map_err(Into::into)) {
                Ok(item) => item,
                Err(e) if e.is_transport() => {
                    error!(error = %e, "Transport failed; stopping intake");
                    intake.abort(e);
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "Skipping document");
                    intake.record_failure(e);
                    continue;
                }
            };

            if let Some(batch) = batcher.push(item) {
                if tx.send(batch).await.is_err() {
                    intake.abort(PipelineError::channel("all bulk workers stopped"));
                    break;
                }
            }
        }
        if let Some(batch) = batcher.finish() {
            if tx.send(batch).await.is_err() {
                intake.abort(PipelineError::channel("all bulk workers stopped"));
            }
        }
        drop(tx);

        let mut report = intake;
        for handle in handles {
            match handle.await {
                Ok((inserted, failed)) => {
                    report.inserted += inserted;
                    report.failed += failed;
                }
                Err(e) => {
                    error!(error = %e, "Bulk worker panicked");
                    report.record_failure(PipelineError::channel(e.to_string()));
                }
            }
        }

        if report.first_error.is_none() {
            report.first_error = writer.first_error.lock().ok().and_then(|mut slot| slot.take());
        }

        if let Err(e) = self.store.refresh(&self.index).await {
            let e = PipelineError::RefreshError(e);
            warn!(error = %e, "Closing refresh failed");
        }

        report
    }
}

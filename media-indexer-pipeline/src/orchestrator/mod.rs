//! Orchestrator module for the media indexer pipeline.
//!
//! Runs one ingest end to end: prepares the index, feeds a source through the
//! normalizer into the loader, then refreshes, counts and reindexes.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tracing::{error, info, instrument, warn};

use crate::consumer::{ArtifactStreamAdapter, DumpSource, EventTransport, StreamStats};
use crate::dedup::Reindexer;
use crate::errors::PipelineError;
use crate::loader::{BulkLoader, LoadReport};
use crate::processor::Normalizer;
use media_indexer_repository::IndexLifecycleManager;

/// Exit status used when the process is forced down after a transport failure.
const FORCE_EXIT_CODE: i32 = 1;

/// What happens after the stream transport fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportFailurePolicy {
    /// Return the error to the caller.
    #[default]
    Propagate,
    /// Log, wait `grace`, then exit the process with a non-zero status.
    ///
    /// Works around transport clients that cannot shut down cleanly after a
    /// failure. Prefer `Propagate` under a supervisor that restarts workers.
    ForceExit { grace: Duration },
}

/// Configuration for the orchestrator.
#[derive(Debug, Clone, Default)]
pub struct OrchestratorConfig {
    /// Ask the reindex collaborator to rebuild after every completed run.
    pub auto_reindex: bool,
    pub transport_failure: TransportFailurePolicy,
}

/// Outcome of an ingest run.
#[derive(Debug, Default)]
pub struct IngestSummary {
    pub inserted: usize,
    pub failed: usize,
    pub aborted: bool,
    pub first_error: Option<PipelineError>,
    /// Documents visible in the index after the closing refresh.
    pub indexed_total: Option<u64>,
    pub stream: Option<StreamStats>,
}

/// Orchestrator that coordinates the pipeline components.
pub struct Orchestrator {
    manager: IndexLifecycleManager,
    loader: BulkLoader,
    normalizer: Arc<Normalizer>,
    reindexer: Arc<dyn Reindexer>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(
        manager: IndexLifecycleManager,
        loader: BulkLoader,
        normalizer: Arc<Normalizer>,
        reindexer: Arc<dyn Reindexer>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            manager,
            loader,
            normalizer,
            reindexer,
            config,
        }
    }

    pub fn manager(&self) -> &IndexLifecycleManager {
        &self.manager
    }

    /// Load a dataset dump.
    ///
    /// With `delete_current` the index is dropped and recreated first.
    #[instrument(skip(self, path), fields(index = %self.manager.index_name()))]
    pub async fn ingest_dump(
        &self,
        path: impl Into<PathBuf>,
        max_count: Option<usize>,
        delete_current: bool,
    ) -> Result<IngestSummary, PipelineError> {
        let path = path.into();
        info!(path = %path.display(), "Starting dump ingest");

        self.manager.prepare(delete_current).await?;

        // Thumbnail work runs on the blocking pool.
        let normalizer = self.normalizer.clone();
        let documents = DumpSource::open(path, max_count).then(move |record| {
            let normalizer = normalizer.clone();
            async move {
                let record = record?;
                tokio::task::spawn_blocking(move || normalizer.normalize_dump(record))
                    .await
                    .map_err(|e| PipelineError::normalization(format!("normalizer task failed: {e}")))?
            }
        });

        let report = self.loader.load(documents).await?;
        self.finish(report, None).await
    }

    /// Load artifacts from the event stream until it is exhausted or fails.
    #[instrument(skip(self, adapter), fields(index = %self.manager.index_name()))]
    pub async fn ingest_stream<T>(
        &self,
        adapter: ArtifactStreamAdapter<T>,
    ) -> Result<IngestSummary, PipelineError>
    where
        T: EventTransport + 'static,
    {
        info!("Starting stream ingest");
        self.manager.prepare(false).await?;

        let counters = adapter.counters();
        let result = self.loader.load(adapter.into_stream()).await;
        let stats = counters.snapshot();

        let mut report = match result {
            Ok(report) => report,
            Err(e) => {
                if e.is_transport() {
                    self.on_transport_failure(&e, 0, stats).await;
                }
                return Err(e);
            }
        };

        if report.transport_failed() {
            if let Some(e) = report.first_error.take() {
                self.on_transport_failure(&e, report.inserted, stats).await;
                return Err(e);
            }
        }

        self.finish(report, Some(stats)).await
    }

    async fn on_transport_failure(&self, error: &PipelineError, inserted: usize, stats: StreamStats) {
        error!(
            error = %error,
            inserted,
            stats = ?stats,
            "Stream transport failed; ending run"
        );

        if let TransportFailurePolicy::ForceExit { grace } = self.config.transport_failure {
            warn!(grace_ms = grace.as_millis() as u64, "Forcing process exit");
            tokio::time::sleep(grace).await;
            std::process::exit(FORCE_EXIT_CODE);
        }
    }

    /// Closing refresh, count and (for completed runs) reindex.
    async fn finish(
        &self,
        report: LoadReport,
        stream: Option<StreamStats>,
    ) -> Result<IngestSummary, PipelineError> {
        if let Err(e) = self.manager.refresh().await {
            let e = PipelineError::RefreshError(e);
            warn!(error = %e, "Closing refresh failed");
        }

        let indexed_total = match self.manager.count().await {
            Ok(count) => Some(count),
            Err(e) => {
                warn!(error = %e, "Failed to count documents");
                None
            }
        };

        if report.aborted {
            warn!(error = ?report.first_error, "Run aborted; skipping reindex");
        } else if self.config.auto_reindex {
            info!("Reindexing");
            if let Err(e) = self.reindexer.reindex_all().await {
                let e = PipelineError::from(e);
                warn!(error = %e, "Reindex failed");
            }
        }

        info!(
            inserted = report.inserted,
            failed = report.failed,
            indexed_total = ?indexed_total,
            "Ingest finished"
        );

        Ok(IngestSummary {
            inserted: report.inserted,
            failed: report.failed,
            aborted: report.aborted,
            first_error: report.first_error,
            indexed_total,
            stream,
        })
    }
}

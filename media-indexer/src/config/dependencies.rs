//! Dependency initialization and wiring for the media indexer.

use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use super::IndexerConfig;
use crate::IndexingError;
use media_indexer_pipeline::{
    consumer::{
        ArtifactStreamAdapter, DeadLetterSink, JsonlDeadLetterSink, KafkaEventTransport,
        KafkaTransportConfig, LogDeadLetterSink, ResumeToken, StreamConfig,
    },
    dedup::{HttpReindexer, NoopReindexer, Reindexer},
    processor::{Normalizer, NormalizerConfig},
    BulkLoader, Orchestrator, OrchestratorConfig,
};
use media_indexer_repository::{IndexLifecycleManager, IndexStore, OpenSearchClient};

/// Container for all initialized dependencies.
pub struct Dependencies {
    pub config: IndexerConfig,
    /// The configured orchestrator ready to run.
    pub orchestrator: Orchestrator,
    normalizer: Arc<Normalizer>,
}

impl Dependencies {
    /// Connect to OpenSearch and wire the pipeline.
    ///
    /// Fails if the cluster cannot be reached or reports red health.
    pub async fn new(config: IndexerConfig) -> Result<Self, IndexingError> {
        info!(
            opensearch_url = %config.opensearch_url,
            index = %config.index_name,
            strategy = ?config.load_strategy,
            "Initializing dependencies"
        );

        let client = OpenSearchClient::new(&config.opensearch_url, config.credentials())
            .await
            .map_err(|e| IndexingError::config(format!("Failed to create OpenSearch client: {}", e)))?;

        let healthy = client
            .health_check()
            .await
            .map_err(|e| IndexingError::config(format!("OpenSearch health check failed: {}", e)))?;
        if !healthy {
            return Err(IndexingError::config("OpenSearch cluster is unhealthy"));
        }
        info!("OpenSearch connection verified");

        let store: Arc<dyn IndexStore> = Arc::new(client);

        let reindexer: Arc<dyn Reindexer> = match &config.reindex_url {
            Some(url) => Arc::new(
                HttpReindexer::new(url.clone(), config.index_name.clone())
                    .map_err(|e| IndexingError::config(e.to_string()))?,
            ),
            None => Arc::new(NoopReindexer),
        };

        let normalizer = Arc::new(Normalizer::new(NormalizerConfig {
            thumbnail: config.thumbnail_config(),
            policy: config.thumbnail_policy,
        }));

        let manager = IndexLifecycleManager::new(store.clone(), config.index_config());
        let loader = BulkLoader::new(
            store,
            reindexer.clone(),
            config.index_name.clone(),
            config.loader_config(),
        );
        let orchestrator = Orchestrator::new(
            manager,
            loader,
            normalizer.clone(),
            reindexer,
            OrchestratorConfig {
                auto_reindex: config.auto_reindex,
                transport_failure: config.transport_failure_policy(),
            },
        );

        Ok(Self {
            config,
            orchestrator,
            normalizer,
        })
    }

    /// Connect to the event stream.
    pub async fn stream_adapter(
        &self,
        resume: Option<ResumeToken>,
    ) -> Result<ArtifactStreamAdapter<KafkaEventTransport>, IndexingError> {
        let transport = KafkaEventTransport::open(&KafkaTransportConfig {
            host: self.config.stream_host.clone(),
            port: self.config.stream_port,
            topic: self.config.stream_topic.clone(),
            group_id: self.config.stream_group_id.clone(),
            resume,
            stop_at_eof: self.config.stream_stop_at_eof,
        })
        .map_err(|e| IndexingError::config(format!("Failed to connect to event stream: {}", e)))?;

        let dead_letters: Arc<dyn DeadLetterSink> = match &self.config.dead_letter_path {
            Some(path) => Arc::new(JsonlDeadLetterSink::open(path).await?),
            None => Arc::new(LogDeadLetterSink),
        };

        Ok(ArtifactStreamAdapter::new(
            transport,
            self.normalizer.clone(),
            dead_letters,
            StreamConfig {
                read_timeout: Duration::from_secs(self.config.stream_read_timeout_secs),
            },
        ))
    }
}

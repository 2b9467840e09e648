//! # Media Indexer Pipeline
//!
//! This crate provides the pipeline components for ingesting media metadata
//! from dataset dumps and from the artifact event stream into OpenSearch.
//!
//! ## Architecture
//!
//! The pipeline follows the Consumer-Processor-Loader pattern:
//!
//! 1. **Consumer**: Reads dump files or artifact events from Kafka
//! 2. **Processor**: Normalizes records and builds thumbnails
//! 3. **Loader**: Writes documents into the media index
//! 4. **Orchestrator**: Coordinates a run and the post-run reindex

pub mod consumer;
pub mod dedup;
pub mod errors;
pub mod loader;
pub mod orchestrator;
pub mod processor;

#[cfg(test)]
mod test_support;

pub use errors::{PipelineError, TransportError, TransportErrorKind};
pub use loader::{BulkLoader, LoadReport, LoadStrategy, LoaderConfig};
pub use orchestrator::{IngestSummary, Orchestrator, OrchestratorConfig, TransportFailurePolicy};

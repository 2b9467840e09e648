//! # Media Indexer
//!
//! Main library for the media metadata indexer.
//!
//! This crate provides the configuration, dependency wiring and similarity
//! search client behind the `media-indexer` binary.

pub mod config;
pub mod search;

pub use config::{Dependencies, IndexerConfig};

use thiserror::Error;

/// Errors that can occur during indexer initialization or execution.
#[derive(Error, Debug)]
pub enum IndexingError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Pipeline error.
    #[error("Pipeline error: {0}")]
    PipelineError(#[from] media_indexer_pipeline::PipelineError),

    /// Index store error.
    #[error("Index store error: {0}")]
    IndexStoreError(#[from] media_indexer_repository::IndexStoreError),

    /// Similarity search request failed.
    #[error("Search error: {0}")]
    SearchError(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl IndexingError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Create a search error.
    pub fn search(msg: impl Into<String>) -> Self {
        Self::SearchError(msg.into())
    }
}

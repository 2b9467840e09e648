//! # Media Indexer Repository
//!
//! This crate provides the index store interface used by the ingestion
//! pipeline, the fixed field-mapping schema of the media index, the index
//! lifecycle manager, and a concrete store implementation for OpenSearch.

pub mod config;
pub mod errors;
pub mod interfaces;
pub mod manager;
pub mod opensearch;
pub mod schema;
pub mod types;

pub use config::IndexConfig;
pub use errors::IndexStoreError;
pub use interfaces::IndexStore;
pub use manager::{ExistsPolicy, IndexLifecycleManager, MissingPolicy};
pub use opensearch::OpenSearchClient;
pub use schema::{FieldKind, FieldMapping, IndexSchema};
pub use types::{BulkItem, BulkItemResult, BulkSummary};

//! Index store trait definition.
//!
//! This module defines the abstract interface for document store operations,
//! allowing for different backend implementations (OpenSearch, in-memory, etc.).

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::IndexStoreError;
use crate::schema::IndexSchema;
use crate::types::{BulkItem, BulkSummary};

/// Abstracts the underlying document store.
///
/// Implementations are shared between the loader's workers, so they must be
/// `Send + Sync` and safe to call concurrently.
///
/// All methods return `Result<T, IndexStoreError>` for consistent error handling across
/// different backend implementations.
#[async_trait]
pub trait IndexStore: Send + Sync {
    /// Check whether an index exists.
    async fn index_exists(&self, index: &str) -> Result<bool, IndexStoreError>;

    /// Create an index with the given field-mapping schema.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - If the index was created
    /// * `Err(IndexStoreError::IndexAlreadyExists)` - If the index already exists
    /// * `Err(IndexStoreError)` - If creation fails
    async fn create_index(&self, index: &str, schema: &IndexSchema) -> Result<(), IndexStoreError>;

    /// Delete an index.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - If the index was deleted
    /// * `Err(IndexStoreError::IndexMissing)` - If the index does not exist
    /// * `Err(IndexStoreError)` - If deletion fails
    async fn delete_index(&self, index: &str) -> Result<(), IndexStoreError>;

    /// Index a single document, replacing any document with the same ID.
    async fn index_document(
        &self,
        index: &str,
        id: &str,
        body: &Value,
    ) -> Result<(), IndexStoreError>;

    /// Index multiple documents in a single request and return per-item results.
    ///
    /// # Returns
    ///
    /// * `Ok(BulkSummary)` - Contains aggregate statistics and individual results
    /// * `Err(IndexStoreError)` - If the bulk request fails entirely
    async fn bulk_index(
        &self,
        index: &str,
        batch: &[BulkItem],
    ) -> Result<BulkSummary, IndexStoreError>;

    /// Make all prior writes to the index visible to subsequent reads.
    async fn refresh(&self, index: &str) -> Result<(), IndexStoreError>;

    /// Count the documents visible in the index.
    async fn count(&self, index: &str) -> Result<u64, IndexStoreError>;

    /// Check if the store is healthy and reachable.
    async fn health_check(&self) -> Result<bool, IndexStoreError>;
}

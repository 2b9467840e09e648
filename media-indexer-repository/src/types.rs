//! Request and response types for bulk index operations.

use serde_json::Value;

use crate::errors::IndexStoreError;
use media_indexer_shared::CanonicalDocument;

/// One document of a bulk index request.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkItem {
    /// The document ID in the index.
    pub id: String,
    /// The document body.
    pub body: Value,
}

impl BulkItem {
    pub fn new(id: impl Into<String>, body: Value) -> Self {
        Self {
            id: id.into(),
            body,
        }
    }

    /// Approximate size of this item in a bulk request body, in bytes.
    ///
    /// Counts the serialized body plus the action line that precedes it.
    pub fn estimated_size(&self) -> usize {
        const ACTION_LINE_OVERHEAD: usize = 32;
        serde_json::to_vec(&self.body).map(|b| b.len()).unwrap_or(0)
            + self.id.len()
            + ACTION_LINE_OVERHEAD
    }
}

impl TryFrom<&CanonicalDocument> for BulkItem {
    type Error = IndexStoreError;

    fn try_from(doc: &CanonicalDocument) -> Result<Self, Self::Error> {
        if doc.id.is_empty() {
            return Err(IndexStoreError::validation("document id is required"));
        }
        let body = doc
            .to_body()
            .map_err(|e| IndexStoreError::validation(format!("Invalid document body: {}", e)))?;
        Ok(Self::new(doc.id.clone(), body))
    }
}

/// Result of a bulk operation for a single item.
#[derive(Debug, Clone)]
pub struct BulkItemResult {
    /// The document ID.
    pub id: String,
    /// Whether the operation succeeded.
    pub success: bool,
    /// Error if the operation failed.
    pub error: Option<IndexStoreError>,
}

impl BulkItemResult {
    pub fn ok(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            success: true,
            error: None,
        }
    }

    pub fn failed(id: impl Into<String>, error: IndexStoreError) -> Self {
        Self {
            id: id.into(),
            success: false,
            error: Some(error),
        }
    }
}

/// Summary of a bulk operation containing aggregate statistics and individual results.
///
/// Partial failures are reported per item so callers can handle them without
/// discarding the items that succeeded.
#[derive(Debug, Clone, Default)]
pub struct BulkSummary {
    /// Total number of items in the batch.
    pub total: usize,
    /// Number of successful operations.
    pub succeeded: usize,
    /// Number of failed operations.
    pub failed: usize,
    /// Individual results for each item.
    pub results: Vec<BulkItemResult>,
}

impl BulkSummary {
    /// Build a summary from individual results.
    pub fn from_results(results: Vec<BulkItemResult>) -> Self {
        let succeeded = results.iter().filter(|r| r.success).count();
        Self {
            total: results.len(),
            succeeded,
            failed: results.len() - succeeded,
            results,
        }
    }
}

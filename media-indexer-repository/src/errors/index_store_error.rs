//! Index store error types.
//!
//! This module defines the error types that can occur during index store operations.

use thiserror::Error;

/// Errors that can occur during index store operations.
#[derive(Debug, Clone, Error)]
pub enum IndexStoreError {
    /// Validation error (e.g., missing required fields).
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Failed to establish connection to the index store.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The index already exists.
    #[error("Index already exists: {0}")]
    IndexAlreadyExists(String),

    /// The index does not exist.
    #[error("Index missing: {0}")]
    IndexMissing(String),

    /// Failed to create or delete an index.
    #[error("Index lifecycle error: {0}")]
    LifecycleError(String),

    /// Failed to index a document.
    #[error("Index error: {0}")]
    IndexError(String),

    /// Bulk operation failed as a whole.
    #[error("Bulk operation error: {0}")]
    BulkOperationError(String),

    /// Failed to refresh an index.
    #[error("Refresh error: {0}")]
    RefreshError(String),

    /// Failed to parse a response from the index store.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Unknown error.
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl IndexStoreError {
    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::ConnectionError(msg.into())
    }

    /// Create a lifecycle error.
    pub fn lifecycle(msg: impl Into<String>) -> Self {
        Self::LifecycleError(msg.into())
    }

    /// Create an index error.
    pub fn index(msg: impl Into<String>) -> Self {
        Self::IndexError(msg.into())
    }

    /// Create a bulk operation error.
    pub fn bulk_operation(msg: impl Into<String>) -> Self {
        Self::BulkOperationError(msg.into())
    }

    /// Create a refresh error.
    pub fn refresh(msg: impl Into<String>) -> Self {
        Self::RefreshError(msg.into())
    }

    /// Create a parse error.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }

    /// Create an unknown error.
    pub fn unknown(msg: impl Into<String>) -> Self {
        Self::Unknown(msg.into())
    }
}

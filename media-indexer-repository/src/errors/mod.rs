//! Error types for the media indexer repository.

mod index_store_error;

pub use index_store_error::IndexStoreError;

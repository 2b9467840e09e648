//! OpenSearch implementation of the index store.
//!
//! This module provides a concrete implementation of `IndexStore`
//! using OpenSearch as the backend.

mod client;
mod index_config;

pub use client::OpenSearchClient;
pub use index_config::get_index_settings;

//! Configuration types for the media index.

use crate::schema::IndexSchema;

/// Default name of the media index.
pub const DEFAULT_INDEX_NAME: &str = "getty_test";

/// Configuration of the target index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexConfig {
    /// Name of the index.
    pub name: String,
    /// Number of primary shards used when the index is created.
    pub number_of_shards: u32,
    /// Number of replicas used when the index is created.
    pub number_of_replicas: u32,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_INDEX_NAME.to_string(),
            number_of_shards: 1,
            number_of_replicas: 0,
        }
    }
}

impl IndexConfig {
    /// Create a config for the named index with default sharding.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// The media schema with this config's sharding settings.
    pub fn schema(&self) -> IndexSchema {
        IndexSchema::media(self.number_of_shards, self.number_of_replicas)
    }
}

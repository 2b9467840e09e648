//! Index lifecycle management.
//!
//! The lifecycle manager is the only component that creates or destroys the
//! media index. Whether an index that already exists (or is already gone) is
//! an error is decided by the caller through [`ExistsPolicy`] and
//! [`MissingPolicy`].

use std::sync::Arc;
use tracing::{info, instrument};

use crate::config::IndexConfig;
use crate::errors::IndexStoreError;
use crate::interfaces::IndexStore;
use crate::schema::IndexSchema;

/// What `create_index` does when the index already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExistsPolicy {
    /// Leave the existing index alone.
    Ignore,
    /// Fail with `IndexAlreadyExists`.
    Fail,
}

/// What `delete_index` does when the index does not exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingPolicy {
    /// Treat the missing index as already deleted.
    Ignore,
    /// Fail with `IndexMissing`.
    Fail,
}

/// Creates, deletes and refreshes the configured index.
pub struct IndexLifecycleManager {
    store: Arc<dyn IndexStore>,
    config: IndexConfig,
    schema: IndexSchema,
}

impl IndexLifecycleManager {
    /// Create a manager for the index described by `config`.
    pub fn new(store: Arc<dyn IndexStore>, config: IndexConfig) -> Self {
        let schema = config.schema();
        Self {
            store,
            config,
            schema,
        }
    }

    pub fn index_name(&self) -> &str {
        &self.config.name
    }

    pub fn schema(&self) -> &IndexSchema {
        &self.schema
    }

    /// Create the index with the media schema.
    ///
    /// Returns `true` if the index was created by this call.
    #[instrument(skip(self), fields(index = %self.config.name))]
    pub async fn create_index(&self, policy: ExistsPolicy) -> Result<bool, IndexStoreError> {
        let name = &self.config.name;

        if self.store.index_exists(name).await? {
            return match policy {
                ExistsPolicy::Ignore => Ok(false),
                ExistsPolicy::Fail => Err(IndexStoreError::IndexAlreadyExists(name.clone())),
            };
        }

        info!("Creating index");
        match self.store.create_index(name, &self.schema).await {
            Ok(()) => Ok(true),
            // Another process created it between the check and the create.
            Err(IndexStoreError::IndexAlreadyExists(_)) if policy == ExistsPolicy::Ignore => {
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Delete the index.
    ///
    /// Returns `true` if the index was deleted by this call.
    #[instrument(skip(self), fields(index = %self.config.name))]
    pub async fn delete_index(&self, policy: MissingPolicy) -> Result<bool, IndexStoreError> {
        let name = &self.config.name;

        if !self.store.index_exists(name).await? {
            return match policy {
                MissingPolicy::Ignore => Ok(false),
                MissingPolicy::Fail => Err(IndexStoreError::IndexMissing(name.clone())),
            };
        }

        info!("Deleting index");
        match self.store.delete_index(name).await {
            Ok(()) => Ok(true),
            Err(IndexStoreError::IndexMissing(_)) if policy == MissingPolicy::Ignore => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Make all prior writes visible to subsequent reads.
    pub async fn refresh(&self) -> Result<(), IndexStoreError> {
        self.store.refresh(&self.config.name).await
    }

    /// Count the documents visible in the index.
    pub async fn count(&self) -> Result<u64, IndexStoreError> {
        self.store.count(&self.config.name).await
    }

    /// Prepare the index for a load run: optionally drop it, then make sure it exists.
    pub async fn prepare(&self, delete_current: bool) -> Result<(), IndexStoreError> {
        if delete_current {
            self.delete_index(MissingPolicy::Ignore).await?;
        }
        self.create_index(ExistsPolicy::Ignore).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BulkItem, BulkSummary};
    use async_trait::async_trait;
    use serde_json::Value;
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// Mock store that only tracks which indices exist.
    #[derive(Default)]
    struct MockStore {
        indices: Mutex<HashSet<String>>,
        created: Mutex<Vec<IndexSchema>>,
        /// Report the index as missing on the existence check, then
        /// fail creation as if another process won the race.
        lose_create_race: bool,
    }

    #[async_trait]
    impl IndexStore for MockStore {
        async fn index_exists(&self, index: &str) -> Result<bool, IndexStoreError> {
            Ok(self.indices.lock().unwrap().contains(index))
        }

        async fn create_index(
            &self,
            index: &str,
            schema: &IndexSchema,
        ) -> Result<(), IndexStoreError> {
            if self.lose_create_race {
                return Err(IndexStoreError::IndexAlreadyExists(index.to_string()));
            }
            if !self.indices.lock().unwrap().insert(index.to_string()) {
                return Err(IndexStoreError::IndexAlreadyExists(index.to_string()));
            }
            self.created.lock().unwrap().push(schema.clone());
            Ok(())
        }

        async fn delete_index(&self, index: &str) -> Result<(), IndexStoreError> {
            if !self.indices.lock().unwrap().remove(index) {
                return Err(IndexStoreError::IndexMissing(index.to_string()));
            }
            Ok(())
        }

        async fn index_document(
            &self,
            _index: &str,
            _id: &str,
            _body: &Value,
        ) -> Result<(), IndexStoreError> {
            Ok(())
        }

        async fn bulk_index(
            &self,
            _index: &str,
            _batch: &[BulkItem],
        ) -> Result<BulkSummary, IndexStoreError> {
            Ok(BulkSummary::default())
        }

        async fn refresh(&self, _index: &str) -> Result<(), IndexStoreError> {
            Ok(())
        }

        async fn count(&self, _index: &str) -> Result<u64, IndexStoreError> {
            Ok(0)
        }

        async fn health_check(&self) -> Result<bool, IndexStoreError> {
            Ok(true)
        }
    }

    fn manager(store: Arc<MockStore>) -> IndexLifecycleManager {
        IndexLifecycleManager::new(store, IndexConfig::new("media"))
    }

    #[tokio::test]
    async fn test_create_index_is_idempotent() {
        let store = Arc::new(MockStore::default());
        let manager = manager(store.clone());

        assert!(manager.create_index(ExistsPolicy::Ignore).await.unwrap());
        assert!(!manager.create_index(ExistsPolicy::Ignore).await.unwrap());
        assert_eq!(store.created.lock().unwrap().len(), 1);
        assert_eq!(store.created.lock().unwrap()[0], IndexSchema::media(1, 0));
    }

    #[tokio::test]
    async fn test_create_index_fail_policy() {
        let store = Arc::new(MockStore::default());
        let manager = manager(store);

        manager.create_index(ExistsPolicy::Fail).await.unwrap();
        let result = manager.create_index(ExistsPolicy::Fail).await;
        assert!(matches!(result, Err(IndexStoreError::IndexAlreadyExists(name)) if name == "media"));
    }

    #[tokio::test]
    async fn test_create_index_lost_race_is_ignored() {
        let store = Arc::new(MockStore {
            lose_create_race: true,
            ..Default::default()
        });
        let manager = manager(store);

        assert!(!manager.create_index(ExistsPolicy::Ignore).await.unwrap());
        assert!(manager.create_index(ExistsPolicy::Fail).await.is_err());
    }

    #[tokio::test]
    async fn test_delete_index_policies() {
        let store = Arc::new(MockStore::default());
        let manager = manager(store);

        assert!(!manager.delete_index(MissingPolicy::Ignore).await.unwrap());
        assert!(matches!(
            manager.delete_index(MissingPolicy::Fail).await,
            Err(IndexStoreError::IndexMissing(_))
        ));

        manager.create_index(ExistsPolicy::Fail).await.unwrap();
        assert!(manager.delete_index(MissingPolicy::Fail).await.unwrap());
    }

    #[tokio::test]
    async fn test_prepare_recreates_index() {
        let store = Arc::new(MockStore::default());
        let manager = manager(store.clone());

        manager.prepare(false).await.unwrap();
        manager.prepare(false).await.unwrap();
        assert_eq!(store.created.lock().unwrap().len(), 1);

        manager.prepare(true).await.unwrap();
        assert_eq!(store.created.lock().unwrap().len(), 2);
        assert!(store.indices.lock().unwrap().contains("media"));
    }
}

//! OpenSearch client implementation.
//!
//! This module provides the concrete implementation of `IndexStore`
//! using the OpenSearch Rust client.

use async_trait::async_trait;
use opensearch::{
    auth::Credentials,
    cluster::ClusterHealthParts,
    http::request::JsonBody,
    http::response::Response,
    http::transport::{SingleNodeConnectionPool, TransportBuilder},
    indices::{IndicesCreateParts, IndicesDeleteParts, IndicesExistsParts, IndicesRefreshParts},
    BulkParts, CountParts, IndexParts, OpenSearch,
};
use serde_json::{json, Value};
use tracing::{debug, error, info, instrument};
use url::Url;

use crate::errors::IndexStoreError;
use crate::interfaces::IndexStore;
use crate::opensearch::index_config::get_index_settings;
use crate::schema::IndexSchema;
use crate::types::{BulkItem, BulkItemResult, BulkSummary};

/// OpenSearch client implementation.
///
/// # Example
///
/// ```ignore
/// use media_indexer_repository::{IndexConfig, IndexStore, OpenSearchClient};
/// let client = OpenSearchClient::new("http://localhost:9200", None).await?;
/// let config = IndexConfig::new("getty_test");
///
/// client.create_index(&config.name, &config.schema()).await?;
/// client.refresh(&config.name).await?;
/// ```
pub struct OpenSearchClient {
    client: OpenSearch,
}

impl OpenSearchClient {
    /// Create a new OpenSearch client connected to the specified URL.
    ///
    /// # Arguments
    ///
    /// * `url` - The OpenSearch server URL (e.g., "http://localhost:9200")
    /// * `credentials` - Optional basic-auth username and password
    ///
    /// # Returns
    ///
    /// * `Ok(OpenSearchClient)` - A new client instance
    /// * `Err(IndexStoreError)` - If connection setup fails
    pub async fn new(
        url: &str,
        credentials: Option<(String, String)>,
    ) -> Result<Self, IndexStoreError> {
        let parsed_url =
            Url::parse(url).map_err(|e| IndexStoreError::connection(e.to_string()))?;

        let conn_pool = SingleNodeConnectionPool::new(parsed_url);
        let mut builder = TransportBuilder::new(conn_pool).disable_proxy();
        let authenticated = credentials.is_some();
        if let Some((username, password)) = credentials {
            builder = builder.auth(Credentials::Basic(username, password));
        }
        let transport = builder
            .build()
            .map_err(|e| IndexStoreError::connection(e.to_string()))?;

        let client = OpenSearch::new(transport);

        info!(url = %url, authenticated, "Created OpenSearch client");

        Ok(Self { client })
    }

    /// Read the body of a failed response for error reporting.
    async fn error_body(response: Response) -> String {
        response.text().await.unwrap_or_default()
    }

    /// Build the NDJSON body of a bulk index request.
    fn bulk_body(batch: &[BulkItem]) -> Vec<JsonBody<Value>> {
        let mut body: Vec<JsonBody<Value>> = Vec::with_capacity(batch.len() * 2);
        for item in batch {
            body.push(json!({ "index": { "_id": item.id } }).into());
            body.push(item.body.clone().into());
        }
        body
    }

    /// Turn a bulk response into per-item results.
    ///
    /// Items are matched to the request by position, as the bulk API
    /// returns them in request order.
    fn parse_bulk_response(
        response: &Value,
        batch: &[BulkItem],
    ) -> Result<BulkSummary, IndexStoreError> {
        let items = response
            .get("items")
            .and_then(|i| i.as_array())
            .ok_or_else(|| IndexStoreError::parse("Bulk response has no items"))?;

        if items.len() != batch.len() {
            return Err(IndexStoreError::parse(format!(
                "Bulk response has {} items for {} requests",
                items.len(),
                batch.len()
            )));
        }

        let results = items
            .iter()
            .zip(batch)
            .map(|(item, request)| {
                let outcome = item.get("index").unwrap_or(item);
                let id = outcome
                    .get("_id")
                    .and_then(|v| v.as_str())
                    .unwrap_or(&request.id)
                    .to_string();

                match outcome.get("error") {
                    Some(err) => {
                        let reason = err
                            .get("reason")
                            .and_then(|r| r.as_str())
                            .map(str::to_string)
                            .unwrap_or_else(|| err.to_string());
                        let status = outcome.get("status").and_then(|s| s.as_u64()).unwrap_or(0);
                        BulkItemResult::failed(
                            id,
                            IndexStoreError::index(format!("status {}: {}", status, reason)),
                        )
                    }
                    None => BulkItemResult::ok(id),
                }
            })
            .collect();

        Ok(BulkSummary::from_results(results))
    }

    fn error_type(body: &str) -> Option<String> {
        let value: Value = serde_json::from_str(body).ok()?;
        value["error"]["type"].as_str().map(str::to_string)
    }
}

#[async_trait]
impl IndexStore for OpenSearchClient {
    async fn index_exists(&self, index: &str) -> Result<bool, IndexStoreError> {
        let response = self
            .client
            .indices()
            .exists(IndicesExistsParts::Index(&[index]))
            .send()
            .await
            .map_err(|e| IndexStoreError::connection(e.to_string()))?;

        match response.status_code().as_u16() {
            200 => Ok(true),
            404 => Ok(false),
            status => Err(IndexStoreError::unknown(format!(
                "Unexpected status {} checking index {}",
                status, index
            ))),
        }
    }

    #[instrument(skip(self, schema))]
    async fn create_index(&self, index: &str, schema: &IndexSchema) -> Result<(), IndexStoreError> {
        let response = self
            .client
            .indices()
            .create(IndicesCreateParts::Index(index))
            .body(get_index_settings(schema))
            .send()
            .await
            .map_err(|e| IndexStoreError::lifecycle(e.to_string()))?;

        let status = response.status_code();
        if !status.is_success() {
            let body = Self::error_body(response).await;
            if Self::error_type(&body).as_deref() == Some("resource_already_exists_exception") {
                return Err(IndexStoreError::IndexAlreadyExists(index.to_string()));
            }
            error!(status = %status, body = %body, "Create index request failed");
            return Err(IndexStoreError::lifecycle(format!(
                "Create index {} failed with status {}: {}",
                index, status, body
            )));
        }

        info!(index = %index, "Created index");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_index(&self, index: &str) -> Result<(), IndexStoreError> {
        let response = self
            .client
            .indices()
            .delete(IndicesDeleteParts::Index(&[index]))
            .send()
            .await
            .map_err(|e| IndexStoreError::lifecycle(e.to_string()))?;

        let status = response.status_code();
        if status.as_u16() == 404 {
            return Err(IndexStoreError::IndexMissing(index.to_string()));
        }
        if !status.is_success() {
            let body = Self::error_body(response).await;
            error!(status = %status, body = %body, "Delete index request failed");
            return Err(IndexStoreError::lifecycle(format!(
                "Delete index {} failed with status {}: {}",
                index, status, body
            )));
        }

        info!(index = %index, "Deleted index");
        Ok(())
    }

    async fn index_document(
        &self,
        index: &str,
        id: &str,
        body: &Value,
    ) -> Result<(), IndexStoreError> {
        let response = self
            .client
            .index(IndexParts::IndexId(index, id))
            .body(body)
            .send()
            .await
            .map_err(|e| IndexStoreError::connection(e.to_string()))?;

        let status = response.status_code();
        if !status.is_success() {
            let error_body = Self::error_body(response).await;
            error!(status = %status, body = %error_body, doc_id = %id, "Index request failed");
            return Err(IndexStoreError::index(format!(
                "Index failed with status {}: {}",
                status, error_body
            )));
        }

        debug!(doc_id = %id, "Document indexed");
        Ok(())
    }

    async fn bulk_index(
        &self,
        index: &str,
        batch: &[BulkItem],
    ) -> Result<BulkSummary, IndexStoreError> {
        if batch.is_empty() {
            return Ok(BulkSummary::default());
        }

        let response = self
            .client
            .bulk(BulkParts::Index(index))
            .body(Self::bulk_body(batch))
            .send()
            .await
            .map_err(|e| IndexStoreError::connection(e.to_string()))?;

        let status = response.status_code();
        if !status.is_success() {
            let error_body = Self::error_body(response).await;
            error!(status = %status, body = %error_body, "Bulk request failed");
            return Err(IndexStoreError::bulk_operation(format!(
                "Bulk failed with status {}: {}",
                status, error_body
            )));
        }

        let response_body: Value = response
            .json()
            .await
            .map_err(|e| IndexStoreError::parse(e.to_string()))?;

        let summary = Self::parse_bulk_response(&response_body, batch)?;
        debug!(
            total = summary.total,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "Bulk request completed"
        );
        Ok(summary)
    }

    async fn refresh(&self, index: &str) -> Result<(), IndexStoreError> {
        let response = self
            .client
            .indices()
            .refresh(IndicesRefreshParts::Index(&[index]))
            .send()
            .await
            .map_err(|e| IndexStoreError::refresh(e.to_string()))?;

        let status = response.status_code();
        if !status.is_success() {
            let error_body = Self::error_body(response).await;
            return Err(IndexStoreError::refresh(format!(
                "Refresh failed with status {}: {}",
                status, error_body
            )));
        }

        debug!(index = %index, "Index refreshed");
        Ok(())
    }

    async fn count(&self, index: &str) -> Result<u64, IndexStoreError> {
        let response = self
            .client
            .count(CountParts::Index(&[index]))
            .send()
            .await
            .map_err(|e| IndexStoreError::connection(e.to_string()))?;

        let status = response.status_code();
        if status.as_u16() == 404 {
            return Err(IndexStoreError::IndexMissing(index.to_string()));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| IndexStoreError::parse(e.to_string()))?;

        body["count"]
            .as_u64()
            .ok_or_else(|| IndexStoreError::parse(format!("Count response has no count: {}", body)))
    }

    async fn health_check(&self) -> Result<bool, IndexStoreError> {
        let response = self
            .client
            .cluster()
            .health(ClusterHealthParts::None)
            .send()
            .await
            .map_err(|e| IndexStoreError::connection(e.to_string()))?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| IndexStoreError::parse(e.to_string()))?;

        let status = body["status"].as_str().unwrap_or("red");
        debug!(status = %status, "Cluster health");
        Ok(status == "green" || status == "yellow")
    }
}

//! Similarity search by example image.

use std::path::Path;

use serde_json::{json, Value};
use tracing::{debug, instrument};

use crate::IndexingError;
use media_indexer_pipeline::processor::{thumbnail, ThumbnailConfig};

const USER_AGENT: &str = concat!("media-indexer/", env!("CARGO_PKG_VERSION"));

/// Parameters of a similarity query.
#[derive(Debug, Clone)]
pub struct ImageQuery {
    pub limit: usize,
    pub index_name: String,
    pub doc_type: String,
}

/// URL of the search endpoint under `base`.
pub fn search_endpoint(base: &str) -> String {
    format!("{}/search", base.trim_end_matches('/'))
}

/// Body of a similarity query for an image given as a thumbnail data URL.
pub fn build_request(thumbnail: &str, query: &ImageQuery) -> Value {
    json!({
        "q_id": thumbnail,
        "limit": query.limit,
        "include_self": true,
        "index_name": query.index_name,
        "doc_type": query.doc_type,
    })
}

/// Search for images similar to the one in `file`.
#[instrument(skip(query, bounds), fields(file = %file.display()))]
pub async fn search_by_image(
    search_url: &str,
    file: &Path,
    query: &ImageQuery,
    bounds: ThumbnailConfig,
) -> Result<Value, IndexingError> {
    let bytes = tokio::fs::read(file).await?;
    let thumb = thumbnail::shrink_and_encode(&bytes, bounds.max_width, bounds.max_height)?;

    let endpoint = search_endpoint(search_url);
    debug!(endpoint = %endpoint, limit = query.limit, "Sending similarity query");

    let response = reqwest::Client::new()
        .post(&endpoint)
        .header(reqwest::header::USER_AGENT, USER_AGENT)
        .json(&build_request(&thumb, query))
        .send()
        .await
        .map_err(|e| IndexingError::search(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(IndexingError::search(format!("status {}: {}", status, body)));
    }

    response
        .json::<Value>()
        .await
        .map_err(|e| IndexingError::search(format!("invalid response: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body() {
        let query = ImageQuery {
            limit: 5,
            index_name: "getty_test".into(),
            doc_type: "image".into(),
        };
        let body = build_request("data:image/jpeg;base64,AAAA", &query);

        assert_eq!(body["q_id"], "data:image/jpeg;base64,AAAA");
        assert_eq!(body["limit"], 5);
        assert_eq!(body["include_self"], true);
        assert_eq!(body["index_name"], "getty_test");
        assert_eq!(body["doc_type"], "image");
    }

    #[test]
    fn test_search_endpoint() {
        assert_eq!(search_endpoint("http://127.0.0.1:23456"), "http://127.0.0.1:23456/search");
        assert_eq!(search_endpoint("http://search.local/"), "http://search.local/search");
    }

    #[tokio::test]
    async fn test_unreadable_file_is_an_io_error() {
        let query = ImageQuery {
            limit: 1,
            index_name: "getty_test".into(),
            doc_type: "image".into(),
        };
        let result = search_by_image(
            "http://127.0.0.1:9",
            Path::new("/nonexistent/query.jpg"),
            &query,
            ThumbnailConfig::default(),
        )
        .await;
        assert!(matches!(result, Err(IndexingError::IoError(_))));
    }
}

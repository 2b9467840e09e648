//! The canonical document persisted to the media index.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A normalized, thumbnail-bearing media record.
///
/// This is the only shape the loader ever writes. It has no field for raw
/// image bytes: the raw payload stays in the source record and is consumed by
/// the normalizer when the thumbnail is derived.
///
/// The `id` is used as the index `_id` and is not part of the stored body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CanonicalDocument {
    /// Stable identifier of the media item.
    #[serde(skip)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub editorial_source: Option<String>,
    /// Keywords joined with single spaces.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keywords: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_date: Option<DateTime<Utc>>,
    /// Preview thumbnail as a `data:` URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_thumb: Option<String>,
    /// Reserved for the external dedup process. Never set by the pipeline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dedupe_hsh: Option<String>,
    /// Base58 encoding of the raw content reference (streaming source only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_ref: Option<String>,
    /// Secondary alias of the source identifier (streaming source only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
}

impl CanonicalDocument {
    /// Create an empty document with the given identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Serialize the document body as sent to the index.
    pub fn to_body(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_body_omits_id_and_empty_fields() {
        let mut doc = CanonicalDocument::new("getty_1");
        doc.title = Some("Runway".to_string());
        doc.created_date = Some(Utc.with_ymd_and_hms(2016, 4, 15, 7, 0, 0).unwrap());

        let body = doc.to_body().unwrap();
        let object = body.as_object().unwrap();

        assert!(!object.contains_key("id"));
        assert!(!object.contains_key("artist"));
        assert_eq!(object["title"], "Runway");
        assert_eq!(object["created_date"], "2016-04-15T07:00:00Z");
        assert_eq!(object.len(), 2);
    }
}

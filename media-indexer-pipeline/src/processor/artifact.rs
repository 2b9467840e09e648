//! Stream variant of the normalizer.

use serde_json::Value;
use tracing::debug;

use crate::errors::PipelineError;
use crate::processor::field_table::{CONTENT_REFERENCE, TRANSLATED_AT};
use crate::processor::normalizer::{parse_timestamp, Normalizer};
use media_indexer_shared::{ArtifactData, CanonicalDocument, StreamEvent};

impl Normalizer {
    /// Normalize a stream event.
    ///
    /// Events other than artifacts are dropped with `Ok(None)`.
    pub fn normalize_event(
        &self,
        event: &StreamEvent,
    ) -> Result<Option<CanonicalDocument>, PipelineError> {
        if !event.is_artifact() {
            debug!(kind = ?event.kind, "Skipping non-artifact event");
            return Ok(None);
        }

        let data = event
            .meta
            .get("data")
            .ok_or_else(|| PipelineError::normalization("artifact event without meta.data"))?;
        let data: ArtifactData = serde_json::from_value(data.clone())
            .map_err(|e| PipelineError::normalization(format!("invalid artifact data: {e}")))?;
        let id = data.id;

        let link = CONTENT_REFERENCE
            .resolve(&event.meta)
            .ok_or_else(|| PipelineError::MissingReference(id.clone()))?;
        let latest_ref = bs58::encode(link_bytes(link).ok_or_else(|| {
            PipelineError::normalization(format!("{id}: unsupported {} value", CONTENT_REFERENCE.name))
        })?)
        .into_string();

        let created_date = match TRANSLATED_AT.resolve(&event.meta) {
            Some(Value::String(raw)) => parse_timestamp(raw)?,
            Some(other) => {
                return Err(PipelineError::normalization(format!(
                    "{id}: {} is not a string: {other}",
                    TRANSLATED_AT.name
                )))
            }
            None => return Err(PipelineError::MissingTimestamp(id)),
        };

        let image_thumb = self.ensure_thumbnail(&id, None, data.thumbnail_base64)?;
        let keywords = (!data.keywords.is_empty()).then(|| data.keywords.join(" "));

        debug!(doc_id = %id, latest_ref = %latest_ref, "Normalized artifact event");

        Ok(Some(CanonicalDocument {
            title: data.title,
            artist: data.artist,
            collection_name: data.collection_name,
            caption: data.caption,
            editorial_source: data.editorial_source,
            keywords,
            created_date: Some(created_date),
            image_thumb,
            latest_ref: Some(latest_ref),
            source_id: Some(id.clone()),
            ..CanonicalDocument::new(id)
        }))
    }
}

/// Raw bytes of a content reference: a byte array or a string.
fn link_bytes(link: &Value) -> Option<Vec<u8>> {
    match link {
        Value::String(s) => Some(s.as_bytes().to_vec()),
        Value::Array(items) => items
            .iter()
            .map(|item| item.as_u64().and_then(|b| u8::try_from(b).ok()))
            .collect(),
        _ => None,
    }
}

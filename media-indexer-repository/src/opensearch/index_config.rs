//! OpenSearch index settings and mappings.
//!
//! Renders an [`IndexSchema`] into the body of a create-index request.

use serde_json::{json, Map, Value};

use crate::schema::{FieldKind, IndexSchema};

/// Render the mapping of a single field kind.
fn field_mapping(kind: FieldKind) -> Value {
    match kind {
        FieldKind::Text => json!({ "type": "text" }),
        FieldKind::Keyword => json!({ "type": "keyword" }),
        FieldKind::Date => json!({ "type": "date" }),
        // Thumbnails can be far larger than any sensible keyword, so they are
        // neither indexed nor kept as doc values.
        FieldKind::Stored => json!({ "type": "keyword", "index": false, "doc_values": false }),
    }
}

/// Get the index settings and mappings for the given schema.
///
/// The configuration includes:
/// - **text**: analyzed fields for full-text search
/// - **keyword**: exact-value fields, never analyzed
/// - **date**: timestamps
/// - **stored-only** keyword fields with `index: false`
pub fn get_index_settings(schema: &IndexSchema) -> Value {
    let properties: Map<String, Value> = schema
        .fields
        .iter()
        .map(|f| (f.name.clone(), field_mapping(f.kind)))
        .collect();

    json!({
        "settings": {
            "number_of_shards": schema.number_of_shards,
            "number_of_replicas": schema.number_of_replicas
        },
        "mappings": {
            "properties": properties
        }
    })
}

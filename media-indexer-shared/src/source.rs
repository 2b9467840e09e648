//! Source records consumed by the normalizer.
//!
//! Each source has its own typed record; the normalizer maps both to
//! [`CanonicalDocument`](crate::CanonicalDocument).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A record from one of the supported sources.
#[derive(Debug, Clone)]
pub enum SourceRecord {
    /// A record read from a dataset dump.
    Dump(DumpRecord),
    /// An event read from the live stream.
    Stream(StreamEvent),
}

/// Keywords as they appear in source data: a list, or a string that was
/// already joined upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Keywords {
    List(Vec<String>),
    Joined(String),
}

impl Keywords {
    /// Join the keywords with single spaces.
    pub fn joined(&self) -> String {
        match self {
            Keywords::List(items) => items.join(" "),
            Keywords::Joined(s) => s.clone(),
        }
    }
}

/// One media record from a dataset dump (one JSON file per record).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DumpRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub collection_name: Option<String>,
    pub caption: Option<String>,
    pub editorial_source: Option<String>,
    pub keywords: Option<Keywords>,
    pub date_created: Option<String>,
    /// Raw image as a `data:` URL.
    pub img_data: Option<String>,
    /// Previously generated thumbnail as a `data:` URL.
    pub image_thumb: Option<String>,
}

/// Type tag of a stream event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    #[serde(rename = "artefact", alias = "artifact")]
    Artifact,
    #[serde(rename = "entity")]
    Entity,
    #[serde(other)]
    Other,
}

/// Envelope of one event from the live stream.
///
/// Only the type tag is decoded eagerly. `meta` is kept untyped because its
/// shape depends on the event type and on the producer's schema version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    #[serde(default)]
    pub meta: Value,
}

impl StreamEvent {
    pub fn is_artifact(&self) -> bool {
        self.kind == EventKind::Artifact
    }
}

/// Media metadata carried under `meta.data` of an artifact event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArtifactData {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub caption: Option<String>,
    pub collection_name: Option<String>,
    pub editorial_source: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub date_created: Option<String>,
    pub thumbnail_base64: Option<String>,
}

//! # Media Indexer Shared
//!
//! Types shared by every crate of the media indexer: the canonical document
//! persisted to the search index and the source records it is built from.

mod document;
mod source;

pub use document::CanonicalDocument;
pub use source::{ArtifactData, DumpRecord, EventKind, Keywords, SourceRecord, StreamEvent};

//! Error types for the media indexer pipeline.

mod transport;

pub use transport::{TransportError, TransportErrorKind};

use media_indexer_repository::IndexStoreError;
use thiserror::Error;

use crate::dedup::ReindexError;

/// Errors that can occur in the media indexer pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The thumbnail payload does not start with an accepted data-URL prefix.
    #[error("Unrecognized payload format: {0}")]
    UnrecognizedPayloadFormat(String),

    /// No image data was available to produce a thumbnail.
    #[error("Thumbnail unavailable for document {0}")]
    ThumbnailUnavailable(String),

    /// Image bytes could not be decoded or encoded.
    #[error("Image codec error: {0}")]
    ImageCodec(String),

    /// None of the content reference fields were present.
    #[error("Missing content reference for document {0}")]
    MissingReference(String),

    /// None of the timestamp fields were present.
    #[error("Missing timestamp for document {0}")]
    MissingTimestamp(String),

    /// A record could not be turned into a canonical document.
    #[error("Normalization error: {0}")]
    NormalizationError(String),

    /// A stream event payload could not be decoded.
    #[error("Event decode error: {0}")]
    EventDecodeError(String),

    /// The streaming transport failed; terminal for the run.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// A refresh failed.
    #[error("Refresh error: {0}")]
    RefreshError(IndexStoreError),

    /// The reindex collaborator failed.
    #[error("Reindex error: {0}")]
    Reindex(#[from] ReindexError),

    /// Error from the index store.
    #[error("Index error: {0}")]
    Index(#[from] IndexStoreError),

    /// A dump file could not be listed, read or parsed.
    #[error("Source error: {0}")]
    SourceError(String),

    /// A dead letter could not be written.
    #[error("Dead letter error: {0}")]
    DeadLetterError(String),

    /// Channel communication error.
    #[error("Channel error: {0}")]
    ChannelError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Create an unrecognized payload format error.
    pub fn unrecognized_payload(msg: impl Into<String>) -> Self {
        Self::UnrecognizedPayloadFormat(msg.into())
    }

    /// Create an image codec error.
    pub fn image(msg: impl Into<String>) -> Self {
        Self::ImageCodec(msg.into())
    }

    /// Create a normalization error.
    pub fn normalization(msg: impl Into<String>) -> Self {
        Self::NormalizationError(msg.into())
    }

    /// Create an event decode error.
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::EventDecodeError(msg.into())
    }

    /// Create a source error.
    pub fn source(msg: impl Into<String>) -> Self {
        Self::SourceError(msg.into())
    }

    /// Create a dead letter error.
    pub fn dead_letter(msg: impl Into<String>) -> Self {
        Self::DeadLetterError(msg.into())
    }

    /// Create a channel error.
    pub fn channel(msg: impl Into<String>) -> Self {
        Self::ChannelError(msg.into())
    }

    /// Whether this error ends a streaming run.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let transport = PipelineError::from(TransportError::new(
            TransportErrorKind::Network,
            "connection reset",
        ));
        assert!(transport.is_transport());

        let missing = PipelineError::MissingReference("getty_1".to_string());
        assert!(!missing.is_transport());

        let index = PipelineError::from(IndexStoreError::connection("refused"));
        assert_eq!(index.to_string(), "Index error: Connection error: refused");
    }
}

//! Streaming transport failures.

use std::fmt;
use thiserror::Error;

/// Closed set of transport failure categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportErrorKind {
    /// A read or request deadline expired.
    Expiration,
    /// The transport aborted the session.
    Abortion,
    /// The read was cancelled.
    Cancellation,
    /// The local client is shutting down.
    LocalShutdown,
    /// The remote end is shutting down or unavailable.
    RemoteShutdown,
    /// The connection to the remote end failed.
    Network,
    /// The remote end reported an error.
    Remote,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Expiration => "expiration",
            Self::Abortion => "abortion",
            Self::Cancellation => "cancellation",
            Self::LocalShutdown => "local shutdown",
            Self::RemoteShutdown => "remote shutdown",
            Self::Network => "network",
            Self::Remote => "remote",
        };
        f.write_str(name)
    }
}

/// A classified failure of the streaming transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

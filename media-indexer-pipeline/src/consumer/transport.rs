//! Streaming transport boundary.

use std::time::Duration;

use async_trait::async_trait;

use crate::errors::TransportError;

/// A long-lived connection delivering raw event payloads in order.
#[async_trait]
pub trait EventTransport: Send + Sync {
    /// Wait at most `timeout` for the next payload.
    ///
    /// `Ok(None)` means the source closed the stream. An expired timeout is
    /// a `TransportErrorKind::Expiration` error.
    async fn next_event(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>, TransportError>;
}

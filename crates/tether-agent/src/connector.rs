//! The Connector seam: the channel the agent talks to its broker through.
//!
//! The transport itself (WebSocket link, TLS, framing) lives outside this
//! crate. The request processor only needs a way to send one
//! [`ResponseMessage`] to one endpoint with a timeout; anything that can do
//! that, the production transport or an in-process test double, plugs in
//! here.

use std::time::Duration;

use thiserror::Error;

use crate::messages::ResponseMessage;

/// Default timeout for outbound sends.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(2);

/// A send through the Connector failed.
///
/// Sends are best-effort: the processor logs the failure and abandons the
/// transaction; it never retries.
#[derive(Debug, Error)]
#[error("connection error: {message}")]
pub struct ConnectionError {
    message: String,
}

impl ConnectionError {
    /// Creates a connection error with the given diagnostic.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Bidirectional message channel to the broker, outbound half.
///
/// Implementations must be shareable across worker threads; the processor
/// holds the connector behind an `Arc`.
pub trait Connector: Send + Sync {
    /// Sends a message to the endpoint, failing after the timeout.
    ///
    /// # Errors
    ///
    /// Returns a [`ConnectionError`] when the message could not be
    /// delivered to the transport within the timeout.
    fn send(
        &self,
        endpoint: &str,
        message: ResponseMessage,
        timeout: Duration,
    ) -> Result<(), ConnectionError>;
}

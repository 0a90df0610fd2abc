//! Inbound envelope interpretation.
//!
//! The transport parses each framed message into an [`InboundEnvelope`]:
//! the raw envelope document, the request body, the debug chunks, and a
//! count of debug chunks that failed to parse. This module turns that
//! bundle into the typed fields an [`ActionRequest`] needs, classifying
//! failures by the error reply they warrant.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use tether_modules::request::{ParsedChunks, RequestType};

/// Message type of a blocking action request.
pub const BLOCKING_REQUEST_TYPE: &str = "tether.request.blocking";

/// Message type of a non-blocking action request.
pub const NON_BLOCKING_REQUEST_TYPE: &str = "tether.request.non_blocking";

/// Errors raised while interpreting an envelope.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// The envelope's message type is not a recognised request type.
    #[error("unknown message type '{message_type}'")]
    UnknownMessageType {
        /// The type the envelope declared.
        message_type: String,
    },

    /// The envelope declares no message type at all.
    #[error("envelope carries no message type")]
    MissingMessageType,

    /// The envelope names no sender endpoint; no reply can be routed.
    #[error("envelope carries no sender")]
    MissingSender,

    /// The request body is missing or malformed.
    #[error("invalid request body: {message}")]
    InvalidBody {
        /// Deserialisation diagnostic.
        message: String,
    },
}

/// Typed request body carried in the envelope's data chunk.
#[derive(Debug, Clone, Deserialize)]
pub struct RequestBody {
    /// Identifier grouping related messages.
    pub transaction_id: String,
    /// Target module name.
    pub module: String,
    /// Target action name.
    pub action: String,
    /// Input document for the action.
    #[serde(default)]
    pub params: Value,
}

/// One parsed inbound message, as delivered by the transport.
#[derive(Debug, Clone)]
pub struct InboundEnvelope {
    chunks: ParsedChunks,
    data: Value,
}

impl InboundEnvelope {
    /// Creates an envelope from the transport's parse results.
    #[must_use]
    pub fn new(chunks: ParsedChunks, data: Value) -> Self {
        Self { chunks, data }
    }

    /// Returns the envelope chunks (envelope document plus debug).
    #[must_use]
    pub const fn chunks(&self) -> &ParsedChunks {
        &self.chunks
    }

    /// Returns the request id declared in the envelope, if any.
    #[must_use]
    pub fn request_id(&self) -> Option<&str> {
        self.chunks.envelope().get("id").and_then(Value::as_str)
    }

    /// Returns the sender endpoint declared in the envelope.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::MissingSender`] when the envelope names no
    /// sender; such an envelope cannot be answered at all.
    pub fn sender(&self) -> Result<&str, EnvelopeError> {
        self.chunks
            .envelope()
            .get("sender")
            .and_then(Value::as_str)
            .ok_or(EnvelopeError::MissingSender)
    }

    /// Interprets the envelope's message type as a request type.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::MissingMessageType`] or
    /// [`EnvelopeError::UnknownMessageType`] when the envelope is not a
    /// recognised request message; the caller answers with a PCP error.
    pub fn request_type(&self) -> Result<RequestType, EnvelopeError> {
        let message_type = self
            .chunks
            .envelope()
            .get("message_type")
            .and_then(Value::as_str)
            .ok_or(EnvelopeError::MissingMessageType)?;
        match message_type {
            BLOCKING_REQUEST_TYPE => Ok(RequestType::Blocking),
            NON_BLOCKING_REQUEST_TYPE => Ok(RequestType::NonBlocking),
            other => Err(EnvelopeError::UnknownMessageType {
                message_type: other.to_owned(),
            }),
        }
    }

    /// Deserialises the request body.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::InvalidBody`] when required fields are
    /// missing or malformed; the caller answers with a PXP error.
    pub fn request_body(&self) -> Result<RequestBody, EnvelopeError> {
        serde_json::from_value(self.data.clone()).map_err(|error| EnvelopeError::InvalidBody {
            message: error.to_string(),
        })
    }

    /// Returns the transaction id from the raw body, if present.
    ///
    /// Used to address PXP error replies for bodies that fail full
    /// deserialisation.
    #[must_use]
    pub fn raw_transaction_id(&self) -> Option<&str> {
        self.data.get("transaction_id").and_then(Value::as_str)
    }
}

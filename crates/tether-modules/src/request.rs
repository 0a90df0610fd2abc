//! Inbound action requests.
//!
//! An [`ActionRequest`] is an immutable value object carrying one work item
//! from the broker: identity, routing, target `(module, action)`, the input
//! document, and the envelope chunks the transport parsed. Non-blocking
//! requests additionally carry the results directory their child process
//! writes into; the two constructors make the directory invariant
//! unrepresentable rather than asserting it.

use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;

/// Whether the response is awaited in-flight or persisted for later
/// retrieval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestType {
    /// The result is captured from the child's stdout and returned in a
    /// single response message.
    Blocking,
    /// The result is written to a results directory; a provisional response
    /// is sent on acceptance and a final response on completion.
    NonBlocking,
}

impl RequestType {
    /// Returns the canonical string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Blocking => "blocking",
            Self::NonBlocking => "non-blocking",
        }
    }
}

impl std::fmt::Display for RequestType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while constructing an [`ActionRequest`].
#[derive(Debug, Error)]
pub enum RequestError {
    /// A non-blocking request was constructed without a results directory.
    #[error("non-blocking request '{id}' has an empty results directory")]
    EmptyResultsDir {
        /// Request id assigned by the sender.
        id: String,
    },
}

/// Envelope material parsed by the transport, carried through for response
/// emission and logging.
#[derive(Debug, Clone, Default)]
pub struct ParsedChunks {
    envelope: Value,
    debug: Vec<Value>,
    num_invalid_debug: usize,
}

impl ParsedChunks {
    /// Creates a chunk bundle from the transport's parse results.
    #[must_use]
    pub fn new(envelope: Value, debug: Vec<Value>, num_invalid_debug: usize) -> Self {
        Self {
            envelope,
            debug,
            num_invalid_debug,
        }
    }

    /// Returns the raw envelope document.
    #[must_use]
    pub const fn envelope(&self) -> &Value {
        &self.envelope
    }

    /// Returns the valid debug chunks, in arrival order.
    #[must_use]
    pub fn debug(&self) -> &[Value] {
        &self.debug
    }

    /// Returns how many debug chunks failed to parse.
    #[must_use]
    pub const fn num_invalid_debug(&self) -> usize {
        self.num_invalid_debug
    }
}

/// Identity and routing fields of one request.
///
/// Groups the envelope-derived fields into a single parameter object so the
/// [`ActionRequest`] constructors stay readable.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    /// Request UUID assigned by the sender.
    pub id: String,
    /// Identifier grouping related messages.
    pub transaction_id: String,
    /// Endpoint the broker uses to route replies.
    pub sender: String,
    /// Target module name.
    pub module: String,
    /// Target action name.
    pub action: String,
    /// Input document as received from the broker.
    pub params: Value,
}

/// One inbound work item, immutable once constructed.
#[derive(Debug, Clone)]
pub struct ActionRequest {
    descriptor: RequestDescriptor,
    kind: RequestType,
    chunks: ParsedChunks,
    results_dir: Option<PathBuf>,
    pretty_label: String,
}

impl ActionRequest {
    /// Creates a blocking request.
    #[must_use]
    pub fn blocking(descriptor: RequestDescriptor, chunks: ParsedChunks) -> Self {
        let pretty_label = pretty_label(RequestType::Blocking, &descriptor);
        Self {
            descriptor,
            kind: RequestType::Blocking,
            chunks,
            results_dir: None,
            pretty_label,
        }
    }

    /// Creates a non-blocking request with its results directory.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::EmptyResultsDir`] if the directory path is
    /// empty. Non-blocking requests without a results directory cannot be
    /// represented.
    pub fn non_blocking(
        descriptor: RequestDescriptor,
        chunks: ParsedChunks,
        results_dir: PathBuf,
    ) -> Result<Self, RequestError> {
        if results_dir.as_os_str().is_empty() {
            return Err(RequestError::EmptyResultsDir {
                id: descriptor.id.clone(),
            });
        }
        let pretty_label = pretty_label(RequestType::NonBlocking, &descriptor);
        Ok(Self {
            descriptor,
            kind: RequestType::NonBlocking,
            chunks,
            results_dir: Some(results_dir),
            pretty_label,
        })
    }

    /// Returns the request id assigned by the sender.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.descriptor.id
    }

    /// Returns the transaction id grouping related messages.
    #[must_use]
    pub fn transaction_id(&self) -> &str {
        &self.descriptor.transaction_id
    }

    /// Returns the endpoint replies are routed to.
    #[must_use]
    pub fn sender(&self) -> &str {
        &self.descriptor.sender
    }

    /// Returns the target module name.
    #[must_use]
    pub fn module(&self) -> &str {
        &self.descriptor.module
    }

    /// Returns the target action name.
    #[must_use]
    pub fn action(&self) -> &str {
        &self.descriptor.action
    }

    /// Returns whether the request is blocking or non-blocking.
    #[must_use]
    pub const fn kind(&self) -> RequestType {
        self.kind
    }

    /// Returns the input document.
    #[must_use]
    pub const fn params(&self) -> &Value {
        &self.descriptor.params
    }

    /// Returns the parsed envelope chunks.
    #[must_use]
    pub const fn chunks(&self) -> &ParsedChunks {
        &self.chunks
    }

    /// Returns the results directory for non-blocking requests.
    #[must_use]
    pub fn results_dir(&self) -> Option<&Path> {
        self.results_dir.as_deref()
    }

    /// Returns the log label, `"<type> request <id> for <module> <action>"`.
    #[must_use]
    pub fn pretty_label(&self) -> &str {
        &self.pretty_label
    }
}

fn pretty_label(kind: RequestType, descriptor: &RequestDescriptor) -> String {
    format!(
        "{kind} request {id} for {module} {action}",
        id = descriptor.id,
        module = descriptor.module,
        action = descriptor.action,
    )
}

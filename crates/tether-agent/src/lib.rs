//! Request-lifecycle engine for the tether agent.
//!
//! The `tether-agent` crate is the node-side half of a remote orchestration
//! fabric: it receives action requests addressed to this node from a
//! central broker, dispatches them to the modules loaded by
//! [`tether_modules`], and returns structured results over the same link.
//!
//! # Architecture
//!
//! The transport (the persistent, mutually-authenticated WebSocket link to
//! the broker) lives outside this crate, behind two seams:
//!
//! - inbound, the transport delivers parsed [`InboundEnvelope`]s to the
//!   [`RequestProcessor`];
//! - outbound, the processor emits [`ResponseMessage`]s through whatever
//!   implements the [`Connector`] trait.
//!
//! Between the seams sits the request lifecycle: envelope interpretation,
//! input validation against the target module's registered schema, action
//! execution on a bounded worker pool, result validation, and response
//! emission. Non-blocking requests are acknowledged with a provisional
//! response before their child process starts; their results are read back
//! from the per-transaction results directory when it exits.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use tether_agent::config::AgentConfig;
//! use tether_agent::connector::{ConnectionError, Connector};
//! use tether_agent::messages::ResponseMessage;
//!
//! struct NullConnector;
//!
//! impl Connector for NullConnector {
//!     fn send(
//!         &self,
//!         _endpoint: &str,
//!         _message: ResponseMessage,
//!         _timeout: Duration,
//!     ) -> Result<(), ConnectionError> {
//!         Ok(())
//!     }
//! }
//!
//! let config = AgentConfig::default();
//! let processor = tether_agent::bootstrap(&config, Arc::new(NullConnector));
//! assert!(processor.registry().get("echo").is_some());
//! ```

pub mod bootstrap;
pub mod builtins;
pub mod config;
pub mod connector;
pub mod envelope;
pub mod loader;
pub mod messages;
pub mod pool;
pub mod processor;
pub mod telemetry;

pub use self::bootstrap::bootstrap;
pub use self::config::{AgentConfig, ConfigError, LogFormat};
pub use self::connector::{ConnectionError, Connector, DEFAULT_SEND_TIMEOUT};
pub use self::envelope::{
    BLOCKING_REQUEST_TYPE, EnvelopeError, InboundEnvelope, NON_BLOCKING_REQUEST_TYPE, RequestBody,
};
pub use self::messages::ResponseMessage;
pub use self::pool::{WorkerPermit, WorkerPool};
pub use self::processor::RequestProcessor;

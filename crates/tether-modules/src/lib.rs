//! Module-dispatch engine for the tether agent.
//!
//! The `tether-modules` crate implements the node-side half of the module
//! protocol: discovering and loading **external modules** (on-disk
//! executables probed in a metadata mode), registering **internal modules**
//! (built-in actions implemented in-process), validating action inputs and
//! results against the schemas each module declares, and executing actions
//! either blocking (result captured from the child's stdout pipe) or
//! non-blocking (result written by the child to a per-transaction results
//! directory).
//!
//! # Architecture
//!
//! Modules are a sum over [`InternalModule`] and [`ExternalModule`] with a
//! shared capability set, collected into a [`ModuleRegistry`] during agent
//! startup and shared read-only across workers afterwards. Schema
//! validation is delegated to compiled [`SchemaSet`]s; child processes are
//! driven by the [`exec`] runner; non-blocking results flow through the
//! [`results`] store.
//!
//! # Example
//!
//! ```
//! use serde_json::{Value, json};
//! use tether_modules::{InternalModule, Module, ModuleRegistry};
//!
//! let mut echo = InternalModule::new("echo", "echoes its argument");
//! echo.register_action(
//!     "echo",
//!     &json!({
//!         "type": "object",
//!         "properties": { "argument": { "type": "string" } },
//!         "required": ["argument"]
//!     }),
//!     &json!({
//!         "type": "object",
//!         "properties": { "outcome": { "type": "string" } },
//!         "required": ["outcome"]
//!     }),
//!     Box::new(|request| {
//!         let argument = request
//!             .params()
//!             .get("argument")
//!             .and_then(Value::as_str)
//!             .ok_or_else(|| String::from("missing argument"))?;
//!         Ok(json!({"outcome": argument}))
//!     }),
//! )
//! .expect("echo action registers");
//!
//! let mut registry = ModuleRegistry::new();
//! registry.register(Module::from(echo)).expect("echo registers");
//! assert!(registry.get("echo").is_some());
//! ```

pub mod error;
pub mod exec;
pub mod external;
pub mod internal;
pub mod metadata;
pub mod module;
pub mod outcome;
pub mod registry;
pub mod request;
pub mod results;
pub mod schema;

#[cfg(test)]
mod tests;

pub use self::error::ModuleError;
pub use self::exec::{Execution, LAUNCH_FAILURE_EXIT_CODE};
pub use self::external::{ExternalModule, FILE_ERROR_EXIT_CODE};
pub use self::internal::{ActionHandler, InternalModule};
pub use self::metadata::{ActionMetadata, ModuleMetadata};
pub use self::module::Module;
pub use self::outcome::ActionOutcome;
pub use self::registry::{ModuleRegistry, RegistryError};
pub use self::request::{ActionRequest, ParsedChunks, RequestDescriptor, RequestError, RequestType};
pub use self::results::{ResultsError, ResultsStore};
pub use self::schema::{SchemaError, SchemaSet};

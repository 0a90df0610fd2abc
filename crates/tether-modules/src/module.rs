//! The module sum type.
//!
//! Every module, built-in or on-disk, presents the same capability set:
//! name, advertised actions, per-action input and result validation, and
//! `call`. The two variants delegate to their concrete implementations.

use serde_json::Value;

use crate::error::ModuleError;
use crate::external::ExternalModule;
use crate::internal::InternalModule;
use crate::outcome::ActionOutcome;
use crate::request::ActionRequest;
use crate::schema::SchemaError;

/// A loaded module, internal or external.
#[derive(Debug)]
pub enum Module {
    /// Built-in actions implemented in-process.
    Internal(InternalModule),
    /// An on-disk executable probed at load time.
    External(ExternalModule),
}

impl Module {
    /// Returns the module name, unique in the registry.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Internal(module) => module.name(),
            Self::External(module) => module.name(),
        }
    }

    /// Returns the human-readable module description.
    #[must_use]
    pub fn description(&self) -> &str {
        match self {
            Self::Internal(module) => module.description(),
            Self::External(module) => module.description(),
        }
    }

    /// Returns the module configuration (`null` when absent).
    #[must_use]
    pub const fn config(&self) -> &Value {
        match self {
            Self::Internal(module) => module.config(),
            Self::External(module) => module.config(),
        }
    }

    /// Returns the advertised action names.
    #[must_use]
    pub fn actions(&self) -> &[String] {
        match self {
            Self::Internal(module) => module.actions(),
            Self::External(module) => module.actions(),
        }
    }

    /// Returns whether the module advertises the action.
    #[must_use]
    pub fn has_action(&self, action: &str) -> bool {
        match self {
            Self::Internal(module) => module.has_action(action),
            Self::External(module) => module.has_action(action),
        }
    }

    /// Validates an input document against the action's input schema.
    ///
    /// # Errors
    ///
    /// Returns a [`SchemaError`] when the action is unknown or the document
    /// does not conform.
    pub fn validate_input(&self, action: &str, document: &Value) -> Result<(), SchemaError> {
        match self {
            Self::Internal(module) => module.validate_input(action, document),
            Self::External(module) => module.validate_input(action, document),
        }
    }

    /// Validates a results document against the action's result schema.
    ///
    /// # Errors
    ///
    /// Returns a [`SchemaError`] when the action is unknown or the document
    /// does not conform.
    pub fn validate_results(&self, action: &str, document: &Value) -> Result<(), SchemaError> {
        match self {
            Self::Internal(module) => module.validate_results(action, document),
            Self::External(module) => module.validate_results(action, document),
        }
    }

    /// Executes the requested action.
    ///
    /// # Errors
    ///
    /// Returns a [`ModuleError`] when execution fails or its outcome cannot
    /// be processed.
    pub fn call(&self, request: &ActionRequest) -> Result<ActionOutcome, ModuleError> {
        match self {
            Self::Internal(module) => module.call(request),
            Self::External(module) => module.call(request),
        }
    }
}

impl From<InternalModule> for Module {
    fn from(module: InternalModule) -> Self {
        Self::Internal(module)
    }
}

impl From<ExternalModule> for Module {
    fn from(module: ExternalModule) -> Self {
        Self::External(module)
    }
}

//! Internal modules: built-in actions implemented in-process.
//!
//! Internal modules register the same per-action schemas and present the
//! same call surface as external modules, but dispatch to plain functions.
//! A handler that succeeds yields a zero exit code; a handler that fails
//! yields exit code 1 with its message on the stderr field. Everything
//! downstream treats the outcome identically.

use std::collections::HashMap;

use serde_json::Value;

use crate::error::ModuleError;
use crate::outcome::ActionOutcome;
use crate::request::ActionRequest;
use crate::schema::{SchemaError, SchemaSet};

/// In-process implementation of one action.
pub type ActionHandler = Box<dyn Fn(&ActionRequest) -> Result<Value, String> + Send + Sync>;

/// A module whose actions run inside the agent process.
pub struct InternalModule {
    name: String,
    description: String,
    config: Value,
    actions: Vec<String>,
    handlers: HashMap<String, ActionHandler>,
    input_schemas: SchemaSet,
    results_schemas: SchemaSet,
}

impl InternalModule {
    /// Creates an empty internal module.
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            config: Value::Null,
            actions: Vec::new(),
            handlers: HashMap::new(),
            input_schemas: SchemaSet::new(),
            results_schemas: SchemaSet::new(),
        }
    }

    /// Attaches a configuration document.
    #[must_use]
    pub fn with_config(mut self, config: Value) -> Self {
        self.config = config;
        self
    }

    /// Registers an action with its schemas and handler.
    ///
    /// # Errors
    ///
    /// Returns a [`SchemaError`] when either schema fails to compile or the
    /// action name is already registered.
    pub fn register_action(
        &mut self,
        action: &str,
        input_schema: &Value,
        results_schema: &Value,
        handler: ActionHandler,
    ) -> Result<(), SchemaError> {
        self.input_schemas.register(action, input_schema)?;
        self.results_schemas.register(action, results_schema)?;
        self.actions.push(action.to_owned());
        self.handlers.insert(action.to_owned(), handler);
        Ok(())
    }

    /// Returns the module name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the module description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the module configuration (`null` when absent).
    #[must_use]
    pub const fn config(&self) -> &Value {
        &self.config
    }

    /// Returns the registered action names, in registration order.
    #[must_use]
    pub fn actions(&self) -> &[String] {
        &self.actions
    }

    /// Returns whether the module registers the action.
    #[must_use]
    pub fn has_action(&self, action: &str) -> bool {
        self.handlers.contains_key(action)
    }

    /// Validates an input document against the action's input schema.
    ///
    /// # Errors
    ///
    /// Returns a [`SchemaError`] when the action is unknown or the document
    /// does not conform.
    pub fn validate_input(&self, action: &str, document: &Value) -> Result<(), SchemaError> {
        self.input_schemas.validate(action, document)
    }

    /// Validates a results document against the action's result schema.
    ///
    /// # Errors
    ///
    /// Returns a [`SchemaError`] when the action is unknown or the document
    /// does not conform.
    pub fn validate_results(&self, action: &str, document: &Value) -> Result<(), SchemaError> {
        self.results_schemas.validate(action, document)
    }

    /// Dispatches the request to the action's handler.
    ///
    /// # Errors
    ///
    /// Returns [`ModuleError::UnknownAction`] when the action has no
    /// handler. Handler failures are not errors at this layer; they become
    /// outcomes with exit code 1.
    pub fn call(&self, request: &ActionRequest) -> Result<ActionOutcome, ModuleError> {
        let handler = self
            .handlers
            .get(request.action())
            .ok_or_else(|| ModuleError::unknown_action(&self.name, request.action()))?;

        match handler(request) {
            Ok(results) => Ok(ActionOutcome::internal_success(results)),
            Err(message) => Ok(ActionOutcome::internal_failure(message)),
        }
    }
}

impl std::fmt::Debug for InternalModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InternalModule")
            .field("name", &self.name)
            .field("actions", &self.actions)
            .finish_non_exhaustive()
    }
}

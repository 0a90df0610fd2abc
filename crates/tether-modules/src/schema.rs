//! Named JSON-schema validators shared by module loading and dispatch.
//!
//! A [`SchemaSet`] compiles schema documents once at registration time and
//! validates instance documents against them by name. Modules keep one set
//! per concern (action inputs, action results, module configuration); all
//! sets are immutable after loading and safe to share across workers.

use std::collections::HashMap;

use jsonschema::Validator;
use serde_json::Value;
use thiserror::Error;

/// Errors arising from schema registration and validation.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// The schema document could not be compiled.
    #[error("failed to compile schema '{name}': {message}")]
    Compile {
        /// Name the schema was registered under.
        name: String,
        /// Compiler diagnostic.
        message: String,
    },

    /// A schema with the same name is already registered.
    #[error("schema '{name}' is already registered")]
    Duplicate {
        /// Name that collided.
        name: String,
    },

    /// No schema is registered under the requested name.
    #[error("no schema registered under '{name}'")]
    NotFound {
        /// Name that was looked up.
        name: String,
    },

    /// The document does not conform to the named schema.
    #[error("validation failure against schema '{name}': {message}")]
    Rejected {
        /// Name of the schema the document was checked against.
        name: String,
        /// First validation error reported by the validator.
        message: String,
    },
}

/// A named collection of compiled schema validators.
#[derive(Default)]
pub struct SchemaSet {
    validators: HashMap<String, Validator>,
}

impl SchemaSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Compiles and registers a schema under the given name.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Duplicate`] if the name is already taken, or
    /// [`SchemaError::Compile`] if the document is not a valid schema.
    pub fn register(&mut self, name: &str, schema: &Value) -> Result<(), SchemaError> {
        if self.validators.contains_key(name) {
            return Err(SchemaError::Duplicate {
                name: name.to_owned(),
            });
        }
        let validator = jsonschema::validator_for(schema).map_err(|error| SchemaError::Compile {
            name: name.to_owned(),
            message: error.to_string(),
        })?;
        self.validators.insert(name.to_owned(), validator);
        Ok(())
    }

    /// Returns whether a schema is registered under the given name.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.validators.contains_key(name)
    }

    /// Validates a document against the named schema.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::NotFound`] if no schema carries the name, or
    /// [`SchemaError::Rejected`] with the first validation error otherwise.
    pub fn validate(&self, name: &str, document: &Value) -> Result<(), SchemaError> {
        let validator = self
            .validators
            .get(name)
            .ok_or_else(|| SchemaError::NotFound {
                name: name.to_owned(),
            })?;
        validator
            .validate(document)
            .map_err(|error| SchemaError::Rejected {
                name: name.to_owned(),
                message: error.to_string(),
            })
    }

    /// Returns the number of registered schemas.
    #[must_use]
    pub fn len(&self) -> usize {
        self.validators.len()
    }

    /// Returns `true` when no schemas are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }
}

impl std::fmt::Debug for SchemaSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.validators.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("SchemaSet").field("names", &names).finish()
    }
}

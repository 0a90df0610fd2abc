//! Domain errors raised by module operations.
//!
//! Loading and processing failures are deliberately message-carrying: the
//! display text travels back to the broker inside PXP error replies, so the
//! wording is part of the protocol surface rather than free-form diagnostics.

use thiserror::Error;

use crate::schema::SchemaError;

/// Errors arising from module loading and action execution.
#[derive(Debug, Error)]
pub enum ModuleError {
    /// The module could not be loaded. A loading failure rejects the module
    /// as a whole; it is never partially registered.
    #[error("{message}")]
    Loading {
        /// Human-readable failure description.
        message: String,
    },

    /// An action ran but its outcome could not be turned into a result.
    #[error("{message}")]
    Processing {
        /// Human-readable failure description.
        message: String,
    },

    /// The module does not advertise the requested action.
    #[error("module '{module}' has no action '{action}'")]
    UnknownAction {
        /// Module that was asked.
        module: String,
        /// Action that was requested.
        action: String,
    },

    /// A document failed validation against a registered schema.
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

impl ModuleError {
    /// Creates a loading error with the given message.
    pub fn loading(message: impl Into<String>) -> Self {
        Self::Loading {
            message: message.into(),
        }
    }

    /// Creates a processing error with the given message.
    pub fn processing(message: impl Into<String>) -> Self {
        Self::Processing {
            message: message.into(),
        }
    }

    /// Creates an unknown-action error.
    pub fn unknown_action(module: impl Into<String>, action: impl Into<String>) -> Self {
        Self::UnknownAction {
            module: module.into(),
            action: action.into(),
        }
    }
}

//! Module registry keyed by name.
//!
//! The registry is populated once during agent startup and shared read-only
//! across workers afterwards. It understands modules, not actions: action
//! resolution happens by asking the module whether it advertises the name.

use std::collections::HashMap;

use thiserror::Error;

use crate::module::Module;

/// Errors raised while populating the registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A module with the same name is already registered.
    #[error("module '{name}' is already registered")]
    Duplicate {
        /// Name that collided.
        name: String,
    },
}

/// Registry of loaded modules.
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    modules: HashMap<String, Module>,
}

impl ModuleRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a module under its own name.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Duplicate`] if a module with the same name
    /// is already registered.
    pub fn register(&mut self, module: Module) -> Result<(), RegistryError> {
        let name = module.name().to_owned();
        if self.modules.contains_key(&name) {
            return Err(RegistryError::Duplicate { name });
        }
        self.modules.insert(name, module);
        Ok(())
    }

    /// Looks up a module by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Module> {
        self.modules.get(name)
    }

    /// Returns the registered module names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.modules.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Returns the number of registered modules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Returns `true` when no modules are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

//! Module metadata: the self-description external executables return when
//! probed.
//!
//! The metadata document is an object with a human-readable `description`,
//! an optional `configuration` schema for the module's own config, and an
//! `actions` array declaring one input and one results schema per action.
//! The validator for the document itself is a process-wide immutable value
//! built once on first use.

use jsonschema::Validator;
use once_cell::sync::Lazy;
use serde::Deserialize;
use serde_json::{Value, json};

/// Validator for the metadata document shape.
static METADATA_VALIDATOR: Lazy<Validator> = Lazy::new(|| {
    let schema = json!({
        "type": "object",
        "properties": {
            "description": { "type": "string" },
            "configuration": { "type": "object" },
            "actions": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "name": { "type": "string" },
                        "description": { "type": "string" },
                        "input": { "type": "object" },
                        "results": { "type": "object" }
                    },
                    "required": ["name", "input", "results"]
                }
            }
        },
        "required": ["description", "actions"]
    });
    jsonschema::validator_for(&schema).expect("module metadata schema must be valid")
});

/// Parsed metadata document of one module.
#[derive(Debug, Clone, Deserialize)]
pub struct ModuleMetadata {
    /// Human-readable module description.
    pub description: String,
    /// Schema describing the module's own configuration, when declared.
    #[serde(default)]
    pub configuration: Option<Value>,
    /// Declared actions, in advertisement order.
    pub actions: Vec<ActionMetadata>,
}

/// One action entry inside a metadata document.
#[derive(Debug, Clone, Deserialize)]
pub struct ActionMetadata {
    /// Action name, unique within the module.
    pub name: String,
    /// Optional human-readable description.
    #[serde(default)]
    pub description: Option<String>,
    /// Schema for the action's input document.
    pub input: Value,
    /// Schema for the action's results document.
    pub results: Value,
}

impl ModuleMetadata {
    /// Validates a raw metadata document and parses it.
    ///
    /// # Errors
    ///
    /// Returns the first validation error's message when the document does
    /// not match the metadata shape, or the deserialisation diagnostic when
    /// it cannot be read into the typed model.
    pub fn parse(document: &Value) -> Result<Self, String> {
        METADATA_VALIDATOR
            .validate(document)
            .map_err(|error| error.to_string())?;
        serde_json::from_value(document.clone()).map_err(|error| error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    fn reflect_metadata() -> Value {
        json!({
            "description": "reflects its input",
            "actions": [{
                "name": "reflect",
                "input": { "type": "object" },
                "results": { "type": "object" }
            }]
        })
    }

    #[test]
    fn parses_minimal_metadata() {
        let metadata = ModuleMetadata::parse(&reflect_metadata()).expect("parse");
        assert_eq!(metadata.description, "reflects its input");
        assert!(metadata.configuration.is_none());
        assert_eq!(metadata.actions.len(), 1);
        assert_eq!(metadata.actions[0].name, "reflect");
    }

    #[test]
    fn parses_configuration_entry() {
        let document = json!({
            "description": "configurable",
            "configuration": { "type": "object" },
            "actions": []
        });
        let metadata = ModuleMetadata::parse(&document).expect("parse");
        assert!(metadata.configuration.is_some());
    }

    #[rstest]
    #[case::missing_actions(json!({"description": "x"}))]
    #[case::missing_description(json!({"actions": []}))]
    #[case::action_without_input(json!({
        "description": "x",
        "actions": [{ "name": "a", "results": {} }]
    }))]
    #[case::action_without_name(json!({
        "description": "x",
        "actions": [{ "input": {}, "results": {} }]
    }))]
    #[case::not_an_object(json!("metadata"))]
    fn rejects_malformed_metadata(#[case] document: Value) {
        assert!(ModuleMetadata::parse(&document).is_err());
    }

    #[test]
    fn validation_is_repeatable() {
        // Probing a module twice must register identically; the validator
        // holds no state between calls.
        let document = reflect_metadata();
        let first = ModuleMetadata::parse(&document).expect("first parse");
        let second = ModuleMetadata::parse(&document).expect("second parse");
        assert_eq!(first.actions[0].name, second.actions[0].name);
        assert_eq!(first.description, second.description);
    }
}

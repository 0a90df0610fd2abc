//! Built-in internal modules shipped with the agent.

use serde_json::{Value, json};

use tether_modules::internal::InternalModule;
use tether_modules::schema::SchemaError;

/// Builds the `echo` module: one action that reflects its `argument` input
/// into the `outcome` field of its results.
///
/// # Errors
///
/// Returns a [`SchemaError`] if the echo schemas fail to compile.
pub fn echo_module() -> Result<InternalModule, SchemaError> {
    let mut module = InternalModule::new("echo", "echoes its argument back");
    module.register_action(
        "echo",
        &json!({
            "type": "object",
            "properties": { "argument": { "type": "string" } },
            "required": ["argument"]
        }),
        &json!({
            "type": "object",
            "properties": { "outcome": { "type": "string" } },
            "required": ["outcome"]
        }),
        Box::new(|request| {
            let argument = request
                .params()
                .get("argument")
                .and_then(Value::as_str)
                .ok_or_else(|| String::from("missing input 'argument'"))?;
            Ok(json!({"outcome": argument}))
        }),
    )?;
    Ok(module)
}

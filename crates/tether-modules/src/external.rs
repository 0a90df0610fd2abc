//! External modules: on-disk executables probed for metadata and invoked
//! per action.
//!
//! Loading launches the executable once with the single argument `metadata`
//! and registers the schemas its self-description declares. A module that
//! fails any loading step is rejected whole; it is never partially
//! registered. Calling branches on the request type: blocking actions are
//! answered from the captured stdout pipe, non-blocking actions from the
//! files the child writes into its results directory.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value, json};
use tracing::{debug, error, info, trace, warn};

use crate::error::ModuleError;
use crate::exec::{self, Execution};
use crate::metadata::ModuleMetadata;
use crate::outcome::ActionOutcome;
use crate::request::{ActionRequest, RequestType};
use crate::results::{self, EXITCODE_FILE, STDERR_FILE, STDOUT_FILE};
use crate::schema::{SchemaError, SchemaSet};

/// Tracing target for external module operations.
const EXTERNAL_TARGET: &str = "tether_modules::external";

/// Positional argument selecting the metadata probe mode.
const METADATA_ARGUMENT: &str = "metadata";

/// Exit code reserved by the module protocol for "failed to write output
/// files".
pub const FILE_ERROR_EXIT_CODE: i32 = 5;

/// A module backed by an on-disk executable.
#[derive(Debug)]
pub struct ExternalModule {
    name: String,
    path: PathBuf,
    description: String,
    config: Value,
    actions: Vec<String>,
    input_schemas: SchemaSet,
    results_schemas: SchemaSet,
    config_schemas: SchemaSet,
}

impl ExternalModule {
    /// Loads the module at `path`, probing its metadata and registering the
    /// schemas it declares.
    ///
    /// When `config` is provided and the metadata declares a
    /// `configuration` schema, the configuration is validated during
    /// loading.
    ///
    /// # Errors
    ///
    /// Returns [`ModuleError::Loading`] when the probe writes to stderr,
    /// the metadata is not valid JSON, the metadata document fails
    /// validation, the configuration does not conform to its declared
    /// schema, or any action schema fails to register.
    pub fn load(path: &Path, config: Option<Value>) -> Result<Self, ModuleError> {
        let name = module_name(path)?;
        let metadata = probe_metadata(path, &name)?;

        let mut module = Self {
            name,
            path: path.to_path_buf(),
            description: metadata.description.clone(),
            config: config.unwrap_or(Value::Null),
            actions: Vec::with_capacity(metadata.actions.len()),
            input_schemas: SchemaSet::new(),
            results_schemas: SchemaSet::new(),
            config_schemas: SchemaSet::new(),
        };

        module.register_configuration(metadata.configuration.as_ref())?;
        for action in &metadata.actions {
            module.register_action(&action.name, &action.input, &action.results)?;
        }

        Ok(module)
    }

    /// Returns the module name (file stem of the executable path).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the executable path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the metadata description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the module configuration (`null` when absent).
    #[must_use]
    pub const fn config(&self) -> &Value {
        &self.config
    }

    /// Returns the advertised action names, in metadata order.
    #[must_use]
    pub fn actions(&self) -> &[String] {
        &self.actions
    }

    /// Returns whether the module advertises the action.
    #[must_use]
    pub fn has_action(&self, action: &str) -> bool {
        self.actions.iter().any(|name| name == action)
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

    /// Executes the requested action.
    ///
    /// # Errors
    ///
    /// Returns [`ModuleError::Processing`] when the child's outcome cannot
    /// be turned into a result.
    pub fn call(&self, request: &ActionRequest) -> Result<ActionOutcome, ModuleError> {
        match request.kind() {
            RequestType::Blocking => self.call_blocking(request),
            RequestType::NonBlocking => self.call_non_blocking(request),
        }
    }

    fn call_blocking(&self, request: &ActionRequest) -> Result<ActionOutcome, ModuleError> {
        let action_args = self.action_arguments(request).to_string();

        info!(
            target: EXTERNAL_TARGET,
            label = request.pretty_label(),
            "executing the request"
        );
        trace!(
            target: EXTERNAL_TARGET,
            label = request.pretty_label(),
            input = %action_args,
            "action arguments"
        );

        let execution = exec::execute(&self.path, &[request.action()], Some(&action_args));
        ActionOutcome::parse(
            request,
            execution.exit_code,
            execution.stdout,
            execution.stderr,
        )
    }

    fn call_non_blocking(&self, request: &ActionRequest) -> Result<ActionOutcome, ModuleError> {
        // ActionRequest::non_blocking guarantees the directory is present.
        let Some(results_dir) = request.results_dir() else {
            return Err(ModuleError::processing(
                "non-blocking request carries no results directory",
            ));
        };
        let action_args = self.action_arguments(request).to_string();

        info!(
            target: EXTERNAL_TARGET,
            label = request.pretty_label(),
            results_dir = %results_dir.display(),
            "starting a task; stdout and stderr will be stored in the results directory"
        );
        trace!(
            target: EXTERNAL_TARGET,
            label = request.pretty_label(),
            input = %action_args,
            "action arguments"
        );

        let execution = exec::execute_with_pid_hook(
            &self.path,
            &[request.action()],
            Some(&action_args),
            |pid| {
                if let Err(write_error) = results::write_pid(results_dir, pid) {
                    error!(
                        target: EXTERNAL_TARGET,
                        label = request.pretty_label(),
                        error = %write_error,
                        "failed to record the task pid"
                    );
                }
            },
        );

        if execution.exit_code == FILE_ERROR_EXIT_CODE {
            // The outcome of the task will not be available for future
            // transaction status requests.
            let Execution { stdout, stderr, .. } = execution;
            warn!(
                target: EXTERNAL_TARGET,
                label = request.pretty_label(),
                stdout = %placeholder_if_empty(&stdout),
                stderr = %placeholder_if_empty(&stderr),
                "the task process failed to write output on file"
            );
            return Err(ModuleError::processing("failed to write output on file"));
        }

        let (out_text, err_text) = results::read_outcome(request, results_dir)?;
        ActionOutcome::parse(request, execution.exit_code, out_text, err_text)
    }

    /// Builds the action-arguments document fed to the child on stdin.
    fn action_arguments(&self, request: &ActionRequest) -> Value {
        let mut args = Map::new();
        args.insert(String::from("input"), request.params().clone());

        if !config_is_empty(&self.config) {
            args.insert(String::from("configuration"), self.config.clone());
        }

        if let Some(results_dir) = request.results_dir() {
            args.insert(
                String::from("output_files"),
                json!({
                    "stdout": results_dir.join(STDOUT_FILE).display().to_string(),
                    "stderr": results_dir.join(STDERR_FILE).display().to_string(),
                    "exitcode": results_dir.join(EXITCODE_FILE).display().to_string(),
                }),
            );
        }

        Value::Object(args)
    }

    fn register_configuration(&mut self, schema: Option<&Value>) -> Result<(), ModuleError> {
        let Some(schema) = schema else {
            debug!(
                target: EXTERNAL_TARGET,
                module = self.name,
                "found no configuration schema for module"
            );
            return Ok(());
        };

        if config_is_empty(&self.config) {
            debug!(
                target: EXTERNAL_TARGET,
                module = self.name,
                "module configuration will not be validated; no configuration was provided"
            );
            return Ok(());
        }

        debug!(
            target: EXTERNAL_TARGET,
            module = self.name,
            "registering module configuration schema"
        );
        self.config_schemas
            .register(&self.name, schema)
            .map_err(|register_error| {
                error!(
                    target: EXTERNAL_TARGET,
                    module = self.name,
                    error = %register_error,
                    "failed to parse the configuration schema"
                );
                ModuleError::loading(format!(
                    "invalid configuration schema of module {name}",
                    name = self.name
                ))
            })?;

        self.config_schemas
            .validate(&self.name, &self.config)
            .map_err(|validation_error| {
                ModuleError::loading(format!(
                    "invalid configuration of module {name}: {validation_error}",
                    name = self.name
                ))
            })
    }

    fn register_action(
        &mut self,
        action: &str,
        input: &Value,
        results: &Value,
    ) -> Result<(), ModuleError> {
        debug!(
            target: EXTERNAL_TARGET,
            module = self.name,
            action,
            "validating action schemas"
        );

        self.input_schemas
            .register(action, input)
            .and_then(|()| self.results_schemas.register(action, results))
            .map_err(|schema_error| {
                error!(
                    target: EXTERNAL_TARGET,
                    module = self.name,
                    action,
                    error = %schema_error,
                    "failed to parse action metadata schemas"
                );
                ModuleError::loading(format!(
                    "invalid schemas of '{module} {action}'",
                    module = self.name
                ))
            })?;

        self.actions.push(action.to_owned());
        debug!(
            target: EXTERNAL_TARGET,
            module = self.name,
            action,
            "action has been validated"
        );
        Ok(())
    }
}

/// Derives the module name from the executable path's file stem.
fn module_name(path: &Path) -> Result<String, ModuleError> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .map(str::to_owned)
        .ok_or_else(|| {
            ModuleError::loading(format!(
                "cannot derive a module name from '{path}'",
                path = path.display()
            ))
        })
}

/// Launches the metadata probe and validates its output.
fn probe_metadata(path: &Path, name: &str) -> Result<ModuleMetadata, ModuleError> {
    let execution = exec::execute(path, &[METADATA_ARGUMENT], None);

    if !execution.stderr.is_empty() {
        error!(
            target: EXTERNAL_TARGET,
            module = name,
            path = %path.display(),
            stderr = %execution.stderr,
            "failed to load the external module metadata"
        );
        return Err(ModuleError::loading("failed to load external module metadata"));
    }

    let document: Value = serde_json::from_str(&execution.stdout).map_err(|parse_error| {
        ModuleError::loading(format!(
            "metadata is not in a valid JSON format: {parse_error}"
        ))
    })?;
    debug!(target: EXTERNAL_TARGET, module = name, "metadata is valid JSON");

    let metadata = ModuleMetadata::parse(&document).map_err(|validation_error| {
        ModuleError::loading(format!("metadata validation failure: {validation_error}"))
    })?;
    debug!(target: EXTERNAL_TARGET, module = name, "metadata validation OK");

    Ok(metadata)
}

/// Returns whether a configuration document counts as empty.
fn config_is_empty(config: &Value) -> bool {
    match config {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

fn placeholder_if_empty(text: &str) -> &str {
    if text.is_empty() { "(empty)" } else { text }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    #[rstest]
    #[case::null(Value::Null, true)]
    #[case::empty_object(json!({}), true)]
    #[case::populated_object(json!({"token": "x"}), false)]
    #[case::scalar(json!(1), false)]
    fn config_emptiness(#[case] config: Value, #[case] expected: bool) {
        assert_eq!(config_is_empty(&config), expected);
    }

    #[rstest]
    #[case::plain("/opt/tether/modules/reverb", "reverb")]
    #[case::with_extension("/opt/tether/modules/reverb.rb", "reverb")]
    fn module_name_is_the_file_stem(#[case] path: &str, #[case] expected: &str) {
        assert_eq!(module_name(Path::new(path)).expect("stem"), expected);
    }

    #[test]
    fn module_name_rejects_empty_stem() {
        assert!(module_name(Path::new("/")).is_err());
    }
}

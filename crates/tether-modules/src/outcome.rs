//! Typed outcomes of action executions.
//!
//! An [`ActionOutcome`] captures the `(exit code, stdout, stderr)` triple of
//! one execution plus the results document parsed from stdout. Parsing does
//! not validate the results against the action's result schema; that is the
//! request processor's responsibility.

use serde_json::Value;
use tracing::{debug, trace};

use crate::error::ModuleError;
use crate::request::ActionRequest;

/// Tracing target for outcome parsing.
const OUTCOME_TARGET: &str = "tether_modules::outcome";

/// Exit code of a successful execution.
pub const SUCCESS_EXIT_CODE: i32 = 0;

/// Exit code used for in-process actions whose handler failed.
pub const INTERNAL_FAILURE_EXIT_CODE: i32 = 1;

/// Result of one action execution, immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionOutcome {
    exit_code: i32,
    stdout: String,
    stderr: String,
    results: Value,
}

impl ActionOutcome {
    /// Parses the captured execution triple into an outcome.
    ///
    /// Empty stdout from a clean exit is treated as the JSON value `null`:
    /// a module that produces no results is not an error by itself. Empty
    /// stdout from a failed execution, and stdout that is not valid JSON,
    /// are processing errors.
    ///
    /// # Errors
    ///
    /// Returns [`ModuleError::Processing`] with a message distinguishing
    /// the no-output and invalid-JSON sub-cases.
    pub fn parse(
        request: &ActionRequest,
        exit_code: i32,
        stdout: String,
        stderr: String,
    ) -> Result<Self, ModuleError> {
        if exit_code != SUCCESS_EXIT_CODE {
            trace!(
                target: OUTCOME_TARGET,
                label = request.pretty_label(),
                exit_code,
                stderr = %stderr,
                "execution failure"
            );
        } else if !stderr.is_empty() {
            trace!(
                target: OUTCOME_TARGET,
                label = request.pretty_label(),
                stderr = %stderr,
                "output on stderr"
            );
        }

        if stdout.is_empty() {
            if exit_code != SUCCESS_EXIT_CODE {
                debug!(
                    target: OUTCOME_TARGET,
                    label = request.pretty_label(),
                    "obtained no output on stdout"
                );
                return Err(Self::parse_error(request, "no output", &stderr));
            }
            trace!(
                target: OUTCOME_TARGET,
                label = request.pretty_label(),
                "obtained no results on stdout"
            );
            return Ok(Self {
                exit_code,
                stdout,
                stderr,
                results: Value::Null,
            });
        }

        trace!(
            target: OUTCOME_TARGET,
            label = request.pretty_label(),
            stdout = %stdout,
            "results on stdout"
        );

        match serde_json::from_str(&stdout) {
            Ok(results) => Ok(Self {
                exit_code,
                stdout,
                stderr,
                results,
            }),
            Err(error) => {
                debug!(
                    target: OUTCOME_TARGET,
                    label = request.pretty_label(),
                    error = %error,
                    stdout = %stdout,
                    "obtained invalid JSON on stdout"
                );
                Err(Self::parse_error(request, "invalid JSON", &stderr))
            }
        }
    }

    fn parse_error(request: &ActionRequest, detail: &str, stderr: &str) -> ModuleError {
        let stderr_part = if stderr.is_empty() {
            String::from(" (empty)")
        } else {
            format!("\n{stderr}")
        };
        ModuleError::processing(format!(
            "The task executed for the {label} returned {detail} on stdout - \
             stderr:{stderr_part}",
            label = request.pretty_label(),
        ))
    }

    /// Creates the outcome of a successful in-process action.
    #[must_use]
    pub fn internal_success(results: Value) -> Self {
        Self {
            exit_code: SUCCESS_EXIT_CODE,
            stdout: results.to_string(),
            stderr: String::new(),
            results,
        }
    }

    /// Creates the outcome of an in-process action whose handler failed.
    #[must_use]
    pub fn internal_failure(message: impl Into<String>) -> Self {
        Self {
            exit_code: INTERNAL_FAILURE_EXIT_CODE,
            stdout: String::new(),
            stderr: message.into(),
            results: Value::Null,
        }
    }

    /// Returns the process exit code (0 for in-process successes).
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        self.exit_code
    }

    /// Returns the captured stdout text.
    #[must_use]
    pub fn stdout(&self) -> &str {
        &self.stdout
    }

    /// Returns the captured stderr text.
    #[must_use]
    pub fn stderr(&self) -> &str {
        &self.stderr
    }

    /// Returns the parsed results document (`null` for empty stdout).
    #[must_use]
    pub const fn results(&self) -> &Value {
        &self.results
    }
}

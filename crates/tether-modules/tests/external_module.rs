//! Integration tests driving real external module executables.
//!
//! Modules are shell-script fixtures written into scratch directories; each
//! test exercises the loading or execution path end to end, child process
//! included.

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use serde_json::{Value, json};
use tempfile::TempDir;

use tether_modules::{
    ActionRequest, ExternalModule, ModuleError, ParsedChunks, RequestDescriptor, ResultsStore,
};

/// Metadata document advertising one `reflect` action.
fn reflect_metadata() -> Value {
    json!({
        "description": "reflects its input",
        "actions": [{
            "name": "reflect",
            "description": "returns the input document unchanged",
            "input": {
                "type": "object",
                "properties": { "x": { "type": "string" } },
                "required": ["x"]
            },
            "results": { "type": "object" }
        }]
    })
}

/// Writes an executable module script. The script answers the metadata
/// probe with `metadata_json` and runs `action_body` for any other
/// argument.
fn write_module(dir: &Path, name: &str, metadata_json: &str, action_body: &str) -> PathBuf {
    let path = dir.join(name);
    let script = format!(
        "#!/bin/sh\nif [ \"$1\" = \"metadata\" ]; then\ncat <<'METADATA'\n{metadata_json}\nMETADATA\nexit 0\nfi\n{action_body}\n"
    );
    fs::write(&path, script).expect("write module script");
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod module script");
    path
}

fn blocking_request(module: &str, params: Value) -> ActionRequest {
    ActionRequest::blocking(
        RequestDescriptor {
            id: "r1".into(),
            transaction_id: "t1".into(),
            sender: "broker/controller_1".into(),
            module: module.into(),
            action: "reflect".into(),
            params,
        },
        ParsedChunks::default(),
    )
}

fn non_blocking_request(module: &str, params: Value, results_dir: PathBuf) -> ActionRequest {
    ActionRequest::non_blocking(
        RequestDescriptor {
            id: "r2".into(),
            transaction_id: "t2".into(),
            sender: "broker/controller_1".into(),
            module: module.into(),
            action: "reflect".into(),
            params,
        },
        ParsedChunks::default(),
        results_dir,
    )
    .expect("non-empty results dir")
}

#[test]
fn loading_registers_declared_actions_and_schemas() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_module(
        dir.path(),
        "mirror",
        &reflect_metadata().to_string(),
        "exit 0",
    );

    let module = ExternalModule::load(&path, None).expect("load");
    assert_eq!(module.name(), "mirror");
    assert_eq!(module.description(), "reflects its input");
    assert_eq!(module.actions(), ["reflect"]);
    assert!(module.has_action("reflect"));

    module
        .validate_input("reflect", &json!({"x": "hi"}))
        .expect("conforming input");
    assert!(module.validate_input("reflect", &json!({"x": 42})).is_err());
}

#[test]
fn loading_is_idempotent_across_probes() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_module(
        dir.path(),
        "mirror",
        &reflect_metadata().to_string(),
        "exit 0",
    );

    let first = ExternalModule::load(&path, None).expect("first load");
    let second = ExternalModule::load(&path, None).expect("second load");
    assert_eq!(first.actions(), second.actions());
    assert_eq!(first.description(), second.description());
}

#[test]
fn loading_fails_when_the_probe_writes_stderr() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("grumpy");
    fs::write(&path, "#!/bin/sh\necho 'no metadata here' >&2\nexit 0\n").expect("write script");
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod");

    let error = ExternalModule::load(&path, None).expect_err("stderr rejects the module");
    assert_eq!(error.to_string(), "failed to load external module metadata");
}

#[test]
fn loading_fails_on_unparseable_metadata() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_module(dir.path(), "garbled", "this is not json", "exit 0");

    let error = ExternalModule::load(&path, None).expect_err("invalid JSON");
    assert!(
        error
            .to_string()
            .starts_with("metadata is not in a valid JSON format:")
    );
}

#[test]
fn loading_fails_on_metadata_validation_failure() {
    let dir = TempDir::new().expect("tempdir");
    // No actions array: the document parses but does not validate.
    let path = write_module(dir.path(), "sparse", r#"{"description":"x"}"#, "exit 0");

    let error = ExternalModule::load(&path, None).expect_err("missing actions");
    assert!(error.to_string().starts_with("metadata validation failure:"));
}

#[test]
fn loading_fails_on_duplicate_action_names() {
    let dir = TempDir::new().expect("tempdir");
    let metadata = json!({
        "description": "declares reflect twice",
        "actions": [
            { "name": "reflect", "input": {"type": "object"}, "results": {} },
            { "name": "reflect", "input": {"type": "object"}, "results": {} }
        ]
    });
    let path = write_module(dir.path(), "twice", &metadata.to_string(), "exit 0");

    let error = ExternalModule::load(&path, None).expect_err("duplicate action");
    assert_eq!(error.to_string(), "invalid schemas of 'twice reflect'");
}

#[test]
fn configuration_is_validated_against_the_declared_schema() {
    let dir = TempDir::new().expect("tempdir");
    let metadata = json!({
        "description": "configurable",
        "configuration": {
            "type": "object",
            "properties": { "token": { "type": "string" } },
            "required": ["token"]
        },
        "actions": [
            { "name": "reflect", "input": {"type": "object"}, "results": {} }
        ]
    });
    let path = write_module(dir.path(), "keyed", &metadata.to_string(), "exit 0");

    let module =
        ExternalModule::load(&path, Some(json!({"token": "abc"}))).expect("conforming config");
    assert_eq!(module.config(), &json!({"token": "abc"}));

    let error = ExternalModule::load(&path, Some(json!({"token": 42})))
        .expect_err("nonconforming config");
    assert!(matches!(error, ModuleError::Loading { .. }));
    assert!(error.to_string().contains("invalid configuration of module"));
}

#[test]
fn blocking_call_passes_input_through_unchanged() {
    let dir = TempDir::new().expect("tempdir");
    // The action echoes the whole action-arguments document from stdin.
    let path = write_module(dir.path(), "mirror", &reflect_metadata().to_string(), "cat");

    let module = ExternalModule::load(&path, None).expect("load");
    let params = json!({"x": "hi"});
    let outcome = module
        .call(&blocking_request("mirror", params.clone()))
        .expect("call");

    assert_eq!(outcome.exit_code(), 0);
    // JSON passthrough: the child received the params exactly, and no
    // output_files entry was added for a blocking request.
    assert_eq!(outcome.results().get("input"), Some(&params));
    assert!(outcome.results().get("output_files").is_none());
    assert!(outcome.results().get("configuration").is_none());
}

#[test]
fn blocking_call_with_empty_stdout_yields_null_results() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_module(
        dir.path(),
        "mute",
        &reflect_metadata().to_string(),
        "exit 0",
    );

    let module = ExternalModule::load(&path, None).expect("load");
    let outcome = module
        .call(&blocking_request("mute", json!({"x": "hi"})))
        .expect("empty stdout with clean exit is not an error");
    assert_eq!(outcome.results(), &Value::Null);
}

#[test]
fn blocking_call_with_invalid_stdout_is_a_processing_error() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_module(
        dir.path(),
        "chatty",
        &reflect_metadata().to_string(),
        "printf 'oops'",
    );

    let module = ExternalModule::load(&path, None).expect("load");
    let error = module
        .call(&blocking_request("chatty", json!({"x": "hi"})))
        .expect_err("non-JSON stdout");
    assert!(error.to_string().contains("returned invalid JSON on stdout"));
}

#[test]
fn non_blocking_call_reads_results_from_files_and_records_the_pid() {
    let spool = TempDir::new().expect("spool");
    let store = ResultsStore::new(spool.path());
    let results_dir = store.prepare("t2").expect("prepare");

    let dir = TempDir::new().expect("tempdir");
    let action_body = format!(
        "printf '{{\"y\":\"hi\"}}' > '{out}'\nprintf '' > '{err}'\nprintf '0' > '{code}'\nexit 0",
        out = results_dir.join("stdout").display(),
        err = results_dir.join("stderr").display(),
        code = results_dir.join("exitcode").display(),
    );
    let path = write_module(
        dir.path(),
        "mirror",
        &reflect_metadata().to_string(),
        &action_body,
    );

    let module = ExternalModule::load(&path, None).expect("load");
    let request = non_blocking_request("mirror", json!({"x": "hi"}), results_dir.clone());
    let outcome = module.call(&request).expect("call");

    assert_eq!(outcome.exit_code(), 0);
    assert_eq!(outcome.results(), &json!({"y": "hi"}));

    let pid_text = fs::read_to_string(results_dir.join("pid")).expect("pid file exists");
    assert!(pid_text.ends_with('\n'));
    assert!(pid_text.trim().parse::<u32>().is_ok());
}

#[test]
fn non_blocking_call_with_missing_stderr_file_is_tolerated() {
    let spool = TempDir::new().expect("spool");
    let store = ResultsStore::new(spool.path());
    let results_dir = store.prepare("t3").expect("prepare");

    let dir = TempDir::new().expect("tempdir");
    let action_body = format!(
        "printf 'null' > '{out}'\nexit 0",
        out = results_dir.join("stdout").display(),
    );
    let path = write_module(
        dir.path(),
        "quiet",
        &reflect_metadata().to_string(),
        &action_body,
    );

    let module = ExternalModule::load(&path, None).expect("load");
    let request = non_blocking_request("quiet", json!({"x": "hi"}), results_dir);
    let outcome = module.call(&request).expect("missing stderr file is fine");
    assert_eq!(outcome.results(), &Value::Null);
}

#[test]
fn non_blocking_exit_code_five_means_failed_to_write_output() {
    let spool = TempDir::new().expect("spool");
    let store = ResultsStore::new(spool.path());
    let results_dir = store.prepare("t4").expect("prepare");

    let dir = TempDir::new().expect("tempdir");
    // The child claims it could not open its output files; whatever it
    // printed is discarded.
    let path = write_module(
        dir.path(),
        "clumsy",
        &reflect_metadata().to_string(),
        "printf 'partial'\nexit 5",
    );

    let module = ExternalModule::load(&path, None).expect("load");
    let request = non_blocking_request("clumsy", json!({"x": "hi"}), results_dir);
    let error = module.call(&request).expect_err("exit code 5");
    assert_eq!(error.to_string(), "failed to write output on file");
}

#[test]
fn non_blocking_call_advertises_output_files_to_the_child() {
    let spool = TempDir::new().expect("spool");
    let store = ResultsStore::new(spool.path());
    let results_dir = store.prepare("t5").expect("prepare");

    let dir = TempDir::new().expect("tempdir");
    // Copy the action-arguments document into the stdout results file, so
    // the test can inspect what the child was told.
    let action_body = format!("cat > '{out}'\nexit 0", out = results_dir.join("stdout").display());
    let path = write_module(
        dir.path(),
        "probe",
        &reflect_metadata().to_string(),
        &action_body,
    );

    let module = ExternalModule::load(&path, None).expect("load");
    let request = non_blocking_request("probe", json!({"x": "hi"}), results_dir.clone());
    let outcome = module.call(&request).expect("call");

    let output_files = outcome
        .results()
        .get("output_files")
        .expect("output_files entry");
    assert_eq!(
        output_files.get("stdout").and_then(Value::as_str),
        Some(results_dir.join("stdout").display().to_string().as_str())
    );
    assert_eq!(
        output_files.get("stderr").and_then(Value::as_str),
        Some(results_dir.join("stderr").display().to_string().as_str())
    );
    assert_eq!(
        output_files.get("exitcode").and_then(Value::as_str),
        Some(results_dir.join("exitcode").display().to_string().as_str())
    );
}

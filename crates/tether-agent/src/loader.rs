//! Module discovery and registry population at startup.
//!
//! Built-ins register first, then every executable found in the modules
//! directory is probed and loaded. A module that fails to load is skipped
//! with an error log; startup continues with whatever loaded cleanly. The
//! registry is populated exactly once and never mutated afterwards.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, error, info, warn};

use tether_modules::external::ExternalModule;
use tether_modules::module::Module;
use tether_modules::registry::ModuleRegistry;

use crate::builtins;

/// Tracing target for module loading.
const LOADER_TARGET: &str = "tether_agent::loader";

/// Builds the registry: built-ins plus the external modules found on disk.
///
/// `modules_dir` is scanned for executable files; each is probed for
/// metadata. `modules_config_dir`, when provided, supplies per-module
/// configuration from `<name>.json` files.
#[must_use]
pub fn build_registry(
    modules_dir: Option<&Path>,
    modules_config_dir: Option<&Path>,
) -> ModuleRegistry {
    let mut registry = ModuleRegistry::new();

    match builtins::echo_module() {
        Ok(echo) => {
            if let Err(registry_error) = registry.register(Module::from(echo)) {
                error!(
                    target: LOADER_TARGET,
                    error = %registry_error,
                    "failed to register the echo module"
                );
            }
        }
        Err(schema_error) => error!(
            target: LOADER_TARGET,
            error = %schema_error,
            "failed to build the echo module"
        ),
    }

    if let Some(dir) = modules_dir {
        load_external_modules(&mut registry, dir, modules_config_dir);
    } else {
        debug!(target: LOADER_TARGET, "no modules directory configured");
    }

    info!(
        target: LOADER_TARGET,
        modules = ?registry.names(),
        "module registry populated"
    );
    registry
}

fn load_external_modules(
    registry: &mut ModuleRegistry,
    modules_dir: &Path,
    modules_config_dir: Option<&Path>,
) {
    let entries = match fs::read_dir(modules_dir) {
        Ok(entries) => entries,
        Err(read_error) => {
            error!(
                target: LOADER_TARGET,
                dir = %modules_dir.display(),
                error = %read_error,
                "failed to read the modules directory"
            );
            return;
        }
    };

    let mut paths: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| is_executable_file(path))
        .collect();
    paths.sort();

    for path in paths {
        let config = module_config(&path, modules_config_dir);
        match ExternalModule::load(&path, config) {
            Ok(module) => {
                let name = module.name().to_owned();
                match registry.register(Module::from(module)) {
                    Ok(()) => info!(
                        target: LOADER_TARGET,
                        module = name,
                        path = %path.display(),
                        "loaded external module"
                    ),
                    Err(registry_error) => error!(
                        target: LOADER_TARGET,
                        module = name,
                        error = %registry_error,
                        "skipping module"
                    ),
                }
            }
            Err(loading_error) => {
                // A bad module never prevents startup.
                error!(
                    target: LOADER_TARGET,
                    path = %path.display(),
                    error = %loading_error,
                    "failed to load external module, skipping it"
                );
            }
        }
    }
}

/// Reads `<modules_config_dir>/<stem>.json` when it exists.
fn module_config(module_path: &Path, modules_config_dir: Option<&Path>) -> Option<Value> {
    let config_dir = modules_config_dir?;
    let stem = module_path.file_stem()?;
    let config_path = config_dir.join(stem).with_extension("json");
    if !config_path.exists() {
        return None;
    }

    match fs::read_to_string(&config_path) {
        Ok(text) => match serde_json::from_str(&text) {
            Ok(config) => {
                debug!(
                    target: LOADER_TARGET,
                    path = %config_path.display(),
                    "read module configuration"
                );
                Some(config)
            }
            Err(parse_error) => {
                warn!(
                    target: LOADER_TARGET,
                    path = %config_path.display(),
                    error = %parse_error,
                    "ignoring unparseable module configuration"
                );
                None
            }
        },
        Err(read_error) => {
            warn!(
                target: LOADER_TARGET,
                path = %config_path.display(),
                error = %read_error,
                "ignoring unreadable module configuration"
            );
            None
        }
    }
}

#[cfg(unix)]
fn is_executable_file(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    path.is_file()
        && fs::metadata(path)
            .map(|metadata| metadata.permissions().mode() & 0o111 != 0)
            .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable_file(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_always_carries_the_echo_builtin() {
        let registry = build_registry(None, None);
        let echo = registry.get("echo").expect("echo is registered");
        assert!(echo.has_action("echo"));
    }

    #[cfg(unix)]
    mod unix {
        use std::os::unix::fs::PermissionsExt;

        use serde_json::json;

        use super::super::*;

        fn write_module(dir: &Path, name: &str, metadata: &Value) -> PathBuf {
            let path = dir.join(name);
            let script = format!(
                "#!/bin/sh\nif [ \"$1\" = \"metadata\" ]; then\ncat <<'METADATA'\n{metadata}\nMETADATA\nexit 0\nfi\nexit 0\n"
            );
            fs::write(&path, script).expect("write module");
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod");
            path
        }

        fn reflect_metadata() -> Value {
            json!({
                "description": "reflects",
                "actions": [
                    { "name": "reflect", "input": {"type": "object"}, "results": {} }
                ]
            })
        }

        #[test]
        fn loads_executable_modules_from_the_directory() {
            let dir = tempfile::tempdir().expect("tempdir");
            write_module(dir.path(), "mirror", &reflect_metadata());
            // Non-executable files are not modules.
            fs::write(dir.path().join("README"), "not a module").expect("write file");

            let registry = build_registry(Some(dir.path()), None);
            assert!(registry.get("mirror").is_some());
            assert!(registry.get("README").is_none());
        }

        #[test]
        fn a_failing_module_is_skipped_without_aborting_startup() {
            let dir = tempfile::tempdir().expect("tempdir");
            write_module(dir.path(), "mirror", &reflect_metadata());
            // Metadata missing the actions array fails validation.
            write_module(dir.path(), "sparse", &json!({"description": "x"}));

            let registry = build_registry(Some(dir.path()), None);
            assert!(registry.get("mirror").is_some());
            assert!(registry.get("sparse").is_none());
            assert!(registry.get("echo").is_some());
        }

        #[test]
        fn module_configuration_is_read_from_the_config_directory() {
            let modules = tempfile::tempdir().expect("modules dir");
            let configs = tempfile::tempdir().expect("config dir");
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
            write_module(modules.path(), "keyed", &metadata);
            fs::write(
                configs.path().join("keyed.json"),
                json!({"token": "abc"}).to_string(),
            )
            .expect("write config");

            let registry = build_registry(Some(modules.path()), Some(configs.path()));
            let keyed = registry.get("keyed").expect("keyed loads");
            assert_eq!(keyed.config(), &json!({"token": "abc"}));
        }

        #[test]
        fn missing_modules_directory_leaves_only_builtins() {
            let dir = tempfile::tempdir().expect("tempdir");
            let gone = dir.path().join("never-created");
            let registry = build_registry(Some(&gone), None);
            assert_eq!(registry.names(), vec!["echo"]);
        }
    }
}

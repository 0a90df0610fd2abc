//! Child-process runner for external module executables.
//!
//! Spawns an executable with piped stdio, feeds its stdin, and captures
//! stdout, stderr, and the exit code. The child inherits the parent's
//! environment and runs without a timeout: module binaries are trusted
//! local code and their own responsibility to terminate.
//!
//! A launch that fails outright (missing binary, permission denied) is not
//! an error at this layer; it yields the `-1` sentinel exit code with the
//! OS diagnostic on the captured stderr, so callers handle both shapes of
//! failure through one outcome path.

use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

use tracing::{debug, warn};

/// Tracing target for process execution.
const EXEC_TARGET: &str = "tether_modules::exec";

/// Sentinel exit code used when the child could not be launched at all.
pub const LAUNCH_FAILURE_EXIT_CODE: i32 = -1;

/// Captured result of one child execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Execution {
    /// Process exit code, or [`LAUNCH_FAILURE_EXIT_CODE`].
    pub exit_code: i32,
    /// Captured stdout, lossily decoded.
    pub stdout: String,
    /// Captured stderr, lossily decoded. Holds the spawn diagnostic when
    /// the launch itself failed.
    pub stderr: String,
}

/// Runs the executable to completion, capturing its output.
///
/// `input` is written to the child's stdin and the pipe is closed; `None`
/// gives the child a null stdin.
#[must_use]
pub fn execute(path: &Path, args: &[&str], input: Option<&str>) -> Execution {
    run(path, args, input, |_pid| {})
}

/// Runs the executable to completion, invoking `pid_hook` with the child's
/// pid immediately after a successful spawn.
///
/// The hook runs before the parent starts waiting, so external tooling can
/// observe the pid while the child is still alive.
#[must_use]
pub fn execute_with_pid_hook(
    path: &Path,
    args: &[&str],
    input: Option<&str>,
    pid_hook: impl FnOnce(u32),
) -> Execution {
    run(path, args, input, pid_hook)
}

fn run(path: &Path, args: &[&str], input: Option<&str>, pid_hook: impl FnOnce(u32)) -> Execution {
    let mut command = command_for(path);
    command
        .args(args)
        .stdin(if input.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    debug!(
        target: EXEC_TARGET,
        executable = %path.display(),
        ?args,
        "spawning module process"
    );

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(error) => {
            warn!(
                target: EXEC_TARGET,
                executable = %path.display(),
                %error,
                "failed to spawn module process"
            );
            return Execution {
                exit_code: LAUNCH_FAILURE_EXIT_CODE,
                stdout: String::new(),
                stderr: error.to_string(),
            };
        }
    };

    pid_hook(child.id());

    if let (Some(text), Some(mut stdin)) = (input, child.stdin.take()) {
        // A child that exits without draining stdin closes the pipe early;
        // that is its prerogative, not a launch failure.
        if let Err(error) = stdin.write_all(text.as_bytes()) {
            debug!(
                target: EXEC_TARGET,
                executable = %path.display(),
                %error,
                "child stopped reading stdin"
            );
        }
        // Dropping stdin closes the pipe to signal no more input.
    }

    match child.wait_with_output() {
        Ok(output) => Execution {
            exit_code: output.status.code().unwrap_or(LAUNCH_FAILURE_EXIT_CODE),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        },
        Err(error) => {
            warn!(
                target: EXEC_TARGET,
                executable = %path.display(),
                %error,
                "failed to collect module process output"
            );
            Execution {
                exit_code: LAUNCH_FAILURE_EXIT_CODE,
                stdout: String::new(),
                stderr: error.to_string(),
            }
        }
    }
}

/// Builds the platform launch command. Windows indirects through the
/// command interpreter; everywhere else the executable is invoked directly.
#[cfg(windows)]
fn command_for(path: &Path) -> Command {
    let mut command = Command::new("cmd.exe");
    command.arg("/c").arg(path);
    command
}

#[cfg(not(windows))]
fn command_for(path: &Path) -> Command {
    Command::new(path)
}

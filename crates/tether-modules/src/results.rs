//! On-disk results store for non-blocking jobs.
//!
//! Each non-blocking transaction owns one directory under the spool root,
//! identified by its transaction id. The child writes `stdout`, `stderr`,
//! and `exitcode`; the parent writes only `pid`, atomically, on spawn. The
//! agent never mutates the directory after the child exits; an external
//! sweeper reclaims it.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::Builder;
use tracing::{debug, error, trace};

use crate::error::ModuleError;
use crate::request::ActionRequest;

/// Tracing target for results-store operations.
const RESULTS_TARGET: &str = "tether_modules::results";

/// File holding the child's captured standard output.
pub const STDOUT_FILE: &str = "stdout";

/// File holding the child's captured standard error.
pub const STDERR_FILE: &str = "stderr";

/// File holding the child's decimal exit code.
pub const EXITCODE_FILE: &str = "exitcode";

/// File holding the child's decimal pid, written by the parent.
pub const PID_FILE: &str = "pid";

/// Errors raised while preparing or writing results-store entries.
#[derive(Debug, thiserror::Error)]
pub enum ResultsError {
    /// The per-transaction directory could not be created.
    #[error("failed to create results directory '{path}': {source}")]
    CreateDirectory {
        /// Directory that was being created.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The pid file could not be written.
    #[error("failed to write pid file '{path}': {source}")]
    WritePid {
        /// Pid file path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

/// Per-transaction results directories under one spool root.
#[derive(Debug, Clone)]
pub struct ResultsStore {
    spool_dir: PathBuf,
}

impl ResultsStore {
    /// Creates a store rooted at the given spool directory.
    #[must_use]
    pub fn new(spool_dir: impl Into<PathBuf>) -> Self {
        Self {
            spool_dir: spool_dir.into(),
        }
    }

    /// Returns the spool root.
    #[must_use]
    pub fn spool_dir(&self) -> &Path {
        &self.spool_dir
    }

    /// Creates (idempotently) and returns the directory for a transaction.
    ///
    /// # Errors
    ///
    /// Returns [`ResultsError::CreateDirectory`] when the directory cannot
    /// be created.
    pub fn prepare(&self, transaction_id: &str) -> Result<PathBuf, ResultsError> {
        let dir = self.spool_dir.join(transaction_id);
        fs::create_dir_all(&dir).map_err(|source| ResultsError::CreateDirectory {
            path: dir.clone(),
            source,
        })?;
        trace!(
            target: RESULTS_TARGET,
            transaction_id,
            dir = %dir.display(),
            "prepared results directory"
        );
        Ok(dir)
    }
}

/// Atomically writes `"<pid>\n"` to the directory's pid file.
///
/// The write goes to a sibling temporary file first and is renamed into
/// place, so a reader never observes an empty or partial pid file.
///
/// # Errors
///
/// Returns [`ResultsError::WritePid`] when the write or rename fails.
pub fn write_pid(results_dir: &Path, pid: u32) -> Result<(), ResultsError> {
    let path = results_dir.join(PID_FILE);
    atomic_write(&path, format!("{pid}\n").as_bytes()).map_err(|source| ResultsError::WritePid {
        path: path.clone(),
        source,
    })
}

/// Writes the provided bytes to the path using an atomic persist step.
fn atomic_write(path: &Path, contents: &[u8]) -> io::Result<()> {
    let directory = path.parent().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            "target path did not have a parent directory",
        )
    })?;

    let mut file = Builder::new()
        .prefix(
            path.file_name()
                .and_then(|name| name.to_str())
                .unwrap_or(PID_FILE),
        )
        .tempfile_in(directory)?;
    file.write_all(contents)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|error| error.error)?;
    Ok(())
}

/// Reads back the stdout and stderr files the child left in the results
/// directory.
///
/// A missing or unreadable stderr file is tolerated (logged, treated as
/// empty). A missing stdout file is tolerated too; the outcome parser then
/// sees empty output. An stdout file that exists but cannot be read is
/// fatal: the task ran, its results are lost.
///
/// # Errors
///
/// Returns [`ModuleError::Processing`] when the stdout file exists but
/// reading it fails.
pub fn read_outcome(
    request: &ActionRequest,
    results_dir: &Path,
) -> Result<(String, String), ModuleError> {
    let out_file = results_dir.join(STDOUT_FILE);
    let err_file = results_dir.join(STDERR_FILE);

    let mut err_text = String::new();
    if err_file.exists() {
        match fs::read_to_string(&err_file) {
            Ok(text) => {
                trace!(
                    target: RESULTS_TARGET,
                    file = %err_file.display(),
                    "read error file"
                );
                err_text = text;
            }
            Err(read_error) => {
                error!(
                    target: RESULTS_TARGET,
                    file = %err_file.display(),
                    module = request.module(),
                    action = request.action(),
                    error = %read_error,
                    "failed to read error file; will continue processing the output"
                );
            }
        }
    }

    let out_text = if out_file.exists() {
        match fs::read_to_string(&out_file) {
            Ok(text) => {
                if text.is_empty() {
                    trace!(
                        target: RESULTS_TARGET,
                        file = %out_file.display(),
                        "output file is empty"
                    );
                } else {
                    trace!(
                        target: RESULTS_TARGET,
                        file = %out_file.display(),
                        "read output file"
                    );
                }
                text
            }
            Err(read_error) => {
                error!(
                    target: RESULTS_TARGET,
                    file = %out_file.display(),
                    module = request.module(),
                    action = request.action(),
                    error = %read_error,
                    "failed to read output file"
                );
                return Err(ModuleError::processing("failed to read"));
            }
        }
    } else {
        debug!(
            target: RESULTS_TARGET,
            file = %out_file.display(),
            module = request.module(),
            action = request.action(),
            "output file does not exist"
        );
        String::new()
    };

    Ok((out_text, err_text))
}

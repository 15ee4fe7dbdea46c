//! Diagnostics handle for the hook process.
//!
//! The hook must keep stdout clean, so logs go to `hook.log` in a fresh
//! `hooklog*` temp directory, or to stderr when that file cannot be made.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::dispatcher::{self, DefaultGuard};
use tracing::Dispatch;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter (`EnvFilter` syntax).
pub const LOG_ENV: &str = "RAKSH_HOOK_LOG";

/// Log file name inside the log directory.
pub const LOG_FILE: &str = "hook.log";

/// Installed log subscriber.
///
/// The subscriber is active until this value is dropped; dropping it
/// flushes and syncs the log file.
pub struct Diagnostics {
    log_path: Option<PathBuf>,
    file: Option<Arc<File>>,
    _guard: DefaultGuard,
}

impl Diagnostics {
    /// Log to a new file under the system temp directory, else stderr.
    pub fn init() -> Self {
        match open_log_file() {
            Ok((path, file)) => {
                let guard = install(Dispatch::new(
                    tracing_subscriber::fmt()
                        .with_env_filter(filter())
                        .with_ansi(false)
                        .with_writer(file.clone())
                        .finish(),
                ));
                Self {
                    log_path: Some(path),
                    file: Some(file),
                    _guard: guard,
                }
            }
            Err(e) => {
                let guard = install(Dispatch::new(
                    tracing_subscriber::fmt()
                        .with_env_filter(filter())
                        .with_writer(io::stderr)
                        .finish(),
                ));
                tracing::info!("failed to log to file, using stderr: {}", e);
                Self {
                    log_path: None,
                    file: None,
                    _guard: guard,
                }
            }
        }
    }

    /// Path of the log file, `None` when logging to stderr.
    pub fn log_path(&self) -> Option<&Path> {
        self.log_path.as_deref()
    }
}

impl Drop for Diagnostics {
    fn drop(&mut self) {
        if let Some(file) = &self.file {
            let _ = (&**file).flush();
            let _ = file.sync_all();
        }
    }
}

fn filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"))
}

// The global default reaches the signal-handler thread; the scoped one
// is what ties the subscriber's lifetime to `Diagnostics`.
fn install(dispatch: Dispatch) -> DefaultGuard {
    let _ = dispatcher::set_global_default(dispatch.clone());
    dispatcher::set_default(&dispatch)
}

fn open_log_file() -> io::Result<(PathBuf, Arc<File>)> {
    let dir = tempfile::Builder::new().prefix("hooklog").tempdir()?.keep();
    let path = dir.join(LOG_FILE);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .mode(0o600)
        .open(&path)?;
    Ok((path, Arc::new(file)))
}

// Raksh Hook - Cleaner Module
//
// Removes staged plaintext when the hook is interrupted. The runtime kills
// a hook that exceeds its timeout; SIGTERM/SIGINT get a chance to scrub the
// staging directory before the process exits.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use tracing::{info, warn};

/// Staging directories that currently hold plaintext.
#[derive(Debug, Default)]
pub struct StagingRegistry {
    dirs: Mutex<BTreeSet<PathBuf>>,
}

impl StagingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `dir` as holding plaintext until [`StagingRegistry::unregister`].
    pub fn register(&self, dir: &Path) {
        if let Ok(mut dirs) = self.dirs.lock() {
            dirs.insert(dir.to_path_buf());
        }
    }

    pub fn unregister(&self, dir: &Path) {
        if let Ok(mut dirs) = self.dirs.lock() {
            dirs.remove(dir);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.dirs.lock().map(|d| d.is_empty()).unwrap_or(true)
    }

    /// Remove every registered directory from the host and clear the registry.
    ///
    /// Idempotent. Returns how many directories were removed.
    pub fn scrub_all(&self) -> usize {
        let dirs = match self.dirs.lock() {
            Ok(mut dirs) => std::mem::take(&mut *dirs),
            Err(_) => return 0,
        };

        let mut removed = 0;
        for dir in dirs {
            match remove_staging_dir(&dir) {
                Ok(()) => {
                    removed += 1;
                    info!(dir = %dir.display(), "scrubbed staging directory");
                }
                Err(e) => warn!(dir = %dir.display(), "failed to scrub staging directory: {}", e),
            }
        }
        removed
    }
}

/// Process-wide registry consulted by the signal handler.
pub fn registry() -> &'static StagingRegistry {
    static REGISTRY: OnceLock<StagingRegistry> = OnceLock::new();
    REGISTRY.get_or_init(StagingRegistry::new)
}

/// Remove a staging directory from the host; a missing directory is fine.
pub fn remove_staging_dir(dir: &Path) -> io::Result<()> {
    match fs::remove_dir_all(dir) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// Install SIGINT/SIGTERM handling that scrubs [`registry`] and exits 1.
///
/// The exit is non-zero so the runtime still treats the start as failed.
pub fn install_signal_handlers() {
    if let Err(e) = ctrlc::set_handler(|| {
        warn!("received termination signal");
        registry().scrub_all();
        std::process::exit(1);
    }) {
        warn!("failed to set signal handler: {}", e);
    }
}

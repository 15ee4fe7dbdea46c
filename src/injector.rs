//! Injection of the plaintext secret into a running container.
//!
//! # Security Guarantees
//!
//! - **Owner-only staging**: the staging directory is `0700` and the staged
//!   file `0600`
//! - **No bundle exposure**: the placeholder bind mount is unmounted and
//!   replaced by a tmpfs that only exists in the container's mount namespace
//! - **Scrubbed staging**: the staging directory is removed inside the
//!   namespace and then from the host, on success and on failure
//! - **Isolated staging**: each invocation stages below its own
//!   subdirectory, so a scrub never reaches another container's secret
//!
//! # Protocol
//!
//! 1. Stage plaintext at `<staging>/<secret file>`
//! 2. `umount <bundle>/<container secret path>`
//! 3. `mount` (mount table logged for diagnostics)
//! 4. `mount -t tmpfs tmpfs <bundle>/<container secret path>`
//! 5. `cp -a <staged file> <bundle>/<container secret path>`
//! 6. `rm -rf <staging>`
//!
//! Steps 2-6 run through a [`NamespaceExecutor`] in the mount and pid
//! namespaces of the container's init process.

use crate::cleaner::{self, StagingRegistry};
use crate::config::HookConfig;
use crate::error::{HookError, NamespaceOp, Result};
use crate::executor::NamespaceExecutor;
use crate::state::HookInvocation;
use std::fs::{DirBuilder, OpenOptions};
use std::io::Write;
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Write `plaintext` to `<dir>/<file_name>`, creating `dir` as `0700` if needed.
///
/// Rewriting the same plaintext leaves the same file behind.
///
/// # Errors
///
/// Returns [`HookError::StagingWriteFailed`] if the directory cannot be
/// created or the file cannot be written.
pub fn stage_secret(dir: &Path, file_name: &str, plaintext: &[u8]) -> Result<PathBuf> {
    info!(dir = %dir.display(), "write decrypted secret to shared memory");

    DirBuilder::new()
        .recursive(true)
        .mode(0o700)
        .create(dir)
        .map_err(|source| HookError::StagingWriteFailed {
            path: dir.to_path_buf(),
            source,
        })?;

    let path = dir.join(file_name);
    let write = || -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(&path)?;
        file.write_all(plaintext)?;
        file.sync_all()
    };
    write().map_err(|source| HookError::StagingWriteFailed {
        path: path.clone(),
        source,
    })?;

    Ok(path)
}

/// Staging directory for one invocation.
///
/// With per-container staging the container id names the subdirectory when
/// it is a single, ordinary path component; otherwise `pid-<pid>` does. The
/// shared root is only used when per-container staging is off.
pub fn staging_dir_for(config: &HookConfig, invocation: &HookInvocation) -> PathBuf {
    if !config.per_container_staging {
        return config.staging_dir.clone();
    }

    let id = invocation.container_id.as_str();
    let mut components = Path::new(id).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => config.staging_dir.join(id),
        _ => {
            if !id.is_empty() {
                warn!(container_id = id, "container id unusable as staging subdirectory");
            }
            config.staging_dir.join(format!("pid-{}", invocation.pid))
        }
    }
}

/// Drives the injection protocol for one invocation.
pub struct Injector<'a, E: NamespaceExecutor> {
    config: &'a HookConfig,
    executor: &'a E,
    registry: &'a StagingRegistry,
}

impl<'a, E: NamespaceExecutor> Injector<'a, E> {
    pub fn new(config: &'a HookConfig, executor: &'a E, registry: &'a StagingRegistry) -> Self {
        Self {
            config,
            executor,
            registry,
        }
    }

    /// Stage `plaintext` and swap the container's secrets mount for a tmpfs
    /// holding it.
    ///
    /// On a namespace failure the staging directory is still scrubbed and
    /// the original error is returned. The tmpfs is left mounted; the
    /// runtime aborts the container on a failed hook.
    pub fn inject(&self, invocation: &HookInvocation, plaintext: &[u8]) -> Result<()> {
        let staging = staging_dir_for(self.config, invocation);

        let staged = match stage_secret(&staging, &self.config.secret_file, plaintext) {
            Ok(path) => path,
            Err(e) => {
                if let Err(rm) = cleaner::remove_staging_dir(&staging) {
                    warn!(dir = %staging.display(), "failed to remove staging directory: {}", rm);
                }
                return Err(e);
            }
        };
        self.registry.register(&staging);

        let result = self
            .swap_mount(invocation, &staged)
            .and_then(|()| self.scrub(invocation.pid, &staging));

        match result {
            Ok(()) => {
                // `rm -rf` succeeds even when the path is not visible in
                // the container's mount namespace.
                if self.scrub_from_host(&staging) {
                    self.registry.unregister(&staging);
                }
                info!("modifying bind mount complete");
                Ok(())
            }
            Err(e) => {
                error!("secret injection failed: {}", e);
                if !matches!(e, HookError::NamespaceOpFailed { op: NamespaceOp::Scrub, .. }) {
                    // Best effort; the first error is the one reported.
                    let _ = self.scrub(invocation.pid, &staging);
                }
                if self.scrub_from_host(&staging) {
                    self.registry.unregister(&staging);
                }
                Err(e)
            }
        }
    }

    fn swap_mount(&self, invocation: &HookInvocation, staged: &Path) -> Result<()> {
        let pid = invocation.pid;
        let target = invocation.bundle.join(&self.config.container_secret_path);
        let target = target.to_string_lossy().into_owned();
        info!(pid, target = %target, "modifying bind mount");

        self.exec(pid, NamespaceOp::Unmount, &["umount", &target])?;

        let mounts = self.exec(pid, NamespaceOp::ListMounts, &["mount"])?;
        debug!("existing mount list inside the container: {}", mounts);

        self.exec(
            pid,
            NamespaceOp::MountTmpfs,
            &["mount", "-t", "tmpfs", "tmpfs", &target],
        )?;

        let staged = staged.to_string_lossy();
        self.exec(pid, NamespaceOp::Copy, &["cp", "-a", &staged, &target])?;

        Ok(())
    }

    fn scrub(&self, pid: i32, staging: &Path) -> Result<()> {
        let staging = staging.to_string_lossy();
        self.exec(pid, NamespaceOp::Scrub, &["rm", "-rf", &staging])
            .map(|_| ())
    }

    fn scrub_from_host(&self, staging: &Path) -> bool {
        match cleaner::remove_staging_dir(staging) {
            Ok(()) => true,
            Err(e) => {
                error!(dir = %staging.display(), "staging directory left behind: {}", e);
                false
            }
        }
    }

    fn exec(&self, pid: i32, op: NamespaceOp, argv: &[&str]) -> Result<String> {
        let argv: Vec<String> = argv.iter().map(|s| s.to_string()).collect();

        let out = self
            .executor
            .run(pid, &argv)
            .map_err(|e| HookError::NamespaceOpFailed {
                op,
                pid,
                reason: e.to_string(),
            })?;

        if !out.is_success() {
            let status = out
                .code
                .map_or_else(|| "killed by signal".to_string(), |c| format!("exit status {c}"));
            let reason = format!("{}: {}", status, out.output_lossy().trim_end());
            error!(op = %op, "{}", reason);
            return Err(HookError::NamespaceOpFailed { op, pid, reason });
        }

        Ok(out.output_lossy())
    }
}

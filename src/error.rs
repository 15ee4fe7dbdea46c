//! Error taxonomy for the secret-injection pipeline.
//!
//! Every stage returns one of these variants; nothing is retried. The
//! binary logs the error and exits non-zero so the runtime refuses to
//! start the container.

use std::fmt;
use std::path::PathBuf;

/// Result type alias for hook operations.
pub type Result<T> = std::result::Result<T, HookError>;

/// Namespace command that failed, used by [`HookError::NamespaceOpFailed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamespaceOp {
    Unmount,
    ListMounts,
    MountTmpfs,
    Copy,
    Scrub,
}

impl NamespaceOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unmount => "umount",
            Self::ListMounts => "mount",
            Self::MountTmpfs => "tmpfs mount",
            Self::Copy => "copy",
            Self::Scrub => "scrub",
        }
    }
}

impl fmt::Display for NamespaceOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can abort the hook.
#[derive(Debug, thiserror::Error)]
pub enum HookError {
    // =========================================================================
    // Invocation
    // =========================================================================
    /// The container state on stdin could not be decoded.
    #[error("malformed hook state: {0}")]
    MalformedState(String),

    /// The hook's own configuration file is unreadable or invalid.
    #[error("invalid hook configuration at {path}: {reason}")]
    InvalidHookConfig { path: PathBuf, reason: String },

    // =========================================================================
    // Bundle
    // =========================================================================
    /// `config.json` could not be read.
    #[error("unable to read bundle config {path}: {source}")]
    ConfigUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// `config.json` could not be parsed.
    #[error("unable to parse bundle config {path}: {source}")]
    ConfigMalformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// No mount destination contains the secrets tag.
    #[error("no mount with '{tag}' in its destination found in {config}")]
    MountNotFound { tag: String, config: PathBuf },

    // =========================================================================
    // Secret
    // =========================================================================
    /// The encrypted secret file could not be read in full.
    #[error("unable to read secret {path}: {source}")]
    SecretUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Decryption or its integrity check failed.
    #[error("secret decryption failed: {0}")]
    DecryptionFailed(String),

    // =========================================================================
    // Injection
    // =========================================================================
    /// The plaintext could not be written to the staging directory.
    #[error("unable to stage secret at {path}: {source}")]
    StagingWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A command inside the container's namespaces failed.
    #[error("{op} in namespaces of pid {pid} failed: {reason}")]
    NamespaceOpFailed {
        op: NamespaceOp,
        pid: i32,
        reason: String,
    },
}

impl HookError {
    /// Taxonomy name of this error, stable across message changes.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MalformedState(_) => "MalformedState",
            Self::InvalidHookConfig { .. } => "InvalidHookConfig",
            Self::ConfigUnreadable { .. } => "ConfigUnreadable",
            Self::ConfigMalformed { .. } => "ConfigMalformed",
            Self::MountNotFound { .. } => "MountNotFound",
            Self::SecretUnreadable { .. } => "SecretUnreadable",
            Self::DecryptionFailed(_) => "DecryptionFailed",
            Self::StagingWriteFailed { .. } => "StagingWriteFailed",
            Self::NamespaceOpFailed { .. } => "NamespaceOpFailed",
        }
    }
}

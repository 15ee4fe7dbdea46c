// Raksh Hook Configuration Module
//
// This module handles loading and validating the hook configuration from
// a YAML file. Every field has a default, so the file is optional.

use crate::decrypt::{AgeDecryptor, Decryptor, IdentityDecryptor};
use crate::error::{HookError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

/// Default location of the hook configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/raksh/hook.yaml";

/// Environment variable overriding [`DEFAULT_CONFIG_PATH`].
pub const CONFIG_ENV: &str = "RAKSH_HOOK_CONFIG";

/// Shared memory directory visible to the Kata VM and its containers.
pub const DEFAULT_STAGING_DIR: &str = "/run/kata-containers/sandbox/shm/raksh";

/// Decryption engine selection
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DecryptionEngine {
    /// Secrets are already in clear form
    #[default]
    Identity,
    /// age-encrypted secrets
    Age,
}

/// Decryption configuration
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct DecryptionConfig {
    pub engine: DecryptionEngine,

    /// age identity file, required when `engine` is `age`
    pub identity_file: Option<PathBuf>,
}

/// Main configuration structure
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct HookConfig {
    /// Substring identifying the secrets mount destination
    pub mount_tag: String,

    /// Name of the secret file, both in the mount source and in the container
    pub secret_file: String,

    /// Host directory used to stage plaintext before injection
    pub staging_dir: PathBuf,

    /// Secrets path relative to the bundle (e.g. "rootfs/etc/raksh")
    pub container_secret_path: PathBuf,

    /// nsenter binary name or path
    pub nsenter: String,

    /// Stage under `<staging_dir>/<container id>` instead of `<staging_dir>`
    pub per_container_staging: bool,

    pub decryption: DecryptionConfig,
}

impl Default for HookConfig {
    fn default() -> Self {
        Self {
            mount_tag: "raksh".to_string(),
            secret_file: "raksh.properties".to_string(),
            staging_dir: PathBuf::from(DEFAULT_STAGING_DIR),
            container_secret_path: PathBuf::from("rootfs/etc/raksh"),
            nsenter: "nsenter".to_string(),
            per_container_staging: true,
            decryption: DecryptionConfig::default(),
        }
    }
}

impl HookConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let invalid = |reason: String| HookError::InvalidHookConfig {
            path: path.to_path_buf(),
            reason,
        };

        let content = std::fs::read_to_string(path)
            .map_err(|e| invalid(format!("failed to read config file: {e}")))?;

        let config: HookConfig = serde_yaml::from_str(&content)
            .map_err(|e| invalid(format!("failed to parse config file: {e}")))?;

        config.validate().map_err(invalid)?;
        Ok(config)
    }

    /// Load from `$RAKSH_HOOK_CONFIG`, else from [`DEFAULT_CONFIG_PATH`].
    ///
    /// A missing default file yields the built-in defaults; a missing file
    /// named by the environment variable is an error.
    pub fn from_env() -> Result<Self> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_file(PathBuf::from(path)),
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => Self::from_file(DEFAULT_CONFIG_PATH),
            None => Ok(Self::default()),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.mount_tag.is_empty() {
            return Err("mount_tag cannot be empty".to_string());
        }

        if self.secret_file.is_empty()
            || self.secret_file.contains('/')
            || self.secret_file == "."
            || self.secret_file == ".."
        {
            return Err(format!(
                "secret_file must be a plain file name, got '{}'",
                self.secret_file
            ));
        }

        if !self.staging_dir.is_absolute() {
            return Err(format!(
                "staging_dir must be absolute, got '{}'",
                self.staging_dir.display()
            ));
        }

        // Joined onto the bundle path, so it has to stay below it.
        if self.container_secret_path.as_os_str().is_empty()
            || !self
                .container_secret_path
                .components()
                .all(|c| matches!(c, Component::Normal(_)))
        {
            return Err(format!(
                "container_secret_path must be relative to the bundle, got '{}'",
                self.container_secret_path.display()
            ));
        }

        if self.nsenter.is_empty() {
            return Err("nsenter cannot be empty".to_string());
        }

        if self.decryption.engine == DecryptionEngine::Age && self.decryption.identity_file.is_none()
        {
            return Err("decryption.identity_file is required for the age engine".to_string());
        }

        Ok(())
    }

    /// Build the configured decryption policy.
    pub fn decryptor(&self) -> Result<Box<dyn Decryptor>> {
        match (self.decryption.engine, &self.decryption.identity_file) {
            (DecryptionEngine::Identity, _) => Ok(Box::new(IdentityDecryptor)),
            (DecryptionEngine::Age, Some(identity)) => {
                Ok(Box::new(AgeDecryptor::new(identity)))
            }
            (DecryptionEngine::Age, None) => Err(HookError::DecryptionFailed(
                "age engine configured without identity_file".to_string(),
            )),
        }
    }
}

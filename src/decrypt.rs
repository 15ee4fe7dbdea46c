//! Decryption policies for the secret blob.
//!
//! The pipeline only sees the [`Decryptor`] trait. Key retrieval belongs to
//! the implementation, so the rest of the hook does not care which scheme
//! produced the ciphertext.
//!
//! # Implementations
//!
//! - [`IdentityDecryptor`]: secrets arrive in clear form (default)
//! - [`AgeDecryptor`]: age-encrypted blobs with an X25519 identity file

use crate::error::{HookError, Result};
use std::fs;
use std::io::Read;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::info;

/// Turns the encrypted secret into plaintext.
///
/// Implementations must be deterministic for a given key and ciphertext
/// and must return [`HookError::DecryptionFailed`] on any integrity
/// failure instead of partial output.
pub trait Decryptor {
    fn decrypt(&self, encrypted: &[u8]) -> Result<Vec<u8>>;
}

impl<D: Decryptor + ?Sized> Decryptor for Box<D> {
    fn decrypt(&self, encrypted: &[u8]) -> Result<Vec<u8>> {
        (**self).decrypt(encrypted)
    }
}

/// No-op policy for secrets protected at another layer.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityDecryptor;

impl Decryptor for IdentityDecryptor {
    fn decrypt(&self, encrypted: &[u8]) -> Result<Vec<u8>> {
        info!("decrypt secrets (identity)");
        Ok(encrypted.to_vec())
    }
}

/// Decrypts age files addressed to a single X25519 identity.
///
/// The identity file is read on every [`Decryptor::decrypt`] call, so a
/// missing or unreadable key surfaces at the decrypt stage.
pub struct AgeDecryptor {
    identity_file: PathBuf,
}

impl AgeDecryptor {
    pub fn new(identity_file: impl Into<PathBuf>) -> Self {
        Self {
            identity_file: identity_file.into(),
        }
    }

    /// Load the first `AGE-SECRET-KEY-` line of the identity file.
    ///
    /// Comment lines and blank lines are skipped, matching the layout
    /// `age-keygen` writes.
    fn load_identity(&self) -> Result<age::x25519::Identity> {
        let path = &self.identity_file;
        let content = fs::read_to_string(path).map_err(|e| {
            HookError::DecryptionFailed(format!(
                "unable to read identity file {}: {}",
                path.display(),
                e
            ))
        })?;

        let key = content
            .lines()
            .map(str::trim)
            .find(|line| line.starts_with("AGE-SECRET-KEY-"))
            .ok_or_else(|| {
                HookError::DecryptionFailed(format!("no age identity in {}", path.display()))
            })?;

        age::x25519::Identity::from_str(key)
            .map_err(|e| HookError::DecryptionFailed(format!("invalid age identity: {e}")))
    }
}

impl Decryptor for AgeDecryptor {
    fn decrypt(&self, encrypted: &[u8]) -> Result<Vec<u8>> {
        info!(identity_file = %self.identity_file.display(), "decrypt secrets (age)");
        let identity = self.load_identity()?;

        let decryptor = age::Decryptor::new(encrypted)
            .map_err(|e| HookError::DecryptionFailed(format!("invalid age header: {e}")))?;

        let mut reader = decryptor
            .decrypt(std::iter::once(&identity as &dyn age::Identity))
            .map_err(|e| HookError::DecryptionFailed(e.to_string()))?;

        let mut plaintext = Vec::new();
        reader
            .read_to_end(&mut plaintext)
            .map_err(|e| HookError::DecryptionFailed(format!("payload integrity: {e}")))?;

        Ok(plaintext)
    }
}

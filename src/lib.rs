//! Raksh Hook - OCI runtime hook for confidential container secrets.
//!
//! This library decodes the runtime's container state, finds the secrets
//! mount in the bundle, decrypts the secret, and swaps the container's
//! placeholder mount for a private tmpfs holding the plaintext.

pub mod bundle;
pub mod cleaner;
pub mod config;
pub mod decrypt;
pub mod error;
pub mod executor;
pub mod injector;
pub mod logging;
pub mod pipeline;
pub mod secret;
pub mod state;

pub use error::{HookError, NamespaceOp, Result};
pub use pipeline::Hook;

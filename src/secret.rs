//! Loading of the encrypted secret from the resolved bundle mount.

use crate::error::{HookError, Result};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use tracing::info;

/// Read `<source_dir>/<file_name>` in full.
///
/// The contents are opaque here. A read that ends before the size the file
/// had at open time is treated as a failure, not as a shorter secret.
///
/// # Errors
///
/// Returns [`HookError::SecretUnreadable`] if the file is missing,
/// unreadable, or changes size while being read.
pub fn load_secret(source_dir: &Path, file_name: &str) -> Result<Vec<u8>> {
    let path = source_dir.join(file_name);
    info!(path = %path.display(), "reading secret data");

    let unreadable = |source: io::Error| HookError::SecretUnreadable {
        path: path.clone(),
        source,
    };

    let mut file = File::open(&path).map_err(unreadable)?;
    let expected = file.metadata().map_err(unreadable)?.len();

    let mut data = Vec::with_capacity(expected as usize);
    file.read_to_end(&mut data).map_err(unreadable)?;

    if data.len() as u64 != expected {
        return Err(unreadable(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("read {} of {} bytes", data.len(), expected),
        )));
    }

    info!(bytes = data.len(), "secret data loaded");
    Ok(data)
}

//! Decoding of the OCI container state a runtime passes to its hooks.
//!
//! See the runtime-spec `state` definition: the hook receives one JSON
//! object on stdin before any other I/O happens.

use crate::error::{HookError, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::io::Read;
use std::path::PathBuf;

/// Raw state document as written by the runtime.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OciState {
    #[serde(default)]
    oci_version: String,
    #[serde(default)]
    id: String,
    #[serde(default)]
    status: String,
    pid: Option<i64>,
    bundle: Option<String>,
    #[serde(default)]
    annotations: HashMap<String, String>,
}

/// One hook invocation, decoded once at startup and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookInvocation {
    /// Absolute path to the OCI bundle.
    pub bundle: PathBuf,
    /// Pid of the container's init process.
    pub pid: i32,
    /// Container id; empty when the runtime did not send one.
    pub container_id: String,
    pub oci_version: String,
    pub status: String,
    pub annotations: HashMap<String, String>,
}

/// Read exactly one JSON state object from `reader`.
///
/// Anything after the first value is left unread.
///
/// # Errors
///
/// Returns [`HookError::MalformedState`] if the stream is empty or
/// truncated, is not a JSON object, or lacks a usable `bundle` or `pid`.
pub fn read_state<R: Read>(reader: R) -> Result<HookInvocation> {
    let mut values = serde_json::Deserializer::from_reader(reader).into_iter::<OciState>();

    let state = match values.next() {
        Some(Ok(state)) => state,
        Some(Err(e)) => return Err(HookError::MalformedState(e.to_string())),
        None => return Err(HookError::MalformedState("empty input".to_string())),
    };

    let bundle = match state.bundle {
        Some(b) if !b.is_empty() => PathBuf::from(b),
        Some(_) => return Err(HookError::MalformedState("bundle is empty".to_string())),
        None => return Err(HookError::MalformedState("missing field `bundle`".to_string())),
    };
    if !bundle.is_absolute() {
        return Err(HookError::MalformedState(format!(
            "bundle path is not absolute: {}",
            bundle.display()
        )));
    }

    let pid = match state.pid {
        Some(p) if p > 0 && p <= i64::from(i32::MAX) => p as i32,
        Some(p) => return Err(HookError::MalformedState(format!("invalid pid: {p}"))),
        None => return Err(HookError::MalformedState("missing field `pid`".to_string())),
    };

    Ok(HookInvocation {
        bundle,
        pid,
        container_id: state.id,
        oci_version: state.oci_version,
        status: state.status,
        annotations: state.annotations,
    })
}

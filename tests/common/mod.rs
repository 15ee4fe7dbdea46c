//! Common testing utilities for Raksh Hook integration tests.

#![allow(dead_code)]

use raksh_hook::config::HookConfig;
use raksh_hook::executor::{ExecOutput, NamespaceExecutor};
use std::cell::RefCell;
use std::fs;
use std::io;
use std::path::PathBuf;
use tempfile::TempDir;

/// Test context that manages a bundle, a secret source and a staging area.
pub struct TestContext {
    /// Path to temporary directory
    pub temp_path: PathBuf,
    /// The temporary directory (kept to prevent early deletion)
    _temp_dir: TempDir,
}

impl TestContext {
    /// Create a new test context with a temporary directory.
    pub fn new() -> anyhow::Result<Self> {
        let temp_dir = TempDir::new()?;
        let temp_path = temp_dir.path().to_path_buf();

        Ok(Self {
            temp_path,
            _temp_dir: temp_dir,
        })
    }

    /// Bundle directory, created on first use.
    pub fn bundle(&self) -> PathBuf {
        let bundle = self.temp_path.join("bundle");
        fs::create_dir_all(&bundle).unwrap();
        bundle
    }

    /// Secret source directory, created on first use.
    pub fn source(&self) -> PathBuf {
        let source = self.temp_path.join("source");
        fs::create_dir_all(&source).unwrap();
        source
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.temp_path.join("shm").join("raksh")
    }

    /// Write `<bundle>/config.json` with the given `(source, destination)` mounts.
    pub fn write_bundle_config(&self, mounts: &[(&str, &str)]) -> anyhow::Result<PathBuf> {
        let mounts: Vec<serde_json::Value> = mounts
            .iter()
            .map(|(source, destination)| {
                serde_json::json!({
                    "source": source,
                    "destination": destination,
                    "type": "bind",
                    "options": ["rbind", "ro"]
                })
            })
            .collect();
        let config = serde_json::json!({
            "ociVersion": "1.0.2",
            "root": {"path": "rootfs"},
            "mounts": mounts
        });

        let path = self.bundle().join("config.json");
        fs::write(&path, serde_json::to_vec_pretty(&config)?)?;
        Ok(path)
    }

    /// Write the encrypted secret into the source directory.
    pub fn write_secret(&self, content: &[u8]) -> anyhow::Result<PathBuf> {
        let path = self.source().join("raksh.properties");
        fs::write(&path, content)?;
        Ok(path)
    }

    /// OCI state document for this context's bundle.
    pub fn state_json(&self, pid: i32, id: &str) -> String {
        serde_json::json!({
            "ociVersion": "1.0.2",
            "id": id,
            "status": "created",
            "pid": pid,
            "bundle": self.bundle(),
        })
        .to_string()
    }

    /// Hook configuration staging under this context.
    pub fn hook_config(&self) -> HookConfig {
        HookConfig {
            staging_dir: self.staging_dir(),
            per_container_staging: false,
            ..HookConfig::default()
        }
    }

    /// Write the hook configuration as YAML for the binary.
    pub fn write_hook_config(&self) -> anyhow::Result<PathBuf> {
        let path = self.temp_path.join("hook.yaml");
        fs::write(&path, serde_yaml::to_string(&self.hook_config())?)?;
        Ok(path)
    }
}

/// One recorded namespace call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub pid: i32,
    pub argv: Vec<String>,
}

/// Fake executor that records calls and can fail one command.
#[derive(Default)]
pub struct RecordingExecutor {
    calls: RefCell<Vec<Call>>,
    copied: RefCell<Option<Vec<u8>>>,
    fail_on: Option<String>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call whose first argument is `command` exit with status 1.
    pub fn failing_on(command: &str) -> Self {
        Self {
            fail_on: Some(command.to_string()),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    /// Contents of the `cp` source file at the time of the copy.
    pub fn copied(&self) -> Option<Vec<u8>> {
        self.copied.borrow().clone()
    }

    /// First argument of every call, in order.
    pub fn commands(&self) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .map(|c| c.argv.first().cloned().unwrap_or_default())
            .collect()
    }
}

impl NamespaceExecutor for RecordingExecutor {
    fn run(&self, pid: i32, argv: &[String]) -> io::Result<ExecOutput> {
        self.calls.borrow_mut().push(Call {
            pid,
            argv: argv.to_vec(),
        });

        if let [command, _, source, ..] = argv {
            if command == "cp" {
                *self.copied.borrow_mut() = fs::read(source).ok();
            }
        }

        if let (Some(fail_on), Some(command)) = (&self.fail_on, argv.first()) {
            if fail_on == command {
                return Ok(ExecOutput {
                    code: Some(1),
                    output: format!("{command}: simulated failure").into_bytes(),
                });
            }
        }
        Ok(ExecOutput::success())
    }
}

//! Running commands inside a container's mount and pid namespaces.
//!
//! The injector never spawns processes itself; it hands each command to a
//! [`NamespaceExecutor`]. Production uses [`NsenterExecutor`], tests use a
//! recorder.

use std::cell::OnceCell;
use std::io;
use std::path::PathBuf;
use std::process::Command;
use sysinfo::{Pid, System};
use tracing::debug;

/// Exit status and combined stdout/stderr of one namespaced command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    /// Exit code; `None` when the command was killed by a signal.
    pub code: Option<i32>,
    pub output: Vec<u8>,
}

impl ExecOutput {
    pub fn success() -> Self {
        Self {
            code: Some(0),
            output: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == Some(0)
    }

    pub fn output_lossy(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }
}

/// Executes one command in the mount and pid namespaces of `pid`.
///
/// `Err` means the command could not be run at all. A command that ran and
/// failed is an `Ok` with a non-zero [`ExecOutput::code`].
pub trait NamespaceExecutor {
    fn run(&self, pid: i32, argv: &[String]) -> io::Result<ExecOutput>;
}

impl<E: NamespaceExecutor + ?Sized> NamespaceExecutor for &E {
    fn run(&self, pid: i32, argv: &[String]) -> io::Result<ExecOutput> {
        (**self).run(pid, argv)
    }
}

/// [`NamespaceExecutor`] backed by `nsenter -t <pid> -m -p`.
#[derive(Debug)]
pub struct NsenterExecutor {
    program: String,
    resolved: OnceCell<PathBuf>,
    checked_pid: OnceCell<i32>,
}

impl NsenterExecutor {
    /// `program` is a binary name looked up on `PATH`, or a path.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            resolved: OnceCell::new(),
            checked_pid: OnceCell::new(),
        }
    }

    fn binary(&self) -> io::Result<&PathBuf> {
        if let Some(path) = self.resolved.get() {
            return Ok(path);
        }
        let path = which::which(&self.program).map_err(|e| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("'{}' is not installed or not in PATH: {}", self.program, e),
            )
        })?;
        debug!(path = %path.display(), "resolved nsenter");
        Ok(self.resolved.get_or_init(|| path))
    }

    fn ensure_alive(&self, pid: i32) -> io::Result<()> {
        if self.checked_pid.get() == Some(&pid) {
            return Ok(());
        }
        let sys = System::new_all();
        if sys.process(Pid::from_u32(pid as u32)).is_none() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("container process {pid} is not running"),
            ));
        }
        let _ = self.checked_pid.set(pid);
        Ok(())
    }
}

impl NamespaceExecutor for NsenterExecutor {
    fn run(&self, pid: i32, argv: &[String]) -> io::Result<ExecOutput> {
        let binary = self.binary()?;
        self.ensure_alive(pid)?;

        debug!(pid, ?argv, "nsenter");
        let output = Command::new(binary)
            .arg("-t")
            .arg(pid.to_string())
            .arg("-m")
            .arg("-p")
            .arg("--")
            .args(argv)
            .output()?;

        let mut combined = output.stdout;
        combined.extend_from_slice(&output.stderr);

        Ok(ExecOutput {
            code: output.status.code(),
            output: combined,
        })
    }
}

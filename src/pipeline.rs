//! The hook pipeline: state → mount → secret → decrypt → inject.
//!
//! Stages run strictly in order and the first failure aborts the rest.

use crate::bundle::resolve_secret_mount;
use crate::cleaner::{self, StagingRegistry};
use crate::config::HookConfig;
use crate::decrypt::Decryptor;
use crate::error::Result;
use crate::executor::NamespaceExecutor;
use crate::injector::Injector;
use crate::secret::load_secret;
use crate::state::{read_state, HookInvocation};
use std::fmt;
use std::io::Read;
use tracing::{debug, error, info};

/// Pipeline position, logged on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ReadState,
    ResolveMount,
    LoadSecret,
    Decrypt,
    Inject,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ReadState => "read-state",
            Self::ResolveMount => "resolve-mount",
            Self::LoadSecret => "load-secret",
            Self::Decrypt => "decrypt",
            Self::Inject => "inject",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// One configured hook run.
pub struct Hook<E: NamespaceExecutor> {
    config: HookConfig,
    executor: E,
    decryptor: Box<dyn Decryptor>,
    registry: &'static StagingRegistry,
}

impl<E: NamespaceExecutor> Hook<E> {
    pub fn new(config: HookConfig, executor: E, decryptor: Box<dyn Decryptor>) -> Self {
        Self {
            config,
            executor,
            decryptor,
            registry: cleaner::registry(),
        }
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Run every stage against the state read from `input`.
    ///
    /// Returns the decoded invocation on success.
    pub fn run<R: Read>(&self, input: R) -> Result<HookInvocation> {
        let mut stage = Stage::ReadState;
        let result = self.run_stages(input, &mut stage);

        match &result {
            Ok(invocation) => info!(
                container_id = %invocation.container_id,
                pid = invocation.pid,
                "secret injected"
            ),
            Err(e) => error!(stage = %stage, kind = e.kind(), "hook failed: {}", e),
        }
        result
    }

    fn run_stages<R: Read>(&self, input: R, stage: &mut Stage) -> Result<HookInvocation> {
        let invocation = read_state(input)?;
        debug!(?invocation, "hook state");

        advance(stage, Stage::ResolveMount);
        let source = resolve_secret_mount(&invocation.bundle, &self.config.mount_tag)?;

        advance(stage, Stage::LoadSecret);
        let encrypted = load_secret(&source, &self.config.secret_file)?;

        advance(stage, Stage::Decrypt);
        let plaintext = self.decryptor.decrypt(&encrypted)?;

        advance(stage, Stage::Inject);
        Injector::new(&self.config, &self.executor, self.registry).inject(&invocation, &plaintext)?;

        advance(stage, Stage::Done);
        Ok(invocation)
    }
}

fn advance(stage: &mut Stage, next: Stage) {
    debug!(from = %stage, to = %next, "stage");
    *stage = next;
}

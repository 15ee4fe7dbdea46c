// Raksh Hook - OCI runtime hook for confidential container secrets
//
// This is the main entry point. The runtime runs it with the container
// state on stdin; a non-zero exit makes the runtime abort the container.

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use raksh_hook::cleaner;
use raksh_hook::config::HookConfig;
use raksh_hook::executor::NsenterExecutor;
use raksh_hook::logging::Diagnostics;
use raksh_hook::Hook;
use std::ffi::OsString;
use std::process::ExitCode;
use tracing::{error, info};

/// Raksh Hook - injects decrypted secrets into a container's tmpfs
#[derive(Parser, Debug)]
#[command(name = "raksh-hook")]
#[command(about = "OCI hook that injects decrypted secrets into a container", long_about = None)]
#[command(disable_version_flag = true)]
struct Cli {
    /// Start the hook
    #[arg(
        short = 's',
        action = ArgAction::Set,
        num_args = 0..=1,
        require_equals = true,
        default_value_t = true,
        default_missing_value = "true"
    )]
    start: bool,

    /// Print the hook's version
    #[arg(
        long,
        action = ArgAction::Set,
        num_args = 0..=1,
        require_equals = true,
        default_value_t = false,
        default_missing_value = "true"
    )]
    version: bool,
}

/// Build version, overridable at compile time with `RAKSH_HOOK_VERSION`.
fn version() -> &'static str {
    option_env!("RAKSH_HOOK_VERSION").unwrap_or(env!("CARGO_PKG_VERSION"))
}

/// Accept the single-dash `-version[=bool]` spelling runtimes are
/// configured with.
fn normalize_args(args: impl IntoIterator<Item = OsString>) -> Vec<OsString> {
    args.into_iter()
        .map(|arg| match arg.to_str() {
            Some(s) if s == "-version" || s.starts_with("-version=") => {
                OsString::from(format!("-{s}"))
            }
            _ => arg,
        })
        .collect()
}

fn run_hook() -> Result<()> {
    let config = HookConfig::from_env().context("Failed to load hook configuration")?;
    let decryptor = config
        .decryptor()
        .context("Failed to set up secret decryption")?;
    let executor = NsenterExecutor::new(config.nsenter.clone());

    cleaner::install_signal_handlers();

    let hook = Hook::new(config, executor, decryptor);
    hook.run(std::io::stdin().lock())
        .context("Failed to inject secrets")?;

    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse_from(normalize_args(std::env::args_os()));

    if cli.version {
        println!("{}", version());
        return ExitCode::SUCCESS;
    }

    let diagnostics = Diagnostics::init();
    if let Some(path) = diagnostics.log_path() {
        info!("log file: {}", path.display());
    }
    info!("started OCI hook version {}", version());

    if !cli.start {
        return ExitCode::SUCCESS;
    }

    info!("starting actual hook");
    match run_hook() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

//! The downstream cargo invocation.
//!
//! Builds the cargo command line for a [`BuildConfig`] and runs it with the
//! LLVM install prefix exported, so `llvm-sys` finds the freshly built LLVM.

use std::io;
use std::path::Path;

use thiserror::Error;
use tracing::info;

use crate::config::{BuildConfig, OptLevel};
use crate::exec::{Invocation, Runner};
use crate::pipeline::LazyEnvironment;
use crate::platform::{HostPlatform, PlatformError};

#[derive(Debug, Error)]
pub enum InvokeError {
  #[error(transparent)]
  Platform(#[from] PlatformError),

  /// The downstream tool ran and reported failure.
  #[error("{cmd} exited with code {code:?}")]
  Failed { cmd: String, code: Option<i32> },

  #[error("failed to run {cmd}: {source}")]
  Spawn {
    cmd: String,
    #[source]
    source: io::Error,
  },
}

pub struct Downstream<'a> {
  pub program: &'a str,
  pub prefix_env_var: &'a str,
  pub platform: &'a dyn HostPlatform,
}

impl<'a> Downstream<'a> {
  /// The command line for `config`, without any toolchain environment.
  pub fn command(&self, config: &BuildConfig, install_dir: &Path) -> Result<Invocation, InvokeError> {
    let mut invocation = Invocation::new(self.program).arg(config.action.cargo_subcommand());

    if config.action.requires_target() {
      invocation = invocation.args(["--target", self.platform.target_triple(config.arch)?]);
    }

    if config.opt_level == OptLevel::Release && config.action.accepts_profile() {
      invocation = invocation.arg("--release");
    }

    if !config.extra_args.is_empty() {
      invocation = invocation.arg("--").args(&config.extra_args);
    }

    Ok(invocation.env_var(self.prefix_env_var, install_dir))
  }

  /// Run the downstream tool. A non-zero exit is returned as
  /// [`InvokeError::Failed`] with the tool's own code.
  pub fn invoke(
    &self,
    config: &BuildConfig,
    install_dir: &Path,
    env: &mut LazyEnvironment,
    runner: &mut dyn Runner,
  ) -> Result<(), InvokeError> {
    let mut invocation = self.command(config, install_dir)?;
    if config.action.compiles() {
      invocation = invocation.environment(env.get(self.platform, runner)?.clone());
    }

    let cmd = invocation.display();
    info!(cmd = %cmd, prefix = %install_dir.display(), "running {}", self.program);

    let status = runner
      .run(&invocation)
      .map_err(|source| InvokeError::Spawn { cmd: cmd.clone(), source })?;

    if status.success() {
      Ok(())
    } else {
      Err(InvokeError::Failed { cmd, code: status.code })
    }
  }
}

//! One newt-build run: lock the root, fetch sources, configure and install
//! LLVM for the requested architecture, then hand over to cargo.
//!
//! Every step either completes, is skipped because its stage record says it
//! already completed, or fails the whole run. Nothing continues past a
//! failure.

use std::path::PathBuf;

use thiserror::Error;
use tracing::info;

use crate::config::{BuildConfig, ConfigError, Settings};
use crate::exec::Runner;
use crate::invoke::{Downstream, InvokeError};
use crate::layout::Layout;
use crate::lock::{LockError, RootLock};
use crate::pipeline::{LazyEnvironment, Pipeline, PipelineError};
use crate::platform::arch::Arch;
use crate::platform::{HostPlatform, PlatformError};
use crate::source::{FetchError, fetch_source};
use crate::state::DirectoryState;

#[derive(Debug, Error)]
pub enum BootstrapError {
  #[error(transparent)]
  Config(#[from] ConfigError),

  #[error(transparent)]
  Lock(#[from] LockError),

  #[error(transparent)]
  Fetch(#[from] FetchError),

  #[error(transparent)]
  Platform(#[from] PlatformError),

  #[error(transparent)]
  Pipeline(#[from] PipelineError),

  #[error(transparent)]
  Invoke(#[from] InvokeError),
}

impl BootstrapError {
  /// Exit code of the downstream tool when it is what failed.
  pub fn downstream_exit_code(&self) -> Option<i32> {
    match self {
      BootstrapError::Invoke(InvokeError::Failed { code, .. }) => *code,
      _ => None,
    }
  }
}

pub struct Bootstrap<'a> {
  settings: &'a Settings,
  layout: Layout,
  platform: &'a dyn HostPlatform,
}

impl<'a> Bootstrap<'a> {
  pub fn new(settings: &'a Settings, layout: Layout, platform: &'a dyn HostPlatform) -> Self {
    Self {
      settings,
      layout,
      platform,
    }
  }

  /// Make sure LLVM is installed for `arch` and return its install prefix.
  ///
  /// The root lock is held for the duration and released on return.
  pub fn prepare(
    &self,
    arch: Arch,
    command: &str,
    env: &mut LazyEnvironment,
    runner: &mut dyn Runner,
  ) -> Result<PathBuf, BootstrapError> {
    let _lock = RootLock::acquire(&self.layout, command, arch)?;
    let state = DirectoryState::new(self.layout.clone());

    fetch_source(&self.settings.archive_source(), &self.layout, &state)?;

    let pipeline = Pipeline::new(&self.layout, &state, self.platform, &self.settings.cmake.program);
    let prefix = pipeline.run(arch, env, runner)?;

    info!(arch = %arch, prefix = %prefix.display(), "LLVM ready");
    Ok(prefix)
  }

  /// Prepare LLVM, then run the cargo action described by `config`.
  pub fn run(&self, config: &BuildConfig, runner: &mut dyn Runner) -> Result<(), BootstrapError> {
    let mut env = LazyEnvironment::new(config.arch);
    let prefix = self.prepare(config.arch, config.action.cargo_subcommand(), &mut env, runner)?;

    let downstream = Downstream {
      program: &self.settings.cargo.program,
      prefix_env_var: &self.settings.cargo.prefix_env_var,
      platform: self.platform,
    };
    downstream.invoke(config, &prefix, &mut env, runner)?;

    Ok(())
  }
}

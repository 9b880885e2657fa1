//! Linux and macOS: the compiler is already on the default search path.

use std::collections::BTreeMap;

use tracing::debug;

use super::arch::Arch;
use super::env::EnvironmentMap;
use super::{HostPlatform, PlatformError};
use crate::config::Settings;
use crate::exec::Runner;

const DEFAULT_GENERATOR: &str = "Unix Makefiles";

/// Which Unix this is; only the target triples differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnixHost {
  Linux,
  Darwin,
}

impl UnixHost {
  /// `None` on Windows and on Unixes LLVM is not bootstrapped for.
  pub fn current() -> Option<Self> {
    if cfg!(target_os = "linux") {
      Some(Self::Linux)
    } else if cfg!(target_os = "macos") {
      Some(Self::Darwin)
    } else {
      None
    }
  }
}

#[derive(Debug, Clone)]
pub struct Unix {
  pub host: UnixHost,
  /// Only applied when the user configured some; empty by default.
  pub compiler_overrides: BTreeMap<String, String>,
  pub generator_override: Option<String>,
}

impl Unix {
  pub fn new(host: UnixHost) -> Self {
    Self {
      host,
      compiler_overrides: BTreeMap::new(),
      generator_override: None,
    }
  }

  pub fn from_settings(host: UnixHost, settings: &Settings) -> Self {
    Self {
      host,
      compiler_overrides: settings.compilers.clone().unwrap_or_default(),
      generator_override: settings.cmake.generator.clone(),
    }
  }
}

impl HostPlatform for Unix {
  fn name(&self) -> &'static str {
    match self.host {
      UnixHost::Linux => "linux",
      UnixHost::Darwin => "darwin",
    }
  }

  fn resolve_environment(&self, _arch: Arch, _runner: &mut dyn Runner) -> Result<EnvironmentMap, PlatformError> {
    debug!(overrides = self.compiler_overrides.len(), "using inherited environment");
    Ok(EnvironmentMap::inherited().with_overrides(&self.compiler_overrides))
  }

  fn cmake_generator(&self, _arch: Arch) -> Result<String, PlatformError> {
    Ok(
      self
        .generator_override
        .clone()
        .unwrap_or_else(|| DEFAULT_GENERATOR.to_string()),
    )
  }

  fn target_triple(&self, arch: Arch) -> Result<&'static str, PlatformError> {
    match (self.host, arch) {
      (UnixHost::Darwin, Arch::X64) => Ok("x86_64-apple-darwin"),
      (UnixHost::Linux, Arch::X64) => Ok("x86_64-unknown-linux-gnu"),
      (UnixHost::Linux, Arch::X86) => Ok("i686-unknown-linux-gnu"),
      _ => Err(PlatformError::UnsupportedArch {
        platform: self.name(),
        arch,
      }),
    }
  }

  fn configure_flags(&self, arch: Arch) -> Vec<String> {
    match arch {
      Arch::X86 => vec!["-DLLVM_BUILD_32_BITS=ON".to_string()],
      Arch::X64 => Vec::new(),
    }
  }
}

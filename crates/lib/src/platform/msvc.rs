//! Windows: MSVC is only usable from inside a Visual Studio developer
//! environment, so we locate an installation, run its `vcvars` script and
//! capture the environment it leaves behind.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::arch::Arch;
use super::env::EnvironmentMap;
use super::{HostPlatform, PlatformError};
use crate::config::Settings;
use crate::exec::{Invocation, Runner};

pub const DEFAULT_BASE_DIR: &str = r"C:\Program Files (x86)\Microsoft Visual Studio\2017";

/// Visual Studio editions, most preferred first.
pub const INSTALL_KINDS: [&str; 3] = ["Enterprise", "Professional", "Community"];

#[derive(Debug, Clone)]
pub struct Msvc {
  /// Directory holding one subdirectory per installed edition.
  pub base_dir: PathBuf,
  /// Explicit installation directory; skips edition probing.
  pub install_override: Option<PathBuf>,
  /// Always win over whatever `vcvars` reports.
  pub compiler_overrides: BTreeMap<String, String>,
  pub generator_override: Option<String>,
}

impl Msvc {
  pub fn new(base_dir: impl Into<PathBuf>) -> Self {
    Self {
      base_dir: base_dir.into(),
      install_override: None,
      compiler_overrides: default_compilers(),
      generator_override: None,
    }
  }

  pub fn from_settings(settings: &Settings) -> Self {
    Self {
      base_dir: settings
        .msvc
        .base_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_BASE_DIR)),
      install_override: settings.msvc.install.clone(),
      compiler_overrides: settings.compilers.clone().unwrap_or_else(default_compilers),
      generator_override: settings.cmake.generator.clone(),
    }
  }

  /// Locate the Visual Studio installation to use.
  pub fn find_install(&self) -> Result<PathBuf, PlatformError> {
    if let Some(path) = &self.install_override {
      return if path.is_dir() {
        Ok(path.clone())
      } else {
        Err(PlatformError::InstallOverrideMissing(path.clone()))
      };
    }

    INSTALL_KINDS
      .iter()
      .map(|kind| self.base_dir.join(kind))
      .find(|path| path.is_dir())
      .ok_or_else(|| PlatformError::NoToolchain {
        base: self.base_dir.clone(),
        kinds: INSTALL_KINDS.to_vec(),
      })
  }

  /// `cmd.exe /C call <vcvars> && set`: initialize, then dump the result.
  pub fn init_invocation(install: &Path, arch: Arch) -> Invocation {
    Invocation::new("cmd.exe")
      .args(["/C", "call"])
      .arg(vcvars_script(install, arch))
      .args(["&&", "set"])
  }
}

fn default_compilers() -> BTreeMap<String, String> {
  [("CC", "cl"), ("CXX", "cl")]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn vcvars_script(install: &Path, arch: Arch) -> PathBuf {
  let script = match arch {
    Arch::X64 => "vcvars64.bat",
    Arch::X86 => "vcvars32.bat",
  };
  install.join("VC").join("Auxiliary").join("Build").join(script)
}

impl HostPlatform for Msvc {
  fn name(&self) -> &'static str {
    "windows-msvc"
  }

  fn resolve_environment(&self, arch: Arch, runner: &mut dyn Runner) -> Result<EnvironmentMap, PlatformError> {
    let install = self.find_install()?;
    info!(install = %install.display(), arch = %arch, "initializing MSVC environment");

    let invocation = Self::init_invocation(&install, arch);
    let captured = runner.capture(&invocation)?;
    if !captured.status.success() {
      return Err(PlatformError::InitFailed {
        cmd: invocation.display(),
        code: captured.status.code,
      });
    }

    let env = EnvironmentMap::parse(&captured.stdout);
    if env.is_empty() {
      return Err(PlatformError::EmptyEnvironment(invocation.display()));
    }
    debug!(vars = env.len(), "captured MSVC environment");

    Ok(env.with_overrides(&self.compiler_overrides))
  }

  fn cmake_generator(&self, arch: Arch) -> Result<String, PlatformError> {
    if let Some(generator) = &self.generator_override {
      return Ok(generator.clone());
    }
    Ok(
      match arch {
        Arch::X86 => "Visual Studio 15 2017",
        Arch::X64 => "Visual Studio 15 2017 Win64",
      }
      .to_string(),
    )
  }

  fn target_triple(&self, arch: Arch) -> Result<&'static str, PlatformError> {
    Ok(match arch {
      Arch::X86 => "i686-pc-windows-msvc",
      Arch::X64 => "x86_64-pc-windows-msvc",
    })
  }
}

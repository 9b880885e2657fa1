//! Host platform capabilities.
//!
//! Everything that differs between host operating systems sits behind
//! [`HostPlatform`]: how to get an environment in which the C++ compiler is
//! reachable, which CMake generator to use, and which Rust target triple
//! matches an [`Arch`]. One implementation is picked at startup by [`detect`].

pub mod arch;
pub mod env;
pub mod msvc;
pub mod unix;

use std::path::PathBuf;

use thiserror::Error;

use crate::config::Settings;
use crate::exec::Runner;
use arch::Arch;
use env::EnvironmentMap;
use unix::UnixHost;

#[derive(Debug, Error)]
pub enum PlatformError {
  #[error("no Visual Studio installation found under {} (looked for: {})", .base.display(), .kinds.join(", "))]
  NoToolchain { base: PathBuf, kinds: Vec<&'static str> },

  #[error("configured Visual Studio installation does not exist: {}", .0.display())]
  InstallOverrideMissing(PathBuf),

  #[error("toolchain environment script failed with exit code {code:?}: {cmd}")]
  InitFailed { cmd: String, code: Option<i32> },

  #[error("toolchain environment script produced no variables: {0}")]
  EmptyEnvironment(String),

  #[error("{arch} is not supported on {platform}")]
  UnsupportedArch { platform: &'static str, arch: Arch },

  #[error("unsupported host operating system: {0}")]
  UnsupportedHost(String),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

pub trait HostPlatform {
  fn name(&self) -> &'static str;

  /// Environment in which the native compiler and CMake can be run.
  ///
  /// May spawn processes through `runner`; callers should resolve once and
  /// reuse the result.
  fn resolve_environment(&self, arch: Arch, runner: &mut dyn Runner) -> Result<EnvironmentMap, PlatformError>;

  fn cmake_generator(&self, arch: Arch) -> Result<String, PlatformError>;

  fn target_triple(&self, arch: Arch) -> Result<&'static str, PlatformError>;

  /// Extra flags passed to CMake at configure time.
  fn configure_flags(&self, _arch: Arch) -> Vec<String> {
    Vec::new()
  }
}

/// Pick the platform implementation for the running host.
pub fn detect(settings: &Settings) -> Result<Box<dyn HostPlatform>, PlatformError> {
  if cfg!(windows) {
    return Ok(Box::new(msvc::Msvc::from_settings(settings)));
  }
  let host = UnixHost::current().ok_or_else(|| PlatformError::UnsupportedHost(std::env::consts::OS.to_string()))?;
  Ok(Box::new(unix::Unix::from_settings(host, settings)))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn detect_picks_platform_for_host() {
    let platform = detect(&Settings::default()).unwrap();
    if cfg!(windows) {
      assert_eq!(platform.name(), "windows-msvc");
    } else if cfg!(target_os = "macos") {
      assert_eq!(platform.name(), "darwin");
    } else {
      assert_eq!(platform.name(), "linux");
    }
  }
}

//! Run configuration.
//!
//! Two layers live here:
//! - [`Settings`]: where LLVM comes from and how the tools are invoked, read
//!   from `newt-build.toml` and refined by environment variables.
//! - [`BuildConfig`]: what this particular run should do (arch, opt level,
//!   cargo action), built once from the command line.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::consts::{
  CONFIG_FILENAME, DEFAULT_ROOT_DIR, LLVM_PREFIX_ENV_VAR, LLVM_VERSION, MSVC_INSTALL_ENV_VAR, ROOT_ENV_VAR,
  llvm_archive_root, llvm_source_url,
};
use crate::layout::Layout;
use crate::platform::arch::Arch;
use crate::source::ArchiveSource;

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("config file not found: {}", .0.display())]
  NotFound(PathBuf),

  #[error("failed to read {}: {source}", .path.display())]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("invalid config {}: {source}", .path.display())]
  Parse {
    path: PathBuf,
    #[source]
    source: toml::de::Error,
  },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
  /// Bootstrap root; relative paths are taken from the working directory.
  pub root: Option<PathBuf>,
  pub llvm: LlvmSettings,
  pub cmake: CmakeSettings,
  pub cargo: CargoSettings,
  pub msvc: MsvcSettings,
  /// Compiler selection forced into the build environment (e.g. `CC`, `CXX`).
  pub compilers: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LlvmSettings {
  pub version: String,
  /// Defaults to the llvm.org release tarball for `version`.
  pub url: Option<String>,
  /// Defaults to `llvm-<version>.src`.
  pub archive_root: Option<String>,
  pub sha256: Option<String>,
}

impl Default for LlvmSettings {
  fn default() -> Self {
    Self {
      version: LLVM_VERSION.to_string(),
      url: None,
      archive_root: None,
      sha256: None,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CmakeSettings {
  pub program: String,
  pub generator: Option<String>,
}

impl Default for CmakeSettings {
  fn default() -> Self {
    Self {
      program: "cmake".to_string(),
      generator: None,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CargoSettings {
  pub program: String,
  /// Variable the install prefix is exported under.
  pub prefix_env_var: String,
}

impl Default for CargoSettings {
  fn default() -> Self {
    Self {
      program: "cargo".to_string(),
      prefix_env_var: LLVM_PREFIX_ENV_VAR.to_string(),
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MsvcSettings {
  pub base_dir: Option<PathBuf>,
  pub install: Option<PathBuf>,
}

impl Settings {
  /// Load settings from `path`, or from `newt-build.toml` in the working
  /// directory when no path is given. Only an explicitly named file has to
  /// exist. Environment overrides are applied afterwards.
  pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
    let settings = match path {
      Some(path) if !path.exists() => return Err(ConfigError::NotFound(path.to_path_buf())),
      Some(path) => Self::from_file(path)?,
      None if Path::new(CONFIG_FILENAME).exists() => Self::from_file(Path::new(CONFIG_FILENAME))?,
      None => Self::default(),
    };
    Ok(settings.with_env_overrides())
  }

  pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
    debug!(path = %path.display(), "loading config");
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
      path: path.to_path_buf(),
      source,
    })
  }

  /// Apply `NEWT_BUILD_ROOT` and `NEWT_MSVC_INSTALL`.
  pub fn with_env_overrides(mut self) -> Self {
    if let Ok(root) = std::env::var(ROOT_ENV_VAR) {
      self.root = Some(PathBuf::from(root));
    }
    if let Ok(install) = std::env::var(MSVC_INSTALL_ENV_VAR) {
      self.msvc.install = Some(PathBuf::from(install));
    }
    self
  }

  /// Absolute bootstrap root.
  pub fn root_dir(&self, cwd: &Path) -> PathBuf {
    match &self.root {
      Some(root) if root.is_absolute() => root.clone(),
      Some(root) => cwd.join(root),
      None => cwd.join(DEFAULT_ROOT_DIR),
    }
  }

  pub fn layout(&self, cwd: &Path) -> Layout {
    Layout::new(self.root_dir(cwd))
  }

  pub fn archive_source(&self) -> ArchiveSource {
    let version = &self.llvm.version;
    ArchiveSource {
      url: self.llvm.url.clone().unwrap_or_else(|| llvm_source_url(version)),
      root_dir: self
        .llvm
        .archive_root
        .clone()
        .unwrap_or_else(|| llvm_archive_root(version)),
      sha256: self.llvm.sha256.clone(),
    }
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OptLevel {
  #[default]
  Debug,
  Release,
}

/// Cargo actions newt-build can run after LLVM is in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
  Build,
  Run,
  Format,
  Lint,
  Clean,
  Doc,
}

impl Action {
  pub fn cargo_subcommand(&self) -> &'static str {
    match self {
      Action::Build => "build",
      Action::Run => "run",
      Action::Format => "fmt",
      Action::Lint => "clippy",
      Action::Clean => "clean",
      Action::Doc => "doc",
    }
  }

  /// Whether the action produces artifacts for a specific target.
  pub fn requires_target(&self) -> bool {
    matches!(self, Action::Build | Action::Run)
  }

  /// Whether cargo accepts `--release` for the action; `cargo fmt` does not.
  pub fn accepts_profile(&self) -> bool {
    !matches!(self, Action::Format)
  }

  /// Whether the action compiles code, and so needs the toolchain environment.
  pub fn compiles(&self) -> bool {
    matches!(self, Action::Build | Action::Run | Action::Lint | Action::Doc)
  }
}

impl FromStr for Action {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "build" => Ok(Action::Build),
      "run" => Ok(Action::Run),
      "fmt" | "format" => Ok(Action::Format),
      "clippy" | "lint" => Ok(Action::Lint),
      "clean" => Ok(Action::Clean),
      "doc" => Ok(Action::Doc),
      other => Err(format!("unknown action '{}'", other)),
    }
  }
}

/// What a single run should do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfig {
  pub arch: Arch,
  pub opt_level: OptLevel,
  pub action: Action,
  /// Forwarded to cargo after `--`.
  pub extra_args: Vec<String>,
}

impl BuildConfig {
  pub fn new(arch: Arch, opt_level: OptLevel, action: Action, extra_args: Vec<String>) -> Self {
    Self {
      arch,
      opt_level,
      action,
      extra_args,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serial_test::serial;
  use tempfile::TempDir;

  #[test]
  fn defaults_point_at_llvm_6() {
    let settings = Settings::default();
    let source = settings.archive_source();
    assert_eq!(source.url, "https://releases.llvm.org/6.0.1/llvm-6.0.1.src.tar.xz");
    assert_eq!(source.root_dir, "llvm-6.0.1.src");
    assert_eq!(settings.cargo.prefix_env_var, "LLVM_SYS_60_PREFIX");
    assert_eq!(settings.cargo.program, "cargo");
    assert_eq!(settings.cmake.program, "cmake");
  }

  #[test]
  fn parses_partial_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("newt-build.toml");
    std::fs::write(
      &path,
      r#"
root = "deps/llvm"

[llvm]
version = "7.0.0"
sha256 = "abc"

[cmake]
generator = "Ninja"

[compilers]
CC = "clang"
CXX = "clang++"
"#,
    )
    .unwrap();

    let settings = Settings::from_file(&path).unwrap();

    assert_eq!(settings.root, Some(PathBuf::from("deps/llvm")));
    assert_eq!(settings.archive_source().root_dir, "llvm-7.0.0.src");
    assert_eq!(settings.archive_source().sha256.as_deref(), Some("abc"));
    assert_eq!(settings.cmake.generator.as_deref(), Some("Ninja"));
    assert_eq!(settings.cmake.program, "cmake");
    assert_eq!(settings.compilers.unwrap().get("CXX").map(String::as_str), Some("clang++"));
  }

  #[test]
  fn unknown_keys_are_rejected() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("newt-build.toml");
    std::fs::write(&path, "[llvm]\nvresion = \"7\"\n").unwrap();

    assert!(matches!(Settings::from_file(&path), Err(ConfigError::Parse { .. })));
  }

  #[test]
  #[serial]
  fn explicit_missing_file_is_an_error() {
    let temp = TempDir::new().unwrap();
    let missing = temp.path().join("nope.toml");
    assert!(matches!(Settings::load(Some(&missing)), Err(ConfigError::NotFound(_))));
  }

  #[test]
  #[serial]
  fn env_overrides_file_values() {
    temp_env::with_vars(
      [
        (ROOT_ENV_VAR, Some("/opt/llvm-root")),
        (MSVC_INSTALL_ENV_VAR, Some("/opt/vs")),
      ],
      || {
        let settings = Settings::default().with_env_overrides();
        assert_eq!(settings.root, Some(PathBuf::from("/opt/llvm-root")));
        assert_eq!(settings.msvc.install, Some(PathBuf::from("/opt/vs")));
      },
    );
  }

  #[test]
  fn root_is_made_absolute() {
    let cwd = Path::new("/work/newt");
    let mut settings = Settings::default();
    assert_eq!(settings.root_dir(cwd), cwd.join("llvm"));

    settings.root = Some(PathBuf::from("deps"));
    assert_eq!(settings.root_dir(cwd), cwd.join("deps"));

    let abs = std::env::temp_dir().join("abs-root");
    settings.root = Some(abs.clone());
    assert_eq!(settings.root_dir(cwd), abs);
  }

  #[test]
  fn action_properties() {
    assert!(Action::Build.requires_target());
    assert!(Action::Run.requires_target());
    for action in [Action::Format, Action::Lint, Action::Clean, Action::Doc] {
      assert!(!action.requires_target(), "{:?}", action);
    }
    assert!(!Action::Format.compiles());
    assert!(!Action::Clean.compiles());
    assert!(Action::Lint.compiles());
    assert_eq!(Action::Lint.cargo_subcommand(), "clippy");
    assert!(!Action::Format.accepts_profile());
    assert!(Action::Clean.accepts_profile());
    assert_eq!("format".parse::<Action>(), Ok(Action::Format));
  }
}

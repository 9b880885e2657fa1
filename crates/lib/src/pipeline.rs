//! The LLVM configure → build+install pipeline for one architecture.
//!
//! Each stage is guarded by its [`StageState`] record: a completed stage is
//! skipped without spawning anything, and a failed stage has its output
//! directory removed so the next run starts it over instead of mistaking the
//! leftovers for success.

use std::fs;
use std::io;
use std::path::PathBuf;

use thiserror::Error;
use tracing::{info, warn};

use crate::exec::{Invocation, Runner};
use crate::layout::Layout;
use crate::platform::arch::Arch;
use crate::platform::env::EnvironmentMap;
use crate::platform::{HostPlatform, PlatformError};
use crate::state::{Stage, StageState};

/// LLVM itself is always an optimized build, whatever the cargo profile.
const LLVM_BUILD_TYPE: &str = "Release";

#[derive(Debug, Error)]
pub enum PipelineError {
  #[error(transparent)]
  Platform(#[from] PlatformError),

  #[error("{stage} failed with exit code {code:?}: {cmd}")]
  StageFailed {
    stage: Stage,
    cmd: String,
    code: Option<i32>,
  },

  #[error("failed to run {cmd}: {source}")]
  Spawn {
    cmd: String,
    #[source]
    source: io::Error,
  },

  #[error("io error: {0}")]
  Io(#[from] io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
  Skipped,
  Ran,
}

/// Toolchain environment resolved on first use and reused afterwards.
#[derive(Debug)]
pub struct LazyEnvironment {
  arch: Arch,
  resolved: Option<EnvironmentMap>,
}

impl LazyEnvironment {
  pub fn new(arch: Arch) -> Self {
    Self { arch, resolved: None }
  }

  pub fn is_resolved(&self) -> bool {
    self.resolved.is_some()
  }

  pub fn get(&mut self, platform: &dyn HostPlatform, runner: &mut dyn Runner) -> Result<&EnvironmentMap, PlatformError> {
    let env = match self.resolved.take() {
      Some(env) => env,
      None => platform.resolve_environment(self.arch, runner)?,
    };
    Ok(self.resolved.insert(env))
  }
}

pub struct Pipeline<'a> {
  layout: &'a Layout,
  state: &'a dyn StageState,
  platform: &'a dyn HostPlatform,
  cmake: &'a str,
}

impl<'a> Pipeline<'a> {
  pub fn new(layout: &'a Layout, state: &'a dyn StageState, platform: &'a dyn HostPlatform, cmake: &'a str) -> Self {
    Self {
      layout,
      state,
      platform,
      cmake,
    }
  }

  /// Run both stages and return the install prefix.
  pub fn run(&self, arch: Arch, env: &mut LazyEnvironment, runner: &mut dyn Runner) -> Result<PathBuf, PipelineError> {
    self.configure(arch, env, runner)?;
    self.install(arch, env, runner)?;
    Ok(self.layout.install_dir(arch))
  }

  /// Generate the CMake build tree in `build-<arch>/`.
  pub fn configure(&self, arch: Arch, env: &mut LazyEnvironment, runner: &mut dyn Runner) -> Result<StageOutcome, PipelineError> {
    let stage = Stage::Configure(arch);
    let build_dir = self.layout.build_dir(arch);

    if self.state.is_complete(stage) {
      info!(arch = %arch, path = %build_dir.display(), "already configured");
      return Ok(StageOutcome::Skipped);
    }

    let generator = self.platform.cmake_generator(arch)?;
    let environment = env.get(self.platform, runner)?.clone();

    info!(arch = %arch, generator = %generator, "configuring LLVM");
    fs::create_dir_all(&build_dir)?;

    let invocation = Invocation::new(self.cmake)
      .arg(self.layout.source_dir())
      .arg(format!("-DCMAKE_INSTALL_PREFIX={}", self.layout.install_dir(arch).display()))
      .arg(format!("-DCMAKE_BUILD_TYPE={}", LLVM_BUILD_TYPE))
      .args(["-G", generator.as_str()])
      .arg("-DLLVM_ENABLE_ASSERTIONS=1")
      .args(self.platform.configure_flags(arch))
      .current_dir(&build_dir)
      .environment(environment);

    self.run_stage(stage, &invocation, runner)
  }

  /// Build LLVM and install it into `<arch>/`.
  pub fn install(&self, arch: Arch, env: &mut LazyEnvironment, runner: &mut dyn Runner) -> Result<StageOutcome, PipelineError> {
    let stage = Stage::Install(arch);
    let install_dir = self.layout.install_dir(arch);

    if self.state.is_complete(stage) {
      info!(arch = %arch, path = %install_dir.display(), "already installed");
      return Ok(StageOutcome::Skipped);
    }

    let environment = env.get(self.platform, runner)?.clone();

    info!(arch = %arch, prefix = %install_dir.display(), "building and installing LLVM");
    // `--config` selects the configuration for multi-config generators such
    // as Visual Studio; single-config generators ignore it.
    let invocation = Invocation::new(self.cmake)
      .args(["--build", ".", "--target", "install", "--config", LLVM_BUILD_TYPE])
      .current_dir(self.layout.build_dir(arch))
      .environment(environment);

    let outcome = self.run_stage(stage, &invocation, runner)?;
    if !self.state.is_complete(stage) {
      warn!(path = %install_dir.display(), "install step succeeded but left no install directory");
    }
    Ok(outcome)
  }

  fn run_stage(&self, stage: Stage, invocation: &Invocation, runner: &mut dyn Runner) -> Result<StageOutcome, PipelineError> {
    let cmd = invocation.display();

    let failure = match runner.run(invocation) {
      Ok(status) if status.success() => return Ok(StageOutcome::Ran),
      Ok(status) => PipelineError::StageFailed {
        stage,
        cmd,
        code: status.code,
      },
      Err(source) => PipelineError::Spawn { cmd, source },
    };

    warn!(stage = %stage, "stage failed, removing its output");
    if let Err(err) = self.state.reset(stage) {
      warn!(stage = %stage, error = %err, "could not remove the failed stage's output, delete it before retrying");
    }
    Err(failure)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::exec::Status;
  use crate::platform::unix::{Unix, UnixHost};
  use crate::state::DirectoryState;
  use crate::util::testutil::RecordingRunner;
  use std::cell::Cell;
  use std::rc::Rc;
  use tempfile::TempDir;
  use tracing_test::traced_test;

  /// Counts environment resolutions and never spawns.
  struct CountingPlatform {
    inner: Unix,
    resolutions: Rc<Cell<usize>>,
  }

  impl HostPlatform for CountingPlatform {
    fn name(&self) -> &'static str {
      "counting"
    }

    fn resolve_environment(&self, arch: Arch, runner: &mut dyn Runner) -> Result<EnvironmentMap, PlatformError> {
      self.resolutions.set(self.resolutions.get() + 1);
      self.inner.resolve_environment(arch, runner)
    }

    fn cmake_generator(&self, arch: Arch) -> Result<String, PlatformError> {
      self.inner.cmake_generator(arch)
    }

    fn target_triple(&self, arch: Arch) -> Result<&'static str, PlatformError> {
      self.inner.target_triple(arch)
    }

    fn configure_flags(&self, arch: Arch) -> Vec<String> {
      self.inner.configure_flags(arch)
    }
  }

  struct Fixture {
    _temp: TempDir,
    layout: Layout,
    state: DirectoryState,
    platform: CountingPlatform,
    resolutions: Rc<Cell<usize>>,
  }

  impl Fixture {
    fn new() -> Self {
      let temp = TempDir::new().unwrap();
      let layout = Layout::new(temp.path().join("llvm"));
      fs::create_dir_all(layout.source_dir()).unwrap();
      let resolutions = Rc::new(Cell::new(0));
      Self {
        state: DirectoryState::new(layout.clone()),
        platform: CountingPlatform {
          inner: Unix::new(UnixHost::Linux),
          resolutions: resolutions.clone(),
        },
        layout,
        resolutions,
        _temp: temp,
      }
    }

    fn pipeline(&self) -> Pipeline<'_> {
      Pipeline::new(&self.layout, &self.state, &self.platform, "cmake")
    }
  }

  fn arg_strings(inv: &Invocation) -> Vec<String> {
    inv.args.iter().map(|a| a.to_string_lossy().into_owned()).collect()
  }

  #[test]
  fn fresh_run_configures_then_installs() {
    let fx = Fixture::new();
    let mut runner = RecordingRunner::cmake_like();
    let mut env = LazyEnvironment::new(Arch::X64);

    let prefix = fx.pipeline().run(Arch::X64, &mut env, &mut runner).unwrap();

    assert_eq!(prefix, fx.layout.install_dir(Arch::X64));
    assert!(prefix.is_dir());
    assert_eq!(runner.calls.len(), 2);

    let configure = &runner.calls[0];
    let args = arg_strings(configure);
    assert_eq!(configure.cwd.as_deref(), Some(fx.layout.build_dir(Arch::X64).as_path()));
    assert_eq!(args[0], fx.layout.source_dir().to_string_lossy());
    assert!(args.contains(&format!("-DCMAKE_INSTALL_PREFIX={}", prefix.display())));
    assert!(args.contains(&"-DCMAKE_BUILD_TYPE=Release".to_string()));
    assert!(args.contains(&"-DLLVM_ENABLE_ASSERTIONS=1".to_string()));
    assert!(args.windows(2).any(|w| w[0] == "-G" && w[1] == "Unix Makefiles"));
    assert!(configure.env.is_some());

    let install = &runner.calls[1];
    assert_eq!(
      arg_strings(install),
      vec!["--build", ".", "--target", "install", "--config", "Release"]
    );
    assert_eq!(install.cwd.as_deref(), Some(fx.layout.build_dir(Arch::X64).as_path()));
  }

  #[test]
  fn environment_is_resolved_once_per_run() {
    let fx = Fixture::new();
    let mut runner = RecordingRunner::cmake_like();
    let mut env = LazyEnvironment::new(Arch::X64);

    fx.pipeline().run(Arch::X64, &mut env, &mut runner).unwrap();

    assert_eq!(fx.resolutions.get(), 1);
    assert!(env.is_resolved());
  }

  #[test]
  fn second_run_is_a_no_op() {
    let fx = Fixture::new();
    let mut runner = RecordingRunner::cmake_like();
    fx.pipeline()
      .run(Arch::X64, &mut LazyEnvironment::new(Arch::X64), &mut runner)
      .unwrap();
    fx.resolutions.set(0);

    let mut again = RecordingRunner::failing(1);
    let mut env = LazyEnvironment::new(Arch::X64);
    fx.pipeline().run(Arch::X64, &mut env, &mut again).unwrap();

    assert!(again.calls.is_empty());
    assert_eq!(fx.resolutions.get(), 0);
    assert!(!env.is_resolved());
  }

  #[test]
  fn failed_configure_removes_build_dir() {
    let fx = Fixture::new();
    let mut runner = RecordingRunner::failing(2);

    let err = fx
      .pipeline()
      .configure(Arch::X64, &mut LazyEnvironment::new(Arch::X64), &mut runner)
      .unwrap_err();

    assert!(matches!(
      err,
      PipelineError::StageFailed {
        stage: Stage::Configure(Arch::X64),
        code: Some(2),
        ..
      }
    ));
    assert!(!fx.layout.build_dir(Arch::X64).exists());
  }

  #[test]
  fn failed_install_removes_partial_install_dir() {
    let fx = Fixture::new();
    let install_dir = fx.layout.install_dir(Arch::X64);
    let partial = install_dir.clone();
    let mut runner = RecordingRunner::new(move |inv| {
      if inv.args.iter().any(|a| a == "install") {
        fs::create_dir_all(partial.join("lib")).unwrap();
        Status { code: Some(1) }
      } else {
        Status::SUCCESS
      }
    });

    let err = fx
      .pipeline()
      .run(Arch::X64, &mut LazyEnvironment::new(Arch::X64), &mut runner)
      .unwrap_err();

    assert!(matches!(
      err,
      PipelineError::StageFailed {
        stage: Stage::Install(Arch::X64),
        ..
      }
    ));
    assert!(!install_dir.exists());
    assert!(fx.layout.build_dir(Arch::X64).exists(), "configure result is kept");
  }

  #[test]
  fn retry_after_failed_install_skips_configure() {
    let fx = Fixture::new();
    fs::create_dir_all(fx.layout.build_dir(Arch::X64)).unwrap();
    let mut runner = RecordingRunner::cmake_like();

    fx.pipeline()
      .run(Arch::X64, &mut LazyEnvironment::new(Arch::X64), &mut runner)
      .unwrap();

    assert_eq!(runner.calls.len(), 1);
    assert!(arg_strings(&runner.calls[0]).contains(&"--build".to_string()));
  }

  #[test]
  fn building_one_arch_leaves_the_other_untouched() {
    let fx = Fixture::new();
    let mut runner = RecordingRunner::cmake_like();

    fx.pipeline()
      .run(Arch::X86, &mut LazyEnvironment::new(Arch::X86), &mut runner)
      .unwrap();

    assert!(fx.layout.install_dir(Arch::X86).exists());
    assert!(!fx.layout.build_dir(Arch::X64).exists());
    assert!(!fx.layout.install_dir(Arch::X64).exists());
    assert!(arg_strings(&runner.calls[0]).contains(&"-DLLVM_BUILD_32_BITS=ON".to_string()));
  }

  #[test]
  fn environment_failure_creates_nothing() {
    struct Broken;
    impl HostPlatform for Broken {
      fn name(&self) -> &'static str {
        "broken"
      }
      fn resolve_environment(&self, _: Arch, _: &mut dyn Runner) -> Result<EnvironmentMap, PlatformError> {
        Err(PlatformError::UnsupportedHost("broken".to_string()))
      }
      fn cmake_generator(&self, _: Arch) -> Result<String, PlatformError> {
        Ok("Ninja".to_string())
      }
      fn target_triple(&self, arch: Arch) -> Result<&'static str, PlatformError> {
        Err(PlatformError::UnsupportedArch { platform: "broken", arch })
      }
    }

    let fx = Fixture::new();
    let pipeline = Pipeline::new(&fx.layout, &fx.state, &Broken, "cmake");
    let mut runner = RecordingRunner::cmake_like();

    let err = pipeline
      .run(Arch::X64, &mut LazyEnvironment::new(Arch::X64), &mut runner)
      .unwrap_err();

    assert!(matches!(err, PipelineError::Platform(_)));
    assert!(runner.calls.is_empty());
    assert!(!fx.layout.build_dir(Arch::X64).exists());
  }

  #[test]
  #[traced_test]
  fn stage_failure_survives_a_failed_cleanup() {
    struct Stuck;
    impl StageState for Stuck {
      fn is_complete(&self, _: Stage) -> bool {
        false
      }
      fn reset(&self, _: Stage) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"))
      }
    }

    let fx = Fixture::new();
    let pipeline = Pipeline::new(&fx.layout, &Stuck, &fx.platform, "cmake");
    let mut runner = RecordingRunner::failing(3);

    let err = pipeline
      .configure(Arch::X64, &mut LazyEnvironment::new(Arch::X64), &mut runner)
      .unwrap_err();

    assert!(matches!(
      err,
      PipelineError::StageFailed {
        stage: Stage::Configure(Arch::X64),
        code: Some(3),
        ..
      }
    ));
    assert!(logs_contain("could not remove the failed stage's output"));
  }
}

//! External process execution.
//!
//! Every process newt-build spawns (cmake, the MSVC environment script, cargo)
//! goes through the [`Runner`] trait so the orchestration logic can be tested
//! without a toolchain installed.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::debug;

use crate::platform::env::EnvironmentMap;

/// A fully described process invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
  pub program: String,
  pub args: Vec<OsString>,
  pub cwd: Option<PathBuf>,
  /// When set, the child's environment is cleared and replaced by this map.
  pub env: Option<EnvironmentMap>,
  /// Variables applied on top of whichever environment the child gets.
  pub extra_env: BTreeMap<String, OsString>,
}

impl Invocation {
  pub fn new(program: impl Into<String>) -> Self {
    Self {
      program: program.into(),
      args: Vec::new(),
      cwd: None,
      env: None,
      extra_env: BTreeMap::new(),
    }
  }

  pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
    self.args.push(arg.into());
    self
  }

  pub fn args<I, S>(mut self, args: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<OsString>,
  {
    self.args.extend(args.into_iter().map(Into::into));
    self
  }

  pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
    self.cwd = Some(dir.as_ref().to_path_buf());
    self
  }

  pub fn environment(mut self, env: EnvironmentMap) -> Self {
    self.env = Some(env);
    self
  }

  pub fn env_var(mut self, key: impl Into<String>, value: impl Into<OsString>) -> Self {
    self.extra_env.insert(key.into(), value.into());
    self
  }

  /// Human readable command line, used in logs and error messages.
  pub fn display(&self) -> String {
    let mut line = self.program.clone();
    for arg in &self.args {
      line.push(' ');
      line.push_str(&arg.to_string_lossy());
    }
    line
  }

  fn to_command(&self) -> Command {
    let mut command = Command::new(&self.program);
    command.args(&self.args);
    if let Some(cwd) = &self.cwd {
      command.current_dir(cwd);
    }
    if let Some(env) = &self.env {
      command.env_clear().envs(env);
    }
    command.envs(&self.extra_env);
    command
  }
}

/// Exit status of a finished process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status {
  /// `None` when the process was terminated by a signal.
  pub code: Option<i32>,
}

impl Status {
  pub const SUCCESS: Status = Status { code: Some(0) };

  pub fn success(&self) -> bool {
    self.code == Some(0)
  }
}

impl From<std::process::ExitStatus> for Status {
  fn from(status: std::process::ExitStatus) -> Self {
    Self { code: status.code() }
  }
}

/// Output of a process run with [`Runner::capture`].
#[derive(Debug, Clone)]
pub struct Captured {
  pub status: Status,
  pub stdout: String,
  pub stderr: String,
}

/// Spawns processes and blocks until they exit.
pub trait Runner {
  /// Run with inherited stdio.
  fn run(&mut self, invocation: &Invocation) -> io::Result<Status>;

  /// Run with stdout and stderr collected.
  fn capture(&mut self, invocation: &Invocation) -> io::Result<Captured>;
}

/// Runs invocations as real child processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl Runner for SystemRunner {
  fn run(&mut self, invocation: &Invocation) -> io::Result<Status> {
    debug!(cmd = %invocation.display(), cwd = ?invocation.cwd, "spawning process");
    let status = invocation.to_command().status()?;
    debug!(code = ?status.code(), "process exited");
    Ok(status.into())
  }

  fn capture(&mut self, invocation: &Invocation) -> io::Result<Captured> {
    debug!(cmd = %invocation.display(), cwd = ?invocation.cwd, "spawning process (captured)");
    let output = invocation
      .to_command()
      .stdin(Stdio::null())
      .output()?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

    if !output.status.success() && !stderr.is_empty() {
      debug!(stderr = %stderr, "command stderr");
    }

    Ok(Captured {
      status: output.status.into(),
      stdout,
      stderr,
    })
  }
}

//! Test utilities for newt-build-lib.
//!
//! Cross-platform shell helpers for tests that spawn real processes, plus a
//! recording [`Runner`] for tests that must not.

use std::io;

use crate::exec::{Captured, Invocation, Runner, Status};

/// Returns the shell command and args to echo an environment variable.
#[cfg(unix)]
pub fn echo_env(var: &str) -> (&'static str, Vec<String>) {
  ("/bin/sh", vec!["-c".to_string(), format!("echo \"${}\"", var)])
}

#[cfg(windows)]
pub fn echo_env(var: &str) -> (&'static str, Vec<String>) {
  ("cmd.exe", vec!["/C".to_string(), format!("echo %{}%", var)])
}

/// Returns the shell command and args to execute a shell script.
#[cfg(unix)]
pub fn shell_cmd(script: &str) -> (&'static str, Vec<String>) {
  ("/bin/sh", vec!["-c".to_string(), script.to_string()])
}

#[cfg(windows)]
pub fn shell_cmd(script: &str) -> (&'static str, Vec<String>) {
  ("cmd.exe", vec!["/C".to_string(), script.to_string()])
}

/// Returns the command and args to create a marker file in the current directory.
#[cfg(unix)]
pub fn touch_file(filename: &str) -> (&'static str, Vec<String>) {
  ("/bin/sh", vec!["-c".to_string(), format!(": > '{}'", filename)])
}

#[cfg(windows)]
pub fn touch_file(filename: &str) -> (&'static str, Vec<String>) {
  (
    "powershell.exe",
    vec![
      "-NoProfile".to_string(),
      "-Command".to_string(),
      format!("New-Item -ItemType File -Path '{}' -Force | Out-Null", filename),
    ],
  )
}

type Handler = Box<dyn FnMut(&Invocation) -> Status>;

/// A [`Runner`] that never spawns anything.
///
/// Every invocation is recorded; the handler decides the exit status and may
/// touch the filesystem to mimic what the real tool would leave behind.
pub struct RecordingRunner {
  pub calls: Vec<Invocation>,
  pub captured_stdout: String,
  handler: Handler,
}

impl RecordingRunner {
  pub fn new(handler: impl FnMut(&Invocation) -> Status + 'static) -> Self {
    Self {
      calls: Vec::new(),
      captured_stdout: String::new(),
      handler: Box::new(handler),
    }
  }

  /// Every invocation succeeds; `cmake --build . --target install` creates the
  /// install prefix passed at configure time, like the real install step.
  pub fn cmake_like() -> Self {
    let mut prefix: Option<std::path::PathBuf> = None;
    Self::new(move |inv| {
      for arg in &inv.args {
        if let Some(p) = arg.to_string_lossy().strip_prefix("-DCMAKE_INSTALL_PREFIX=") {
          prefix = Some(p.into());
        }
      }
      if inv.args.iter().any(|a| a == "install")
        && let Some(prefix) = &prefix
      {
        std::fs::create_dir_all(prefix.join("bin")).unwrap();
      }
      Status::SUCCESS
    })
  }

  /// Every invocation exits with `code`.
  pub fn failing(code: i32) -> Self {
    Self::new(move |_| Status { code: Some(code) })
  }

  pub fn programs(&self) -> Vec<&str> {
    self.calls.iter().map(|c| c.program.as_str()).collect()
  }
}

impl Runner for RecordingRunner {
  fn run(&mut self, invocation: &Invocation) -> io::Result<Status> {
    self.calls.push(invocation.clone());
    Ok((self.handler)(invocation))
  }

  fn capture(&mut self, invocation: &Invocation) -> io::Result<Captured> {
    self.calls.push(invocation.clone());
    let status = (self.handler)(invocation);
    Ok(Captured {
      status,
      stdout: self.captured_stdout.clone(),
      stderr: String::new(),
    })
  }
}

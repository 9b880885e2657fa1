//! Completion records for the bootstrap stages.
//!
//! A stage is complete when its output directory exists. The pipeline and
//! fetcher only talk to [`StageState`], so the record can move to a manifest
//! file without touching them.

use std::fmt;
use std::io;
use std::path::PathBuf;

use tracing::debug;

use crate::layout::Layout;
use crate::platform::arch::Arch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
  /// Sources downloaded and unpacked. Shared by every architecture.
  Fetch,
  /// CMake build tree generated for one architecture.
  Configure(Arch),
  /// LLVM built and installed for one architecture.
  Install(Arch),
}

impl fmt::Display for Stage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Stage::Fetch => write!(f, "fetch"),
      Stage::Configure(arch) => write!(f, "configure ({})", arch),
      Stage::Install(arch) => write!(f, "install ({})", arch),
    }
  }
}

pub trait StageState {
  fn is_complete(&self, stage: Stage) -> bool;

  /// Forget a stage so the next run starts it over from nothing.
  fn reset(&self, stage: Stage) -> io::Result<()>;
}

/// Directory existence as the completion record.
#[derive(Debug, Clone)]
pub struct DirectoryState {
  layout: Layout,
}

impl DirectoryState {
  pub fn new(layout: Layout) -> Self {
    Self { layout }
  }

  /// The directory whose existence marks `stage` as complete.
  pub fn marker(&self, stage: Stage) -> PathBuf {
    match stage {
      Stage::Fetch => self.layout.source_dir(),
      Stage::Configure(arch) => self.layout.build_dir(arch),
      Stage::Install(arch) => self.layout.install_dir(arch),
    }
  }
}

impl StageState for DirectoryState {
  fn is_complete(&self, stage: Stage) -> bool {
    self.marker(stage).is_dir()
  }

  fn reset(&self, stage: Stage) -> io::Result<()> {
    let path = self.marker(stage);
    debug!(stage = %stage, path = %path.display(), "resetting stage");
    match std::fs::remove_dir_all(&path) {
      Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
      other => other,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  #[test]
  fn stage_completes_when_marker_dir_exists() {
    let temp = TempDir::new().unwrap();
    let state = DirectoryState::new(Layout::new(temp.path()));

    assert!(!state.is_complete(Stage::Configure(Arch::X64)));
    std::fs::create_dir_all(temp.path().join("build-x64")).unwrap();
    assert!(state.is_complete(Stage::Configure(Arch::X64)));
    assert!(!state.is_complete(Stage::Configure(Arch::X86)));
  }

  #[test]
  fn reset_removes_populated_directory() {
    let temp = TempDir::new().unwrap();
    let state = DirectoryState::new(Layout::new(temp.path()));
    let install = temp.path().join("x86");
    std::fs::create_dir_all(install.join("lib")).unwrap();
    std::fs::write(install.join("lib").join("partial.a"), b"").unwrap();

    state.reset(Stage::Install(Arch::X86)).unwrap();

    assert!(!install.exists());
    assert!(!state.is_complete(Stage::Install(Arch::X86)));
  }

  #[test]
  fn reset_of_missing_stage_is_ok() {
    let temp = TempDir::new().unwrap();
    let state = DirectoryState::new(Layout::new(temp.path()));
    state.reset(Stage::Fetch).unwrap();
  }

  #[test]
  fn a_file_is_not_a_completion_record() {
    let temp = TempDir::new().unwrap();
    let state = DirectoryState::new(Layout::new(temp.path()));
    std::fs::write(temp.path().join("source"), b"").unwrap();
    assert!(!state.is_complete(Stage::Fetch));
  }
}

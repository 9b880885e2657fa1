//! Directory layout under the bootstrap root.
//!
//! ```text
//! <root>/
//! ├── source/        # unpacked LLVM sources, shared by every architecture
//! ├── build-<arch>/  # CMake build tree for one architecture
//! ├── <arch>/        # install prefix for one architecture
//! └── .lock          # held while a run is in progress
//! ```
//!
//! Pure path computation: nothing here touches the filesystem.

use std::path::{Path, PathBuf};

use crate::platform::arch::Arch;

const SOURCE_DIR: &str = "source";
const BUILD_DIR_PREFIX: &str = "build-";
const LOCK_FILENAME: &str = ".lock";
const STAGING_PREFIX: &str = ".source-staging-";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
  root: PathBuf,
}

impl Layout {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  pub fn source_dir(&self) -> PathBuf {
    self.root.join(SOURCE_DIR)
  }

  pub fn build_dir(&self, arch: Arch) -> PathBuf {
    self.root.join(format!("{}{}", BUILD_DIR_PREFIX, arch))
  }

  pub fn install_dir(&self, arch: Arch) -> PathBuf {
    self.root.join(arch.as_str())
  }

  pub fn lock_path(&self) -> PathBuf {
    self.root.join(LOCK_FILENAME)
  }

  /// Name prefix for the temporary directory sources are unpacked into
  /// before being moved to `source/`.
  pub fn staging_prefix(&self) -> &'static str {
    STAGING_PREFIX
  }
}

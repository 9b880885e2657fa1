//! Exclusive hold on a bootstrap root.
//!
//! `source/` is shared by every architecture, so two runs against one root
//! would race on fetching it. A run takes `<root>/.lock` before fetching and
//! writes who it is into the file, so a refused run can name what it is
//! waiting on.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::layout::Layout;
use crate::platform::arch::Arch;

/// The run holding a root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holder {
  pub pid: u32,
  /// newt-build subcommand, e.g. `build` or `setup`.
  pub command: String,
  pub arch: Arch,
  pub started_at_unix: u64,
}

impl Holder {
  fn this_run(command: &str, arch: Arch) -> Self {
    Self {
      pid: std::process::id(),
      command: command.to_string(),
      arch,
      started_at_unix: unix_now(),
    }
  }

  fn describe(&self) -> String {
    format!(
      "`{}` for {} (PID {}) has held it for {}s",
      self.command,
      self.arch,
      self.pid,
      unix_now().saturating_sub(self.started_at_unix)
    )
  }
}

#[derive(Debug, Error)]
pub enum LockError {
  #[error(
    "{} is busy: {}\nIf no other newt-build run is active, remove {}",
    .root.display(),
    .holder.as_ref().map(Holder::describe).unwrap_or_else(|| "another run holds it".to_string()),
    .lock_path.display()
  )]
  Busy {
    root: PathBuf,
    lock_path: PathBuf,
    /// `None` when the holder's record could not be read.
    holder: Option<Holder>,
  },

  #[error("failed to {action} {}: {source}", .path.display())]
  Io {
    action: &'static str,
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

fn io_error<'a>(action: &'static str, path: &'a Path) -> impl FnOnce(io::Error) -> LockError + 'a {
  move |source| LockError::Io {
    action,
    path: path.to_path_buf(),
    source,
  }
}

/// Released on drop.
#[derive(Debug)]
pub struct RootLock {
  file: File,
  path: PathBuf,
}

impl RootLock {
  pub fn acquire(layout: &Layout, command: &str, arch: Arch) -> Result<Self, LockError> {
    let root = layout.root();
    let path = layout.lock_path();

    fs::create_dir_all(root).map_err(io_error("create", root))?;
    let file = OpenOptions::new()
      .read(true)
      .write(true)
      .create(true)
      .truncate(false)
      .open(&path)
      .map_err(io_error("open", &path))?;

    match try_lock_exclusive(&file) {
      Ok(()) => {}
      Err(err) if is_contention(&err) => {
        return Err(LockError::Busy {
          root: root.to_path_buf(),
          holder: read_holder(&path),
          lock_path: path,
        });
      }
      Err(err) => return Err(io_error("lock", &path)(err)),
    }

    let mut lock = RootLock { file, path };
    lock
      .record(&Holder::this_run(command, arch))
      .map_err(io_error("write", &lock.path))?;
    debug!(path = %lock.path.display(), command, arch = %arch, "root locked");

    Ok(lock)
  }

  /// The record written by this run, read back through the held handle.
  /// Opening the file again would fail on Windows while it is locked.
  pub fn holder(&self) -> io::Result<Holder> {
    let mut file = &self.file;
    file.seek(SeekFrom::Start(0))?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;
    serde_json::from_str(&contents).map_err(io::Error::other)
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  fn record(&mut self, holder: &Holder) -> io::Result<()> {
    let json = serde_json::to_vec(holder).map_err(io::Error::other)?;
    self.file.set_len(0)?;
    self.file.seek(SeekFrom::Start(0))?;
    self.file.write_all(&json)?;
    self.file.flush()
  }
}

fn read_holder(path: &Path) -> Option<Holder> {
  let contents = fs::read_to_string(path).ok()?;
  serde_json::from_str(&contents).ok()
}

fn unix_now() -> u64 {
  SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .unwrap_or_default()
    .as_secs()
}

#[cfg(unix)]
fn is_contention(err: &io::Error) -> bool {
  err.kind() == io::ErrorKind::WouldBlock
}

#[cfg(windows)]
fn is_contention(err: &io::Error) -> bool {
  use windows_sys::Win32::Foundation::ERROR_LOCK_VIOLATION;
  err.kind() == io::ErrorKind::WouldBlock || err.raw_os_error() == Some(ERROR_LOCK_VIOLATION as i32)
}

#[cfg(unix)]
fn try_lock_exclusive(file: &File) -> io::Result<()> {
  use rustix::fs::{FlockOperation, flock};

  flock(file, FlockOperation::NonBlockingLockExclusive).map_err(io::Error::from)
}

#[cfg(windows)]
fn try_lock_exclusive(file: &File) -> io::Result<()> {
  use std::os::windows::io::AsRawHandle;
  use windows_sys::Win32::Storage::FileSystem::{LOCKFILE_EXCLUSIVE_LOCK, LOCKFILE_FAIL_IMMEDIATELY, LockFileEx};

  // SAFETY: the handle is owned by `file` and outlives the call; a zeroed
  // OVERLAPPED selects offset 0.
  let locked = unsafe {
    let mut overlapped = std::mem::zeroed();
    LockFileEx(
      file.as_raw_handle(),
      LOCKFILE_FAIL_IMMEDIATELY | LOCKFILE_EXCLUSIVE_LOCK,
      0,
      1,
      0,
      &mut overlapped,
    )
  };

  if locked == 0 { Err(io::Error::last_os_error()) } else { Ok(()) }
}

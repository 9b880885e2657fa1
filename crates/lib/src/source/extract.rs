//! Tarball extraction with path confinement.
//!
//! Only entries under the archive's expected top-level directory are
//! unpacked, re-rooted at the destination. Every entry is checked before
//! anything is written: a path (or link target) that would resolve outside
//! the archive root aborts the whole extraction. Nothing is ever written
//! through a symlink unpacked earlier, since a chain of individually
//! in-tree links can still lead outside once they exist on disk.

use std::fs;
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use tar::{Archive, EntryType};
use tracing::debug;
use xz2::read::XzDecoder;

use super::FetchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
  TarXz,
  TarGz,
  Tar,
}

impl ArchiveFormat {
  /// Pick the format from the file extension of the URL path.
  pub fn from_url(url: &str) -> Result<Self, FetchError> {
    let path = url.split(['?', '#']).next().unwrap_or(url);

    if path.ends_with(".tar.xz") || path.ends_with(".txz") {
      Ok(Self::TarXz)
    } else if path.ends_with(".tar.gz") || path.ends_with(".tgz") {
      Ok(Self::TarGz)
    } else if path.ends_with(".tar") {
      Ok(Self::Tar)
    } else {
      Err(FetchError::UnsupportedArchive(url.to_string()))
    }
  }

  fn decoder<'a>(&self, bytes: &'a [u8]) -> Box<dyn Read + 'a> {
    match self {
      Self::TarXz => Box::new(XzDecoder::new(bytes)),
      Self::TarGz => Box::new(GzDecoder::new(bytes)),
      Self::Tar => Box::new(bytes),
    }
  }
}

/// Unpack every entry under `root_dir/` in the archive into `dest`.
///
/// Returns the number of entries written.
pub fn extract(bytes: &[u8], format: ArchiveFormat, root_dir: &str, dest: &Path) -> Result<usize, FetchError> {
  let mut archive = Archive::new(format.decoder(bytes));
  let mut written = 0;

  for entry in archive.entries()? {
    let mut entry = entry?;
    let raw = entry.path()?.into_owned();

    let normalized = normalize(&raw).ok_or_else(|| FetchError::PathTraversal { entry: raw.clone() })?;

    // Entries outside the expected top-level directory are not ours.
    let Ok(relative) = normalized.strip_prefix(root_dir) else {
      debug!(entry = %raw.display(), "skipping entry outside archive root");
      continue;
    };
    if relative.as_os_str().is_empty() {
      continue;
    }

    let dest_path = dest.join(relative);
    if !dest_path.starts_with(dest) || passes_through_symlink(dest, relative)? {
      return Err(FetchError::PathTraversal { entry: raw });
    }

    // Links are validated before anything for this entry touches the disk.
    let hardlink_source = match entry.header().entry_type() {
      EntryType::Symlink => {
        let target = link_target(&entry, &raw)?;
        check_symlink(&normalized, &target, root_dir, &raw)?;
        None
      }
      EntryType::Link => {
        let target = link_target(&entry, &raw)?;
        Some(resolve_hardlink(&target, root_dir, dest, &raw)?)
      }
      _ => None,
    };

    if let Some(parent) = dest_path.parent() {
      fs::create_dir_all(parent)?;
    }

    match hardlink_source {
      Some(source) => {
        if fs::hard_link(&source, &dest_path).is_err() {
          fs::copy(&source, &dest_path)?;
        }
      }
      None => {
        entry.unpack(&dest_path)?;
      }
    }

    written += 1;
  }

  Ok(written)
}

/// Lexically resolve `.` and `..` in an archive path.
///
/// Returns `None` for absolute paths and for paths that climb above their
/// starting point.
fn normalize(path: &Path) -> Option<PathBuf> {
  let mut out = PathBuf::new();
  for component in path.components() {
    match component {
      Component::Normal(part) => out.push(part),
      Component::CurDir => {}
      Component::ParentDir => {
        if !out.pop() {
          return None;
        }
      }
      Component::RootDir | Component::Prefix(_) => return None,
    }
  }
  Some(out)
}

fn link_target<R: Read>(entry: &tar::Entry<'_, R>, raw: &Path) -> Result<PathBuf, FetchError> {
  entry
    .link_name()?
    .map(|t| t.into_owned())
    .ok_or_else(|| FetchError::PathTraversal { entry: raw.to_path_buf() })
}

/// Symlink targets are relative to the directory holding the link.
fn check_symlink(link: &Path, target: &Path, root_dir: &str, raw: &Path) -> Result<(), FetchError> {
  let base = link.parent().unwrap_or(Path::new(""));
  match normalize(&base.join(target)) {
    Some(resolved) if resolved.starts_with(root_dir) => Ok(()),
    _ => Err(FetchError::LinkTraversal {
      entry: raw.to_path_buf(),
      target: target.to_path_buf(),
    }),
  }
}

/// Hard link targets name another archive entry, relative to the archive root.
///
/// The source must be reachable without following any symlink, or the
/// copy fallback would read whatever the link points at.
fn resolve_hardlink(target: &Path, root_dir: &str, dest: &Path, raw: &Path) -> Result<PathBuf, FetchError> {
  let escape = || FetchError::LinkTraversal {
    entry: raw.to_path_buf(),
    target: target.to_path_buf(),
  };
  let resolved = normalize(target).ok_or_else(escape)?;
  let relative = resolved.strip_prefix(root_dir).map_err(|_| escape())?;
  if passes_through_symlink(dest, relative)? {
    return Err(escape());
  }
  Ok(dest.join(relative))
}

/// Whether any already-existing component of `dest/relative` is a symlink.
///
/// The walk stops at the first component that does not exist yet.
fn passes_through_symlink(dest: &Path, relative: &Path) -> Result<bool, FetchError> {
  let mut current = dest.to_path_buf();
  for component in relative.components() {
    current.push(component);
    match fs::symlink_metadata(&current) {
      Ok(meta) if meta.file_type().is_symlink() => return Ok(true),
      Ok(_) => {}
      Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
      Err(err) => return Err(err.into()),
    }
  }
  Ok(false)
}

//! Source acquisition: download the LLVM tarball and unpack it into `source/`.
//!
//! The fetch stage is all-or-nothing. Sources are unpacked into a staging
//! directory next to `source/` and only renamed into place once every entry
//! has been written, so an interrupted or failed fetch looks exactly like one
//! that never started.

mod download;
mod extract;

use std::fs;
use std::io;
use std::path::PathBuf;

use thiserror::Error;
use tracing::info;

use crate::layout::Layout;
use crate::state::{Stage, StageState};
use crate::util::hash::{digest_matches, sha256_hex};

pub use download::download;
pub use extract::{ArchiveFormat, extract};

#[cfg(test)]
pub(crate) use extract::tests::gz_archive;

#[derive(Debug, Error)]
pub enum FetchError {
  /// The URL does not name an archive format we can unpack.
  #[error("unsupported archive format: {0}")]
  UnsupportedArchive(String),

  /// HTTP request failed or returned a non-success status.
  #[error("fetch failed for {url}: {message}")]
  Http { url: String, message: String },

  /// SHA256 hash mismatch after download.
  #[error("hash mismatch for {url}: expected {expected}, got {actual}")]
  HashMismatch {
    url: String,
    expected: String,
    actual: String,
  },

  /// An archive entry would be written outside the extraction root.
  #[error("archive entry escapes the extraction root: {}", .entry.display())]
  PathTraversal { entry: PathBuf },

  /// A link entry points outside the extraction root.
  #[error("archive link {} points outside the extraction root: {}", .entry.display(), .target.display())]
  LinkTraversal { entry: PathBuf, target: PathBuf },

  /// The archive had no entries under the expected top-level directory.
  #[error("archive has no entries under '{0}'")]
  MissingRoot(String),

  #[error("io error: {0}")]
  Io(#[from] io::Error),
}

/// Where to get the sources and what the tarball looks like.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveSource {
  pub url: String,
  /// Top-level directory every wanted entry lives under, e.g. `llvm-6.0.1.src`.
  pub root_dir: String,
  /// Expected lowercase hex SHA256 of the downloaded archive.
  pub sha256: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
  AlreadyFetched,
  Fetched { entries: usize },
}

/// Make sure `source/` holds the unpacked sources, downloading them if needed.
pub fn fetch_source(source: &ArchiveSource, layout: &Layout, state: &dyn StageState) -> Result<FetchOutcome, FetchError> {
  if state.is_complete(Stage::Fetch) {
    info!(path = %layout.source_dir().display(), "sources already fetched");
    return Ok(FetchOutcome::AlreadyFetched);
  }

  let format = ArchiveFormat::from_url(&source.url)?;
  fs::create_dir_all(layout.root())?;

  let bytes = download(&source.url)?;

  if let Some(expected) = &source.sha256 {
    let actual = sha256_hex(&bytes);
    if !digest_matches(&actual, expected) {
      return Err(FetchError::HashMismatch {
        url: source.url.clone(),
        expected: expected.clone(),
        actual,
      });
    }
  }

  let staging = tempfile::Builder::new()
    .prefix(layout.staging_prefix())
    .tempdir_in(layout.root())?;

  info!(root = %source.root_dir, "extracting sources");
  let entries = extract(&bytes, format, &source.root_dir, staging.path())?;
  if entries == 0 {
    return Err(FetchError::MissingRoot(source.root_dir.clone()));
  }

  fs::rename(staging.path(), layout.source_dir())?;
  info!(path = %layout.source_dir().display(), entries, "sources ready");

  Ok(FetchOutcome::Fetched { entries })
}

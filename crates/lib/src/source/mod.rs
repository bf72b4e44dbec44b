//! Source resolution.
//!
//! Turns declared [`SourceSpec`]s into [`VerifiedSource`]s on local disk:
//!
//! - [`fetch`] - URL downloads with SHA-256 verification
//! - [`git`] - Bare mirrors for repository sources
//! - [`types`] - Declaration and resolution types
//!
//! Resolution populates the run's shared downloads directory. Running it again
//! over the same specs reuses what is already there.

pub mod fetch;
pub mod git;
mod types;

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use thiserror::Error;
use tracing::{debug, info};

pub use types::{SourceSpec, VerifiedSource};

use crate::package::{PackageError, package_directory};

/// Errors that can occur while resolving sources.
#[derive(Debug, Error)]
pub enum SourceError {
  /// The declared source has an unusable shape.
  #[error("invalid source '{source_name}': {reason}")]
  InvalidSourceSpec { source_name: String, reason: String },

  /// Declared and computed digests disagree.
  #[error("hash mismatch for {source_name}: expected {expected}, got {actual}")]
  HashMismatch {
    source_name: String,
    expected: String,
    actual: String,
  },

  /// Transport-level failure.
  #[error("download failed for {url}: {message}")]
  DownloadFailure { url: String, message: String },

  #[error(transparent)]
  Git(#[from] git::GitError),

  #[error(transparent)]
  Package(#[from] PackageError),

  #[error("io error at {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("source task failed: {0}")]
  Task(String),
}

/// Resolve every spec into a verified local source, preserving input order.
///
/// Build scripts address sources positionally, so the output order always
/// matches `specs`.
pub async fn resolve_sources(specs: &[SourceSpec], downloads_dir: &Path) -> Result<Vec<VerifiedSource>, SourceError> {
  info!(count = specs.len(), "resolving sources");

  let mut resolved = Vec::with_capacity(specs.len());
  for spec in specs {
    debug!(source = %spec.display_name(), "resolving source");
    resolved.push(resolve_source(spec, downloads_dir).await?);
  }
  Ok(resolved)
}

/// Resolve a single spec.
pub async fn resolve_source(spec: &SourceSpec, downloads_dir: &Path) -> Result<VerifiedSource, SourceError> {
  match spec {
    SourceSpec::LocalDirectory { path } => resolve_local_directory(path, downloads_dir).await,
    SourceSpec::RemoteArchive { url, hash } => {
      let (local_path, content_hash) = fetch::fetch_url(url, hash, downloads_dir).await?;
      Ok(VerifiedSource {
        local_path,
        content_hash: Some(content_hash),
      })
    }
    SourceSpec::GitRepository { url } => {
      let url = url.clone();
      let cache_dir = downloads_dir.to_path_buf();
      let local_path = tokio::task::spawn_blocking(move || git::mirror_repository(&url, &cache_dir))
        .await
        .map_err(|e| SourceError::Task(e.to_string()))??;
      Ok(VerifiedSource {
        local_path,
        content_hash: None,
      })
    }
  }
}

/// Package a local directory into `<downloads>/<sha256>/<dirname>.tar.gz`.
///
/// The archive is first written to a scratch directory, which is removed on
/// every exit path, then moved under its digest in the downloads directory.
async fn resolve_local_directory(path: &Path, downloads_dir: &Path) -> Result<VerifiedSource, SourceError> {
  if !path.is_dir() {
    return Err(SourceError::InvalidSourceSpec {
      source_name: path.display().to_string(),
      reason: "not a directory".to_string(),
    });
  }

  let io_err = |path: &Path, source: std::io::Error| SourceError::Io {
    path: path.to_path_buf(),
    source,
  };

  std::fs::create_dir_all(downloads_dir).map_err(|e| io_err(downloads_dir, e))?;
  let scratch = TempDir::new_in(downloads_dir).map_err(|e| io_err(downloads_dir, e))?;

  let dir_name = path
    .canonicalize()
    .ok()
    .and_then(|p| p.file_name().map(|n| n.to_string_lossy().to_string()))
    .unwrap_or_else(|| "source".to_string());
  let archive_name = format!("{}.tar.gz", dir_name);
  let scratch_archive = scratch.path().join(&archive_name);

  let src = path.to_path_buf();
  let dest = scratch_archive.clone();
  let content_hash = tokio::task::spawn_blocking(move || package_directory(&src, &dest))
    .await
    .map_err(|e| SourceError::Task(e.to_string()))??;

  let dest_dir = fetch::content_dir(downloads_dir, &content_hash.0);
  std::fs::create_dir_all(&dest_dir).map_err(|e| io_err(&dest_dir, e))?;
  let local_path = dest_dir.join(&archive_name);
  std::fs::rename(&scratch_archive, &local_path).map_err(|e| io_err(&local_path, e))?;

  info!(path = %path.display(), archive = %local_path.display(), hash = %content_hash, "packaged local source");
  Ok(VerifiedSource {
    local_path,
    content_hash: Some(content_hash),
  })
}

//! Pipeline-level errors.

use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;
use crate::dependency::DependencyError;
use crate::package::PackageError;
use crate::platform::Platform;
use crate::recipe::RecipeError;
use crate::release::ReleaseError;
use crate::sandbox::SandboxError;
use crate::source::SourceError;

/// Errors that end an autobuild run.
///
/// Only [`AutobuildError::UnknownPlatformAsset`] is recoverable: it is logged
/// and the asset skipped, and never returned from the pipeline itself.
#[derive(Debug, Error)]
pub enum AutobuildError {
  #[error("invalid source '{source_name}': {reason}")]
  InvalidSourceSpec { source_name: String, reason: String },

  #[error("hash mismatch for {source_name}: expected {expected}, got {actual}")]
  HashMismatch {
    source_name: String,
    expected: String,
    actual: String,
  },

  #[error("download failed for {url}: {message}")]
  DownloadFailure { url: String, message: String },

  #[error("build failed for {platform}")]
  BuildFailure { platform: Platform },

  #[error("failed to remove dependency '{dependency}' from the {platform} prefix: {reason}")]
  DependencyCleanupFailure {
    dependency: String,
    platform: Platform,
    reason: String,
  },

  #[error("asset '{name}' does not name a known platform")]
  UnknownPlatformAsset { name: String },

  #[error("reconstructing a manifest needs both a repository and a tag; {missing} is not set")]
  MissingReconstructionConfig { missing: String },

  #[error("sandbox error for {platform}: {source}")]
  Sandbox {
    platform: Platform,
    #[source]
    source: SandboxError,
  },

  #[error(transparent)]
  Source(SourceError),

  #[error(transparent)]
  Package(#[from] PackageError),

  #[error(transparent)]
  Recipe(#[from] RecipeError),

  #[error(transparent)]
  Dependency(#[from] DependencyError),

  #[error(transparent)]
  Release(ReleaseError),

  #[error("io error at {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

impl From<SourceError> for AutobuildError {
  fn from(e: SourceError) -> Self {
    match e {
      SourceError::InvalidSourceSpec { source_name, reason } => Self::InvalidSourceSpec { source_name, reason },
      SourceError::HashMismatch {
        source_name,
        expected,
        actual,
      } => Self::HashMismatch {
        source_name,
        expected,
        actual,
      },
      SourceError::DownloadFailure { url, message } => Self::DownloadFailure { url, message },
      other => Self::Source(other),
    }
  }
}

impl From<ReleaseError> for AutobuildError {
  fn from(e: ReleaseError) -> Self {
    match e {
      ReleaseError::DownloadFailure { url, message } => Self::DownloadFailure { url, message },
      ReleaseError::UnknownPlatformAsset { name } => Self::UnknownPlatformAsset { name },
      other => Self::Release(other),
    }
  }
}

impl From<ConfigError> for AutobuildError {
  fn from(e: ConfigError) -> Self {
    match e {
      ConfigError::MissingReconstructionConfig(missing) => Self::MissingReconstructionConfig { missing },
    }
  }
}

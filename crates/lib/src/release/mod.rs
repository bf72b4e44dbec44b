//! Rebuilding a product hash map from a published release.
//!
//! Instead of building, every platform tarball attached to a release is
//! downloaded into scratch space and hashed. Manifest scripts published next
//! to the tarballs are skipped, as is anything whose name does not end in a
//! known platform triplet.

mod github;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tempfile::TempDir;
use thiserror::Error;
use tracing::{debug, info, warn};

pub use github::GithubReleases;

use crate::config::ReleaseTarget;
use crate::consts::MANIFEST_SCRIPT_ASSETS;
use crate::manifest::{ProductEntry, ProductHashMap};
use crate::platform::platform_from_artifact;
use crate::source::fetch::url_to_filename;
use crate::util::hash::hash_file;

#[derive(Debug, Error)]
pub enum ReleaseError {
  #[error("release API request to {url} failed: {message}")]
  Api { url: String, message: String },

  #[error("download failed for {url}: {message}")]
  DownloadFailure { url: String, message: String },

  #[error("asset '{name}' does not name a known platform")]
  UnknownPlatformAsset { name: String },

  #[error("failed to create HTTP client: {0}")]
  Client(String),

  #[error("io error at {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

/// A file attached to a release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseAsset {
  pub name: String,
  pub url: String,
}

/// Access to a hosting service's releases.
#[async_trait]
pub trait ReleaseClient: Send + Sync {
  /// Every asset attached to `tag` in `repository`.
  async fn list_assets(&self, repository: &str, tag: &str) -> Result<Vec<ReleaseAsset>, ReleaseError>;

  /// Download `url` to `dest`.
  async fn download(&self, url: &str, dest: &Path) -> Result<(), ReleaseError>;
}

/// Download and hash every platform tarball of `target`.
///
/// When two assets map to the same platform the later one wins.
pub async fn reconstruct<C>(client: &C, target: &ReleaseTarget) -> Result<ProductHashMap, ReleaseError>
where
  C: ReleaseClient + ?Sized,
{
  info!(repository = %target.repository, tag = %target.tag, "reconstructing product hashes");
  let assets = client.list_assets(&target.repository, &target.tag).await?;

  let scratch = TempDir::new().map_err(|source| ReleaseError::Io {
    path: std::env::temp_dir(),
    source,
  })?;

  let mut hashes = ProductHashMap::new();
  for asset in assets {
    if MANIFEST_SCRIPT_ASSETS.contains(&asset.name.as_str()) {
      debug!(asset = %asset.name, "skipping manifest script");
      continue;
    }

    let Some(platform) = platform_from_artifact(&asset.name) else {
      let skipped = ReleaseError::UnknownPlatformAsset { name: asset.name };
      warn!("{}, skipping", skipped);
      continue;
    };

    let dest = scratch.path().join(url_to_filename(&asset.name));
    client.download(&asset.url, &dest).await?;
    let hash = hash_file(&dest).map_err(|source| ReleaseError::Io {
      path: dest.clone(),
      source,
    })?;
    debug!(asset = %asset.name, platform = %platform, hash = %hash, "hashed asset");

    let entry = ProductEntry {
      filename: asset.name,
      hash,
    };
    if let Some(previous) = hashes.insert(platform, entry) {
      warn!(
        platform = %platform,
        replaced = %previous.filename,
        "several assets map to the same platform, keeping the last"
      );
    }
  }

  info!(platforms = hashes.len(), "reconstructed product hashes");
  Ok(hashes)
}

//! Upstream dependency staging and removal.
//!
//! A dependency is described by another package's manifest script (see
//! [`lua`]). At workspace setup the script is evaluated in
//! [`InstallMode::Install`] and its artifact is unpacked into the prefix
//! ([`install::install_dependency`]). After the build the same script is
//! re-evaluated in [`InstallMode::Shadow`] to recover which artifact was
//! installed, and the files it brought in are removed again
//! ([`install::cleanup_dependency`]) so only the package's own outputs are
//! packaged.

pub mod install;
pub mod lua;

use std::path::{Path, PathBuf};

use thiserror::Error;

pub use install::{cleanup_dependency, install_dependency, manifest_path, uninstall_manifest};
pub use lua::{DownloadInfo, InstallMode};

use crate::platform::Platform;
use crate::source::SourceError;
use crate::source::fetch::{download_bytes, local_file};

/// Errors that can occur while staging or removing a dependency.
#[derive(Debug, Error)]
pub enum DependencyError {
  #[error("failed to load dependency descriptor '{location}': {message}")]
  Load { location: String, message: String },

  #[error("failed to evaluate dependency '{dependency}': {message}")]
  Evaluate { dependency: String, message: String },

  #[error("dependency '{dependency}' has no download info for {platform}")]
  MissingPlatform { dependency: String, platform: String },

  #[error("dependency '{dependency}' has no install manifest at {path}")]
  MissingManifest { dependency: String, path: PathBuf },

  #[error("failed to install dependency '{dependency}': {message}")]
  Install { dependency: String, message: String },

  #[error("manifest {manifest} lists a path outside the prefix: {entry}")]
  UnsafeEntry { manifest: PathBuf, entry: String },

  #[error("io error at {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

/// Capability to look up where a dependency's artifact for a platform lives.
pub trait DownloadInfoSource {
  /// The `(url, hash)` of the artifact for `platform`, as seen from `prefix`.
  fn resolve_download_info(&self, platform: &Platform, prefix: &Path) -> Result<DownloadInfo, DependencyError>;
}

/// An upstream package's manifest script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyDescriptor {
  pub name: String,
  pub script: String,
}

impl DependencyDescriptor {
  pub fn new(name: impl Into<String>, script: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      script: script.into(),
    }
  }

  /// Load a descriptor from an `http(s)://` URL or a local path.
  ///
  /// Relative paths are resolved against `base_dir`. The descriptor is named
  /// after the last component of its location.
  pub async fn load(location: &str, base_dir: &Path) -> Result<Self, DependencyError> {
    let load_err = |message: String| DependencyError::Load {
      location: location.to_string(),
      message,
    };

    let script = if location.starts_with("http://") || location.starts_with("https://") {
      let bytes = download_bytes(location).await.map_err(|e| match e {
        SourceError::DownloadFailure { message, .. } => load_err(message),
        other => load_err(other.to_string()),
      })?;
      String::from_utf8(bytes).map_err(|e| load_err(e.to_string()))?
    } else {
      let path = local_file(location).unwrap_or_else(|| crate::platform::paths::expand_path(location, base_dir));
      tokio::fs::read_to_string(&path)
        .await
        .map_err(|e| load_err(format!("{}: {}", path.display(), e)))?
    };

    Ok(Self::new(descriptor_name(location), script))
  }

  fn evaluate(&self, platform: &Platform, prefix: &Path, mode: InstallMode) -> Result<lua::Evaluation, DependencyError> {
    lua::evaluate(&self.name, &self.script, platform, prefix, mode).map_err(|e| DependencyError::Evaluate {
      dependency: self.name.clone(),
      message: e.to_string(),
    })
  }
}

impl DownloadInfoSource for DependencyDescriptor {
  fn resolve_download_info(&self, platform: &Platform, prefix: &Path) -> Result<DownloadInfo, DependencyError> {
    let mut eval = self.evaluate(platform, prefix, InstallMode::Shadow)?;
    eval
      .download_info
      .remove(&platform.triplet())
      .ok_or_else(|| DependencyError::MissingPlatform {
        dependency: self.name.clone(),
        platform: platform.triplet(),
      })
  }
}

fn descriptor_name(location: &str) -> String {
  let trimmed = location.trim_end_matches('/');
  trimmed
    .rsplit(['/', '\\'])
    .next()
    .filter(|s| !s.is_empty())
    .unwrap_or(trimmed)
    .to_string()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::platform::arch::Arch;
  use crate::platform::os::Libc;
  use tempfile::TempDir;

  const DESCRIPTOR: &str = r#"
download_info = {
  ["x86_64-linux-gnu"] = { "https://example.com/zlib.x86_64-linux-gnu.tar.gz", "aaaa" },
}
"#;

  #[test]
  fn resolve_download_info_for_known_platform() {
    let desc = DependencyDescriptor::new("zlib", DESCRIPTOR);
    let platform = Platform::linux(Arch::X86_64, Libc::Glibc);
    let info = desc.resolve_download_info(&platform, Path::new("/p")).unwrap();
    assert_eq!(info.url, "https://example.com/zlib.x86_64-linux-gnu.tar.gz");
    assert_eq!(info.hash, "aaaa");
  }

  #[test]
  fn resolve_download_info_for_unknown_platform() {
    let desc = DependencyDescriptor::new("zlib", DESCRIPTOR);
    let platform = Platform::linux(Arch::Aarch64, Libc::Musl);
    let result = desc.resolve_download_info(&platform, Path::new("/p"));
    assert!(matches!(result, Err(DependencyError::MissingPlatform { .. })));
  }

  #[test]
  fn evaluation_error_names_dependency() {
    let desc = DependencyDescriptor::new("broken", "this is not lua");
    let platform = Platform::linux(Arch::X86_64, Libc::Glibc);
    let err = desc.resolve_download_info(&platform, Path::new("/p")).unwrap_err();
    assert!(matches!(err, DependencyError::Evaluate { ref dependency, .. } if dependency == "broken"));
  }

  #[tokio::test]
  async fn load_from_relative_path() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("zlib.lua"), DESCRIPTOR).unwrap();

    let desc = DependencyDescriptor::load("zlib.lua", temp.path()).await.unwrap();
    assert_eq!(desc.name, "zlib.lua");
    assert_eq!(desc.script, DESCRIPTOR);
  }

  #[tokio::test]
  async fn load_missing_file_is_load_error() {
    let temp = TempDir::new().unwrap();
    let result = DependencyDescriptor::load("nope.lua", temp.path()).await;
    assert!(matches!(result, Err(DependencyError::Load { .. })));
  }

  #[tokio::test]
  async fn load_from_url() {
    let mut server = mockito::Server::new_async().await;
    server
      .mock("GET", "/zlib/build.lua")
      .with_status(200)
      .with_body(DESCRIPTOR)
      .create_async()
      .await;

    let url = format!("{}/zlib/build.lua", server.url());
    let desc = DependencyDescriptor::load(&url, Path::new("/")).await.unwrap();
    assert_eq!(desc.name, "build.lua");
    assert_eq!(desc.script, DESCRIPTOR);
  }

  #[test]
  fn descriptor_name_from_location() {
    assert_eq!(descriptor_name("https://example.com/deps/zlib.lua"), "zlib.lua");
    assert_eq!(descriptor_name("deps/zlib.lua"), "zlib.lua");
    assert_eq!(descriptor_name("zlib.lua"), "zlib.lua");
  }
}

//! Source declaration and resolution types.
//!
//! - [`SourceSpec`] - A declared source, before anything is fetched
//! - [`VerifiedSource`] - A source materialized on disk with its digest checked

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::util::hash::ContentHash;

/// A declared build source.
///
/// Exactly one of three shapes. In a recipe's `sources` list:
///
/// ```lua
/// sources = {
///   -- Remote (or local) archive with its SHA-256
///   { url = "https://example.com/libfoo-1.0.tar.gz", sha256 = "e3b0c442..." },
///   -- Git repository, mirrored and fetched
///   "https://github.com/org/libfoo.git",
///   -- Local directory, packaged into an archive
///   "./patches",
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceSpec {
  LocalDirectory { path: PathBuf },
  RemoteArchive { url: String, hash: String },
  GitRepository { url: String },
}

impl SourceSpec {
  /// Classify a declared location (and optional hash) into a source shape.
  ///
  /// A `.git` suffix selects [`SourceSpec::GitRepository`], a hash selects
  /// [`SourceSpec::RemoteArchive`], anything else is a local directory.
  /// Local locations without a URL scheme are taken relative to `base_dir`.
  pub fn classify(location: &str, hash: Option<&str>, base_dir: &Path) -> Result<Self, String> {
    let location = location.trim();
    if location.is_empty() {
      return Err("source location is empty".to_string());
    }

    let is_git = location.trim_end_matches('/').ends_with(".git");
    match (is_git, hash) {
      (true, Some(_)) => Err(format!(
        "git source '{}' takes no hash; pin the commit in the build script",
        location
      )),
      (true, None) => Ok(Self::GitRepository {
        url: location.to_string(),
      }),
      (false, Some(hash)) => {
        if !is_sha256_hex(hash) {
          return Err(format!("source '{}' has malformed sha256 '{}'", location, hash));
        }
        let url = if location.contains("://") {
          location.to_string()
        } else {
          crate::platform::paths::expand_path(location, base_dir)
            .to_string_lossy()
            .to_string()
        };
        Ok(Self::RemoteArchive {
          url,
          hash: hash.to_ascii_lowercase(),
        })
      }
      (false, None) if location.contains("://") => Err(format!(
        "remote source '{}' needs a sha256 (or a .git suffix for repositories)",
        location
      )),
      (false, None) => Ok(Self::LocalDirectory {
        path: crate::platform::paths::expand_path(location, base_dir),
      }),
    }
  }

  /// Human-readable identifier used in logs and error messages.
  pub fn display_name(&self) -> String {
    match self {
      Self::LocalDirectory { path } => path.display().to_string(),
      Self::RemoteArchive { url, .. } | Self::GitRepository { url } => url.clone(),
    }
  }
}

fn is_sha256_hex(s: &str) -> bool {
  s.len() == 64 && s.chars().all(|c| c.is_ascii_hexdigit())
}

/// A source available on local disk.
///
/// `content_hash` is the digest of the bytes at `local_path` at the time
/// verification completed. Git mirrors are directories and carry no digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedSource {
  pub local_path: PathBuf,
  pub content_hash: Option<ContentHash>,
}

impl VerifiedSource {
  /// Re-express an archive source as a `RemoteArchive` pointing at the local
  /// file, so it can be resolved again without network access.
  pub fn as_remote_archive(&self) -> Option<SourceSpec> {
    let hash = self.content_hash.as_ref()?;
    Some(SourceSpec::RemoteArchive {
      url: self.local_path.to_string_lossy().to_string(),
      hash: hash.0.clone(),
    })
  }

  /// Whether this source is a git mirror rather than a single file.
  pub fn is_git_mirror(&self) -> bool {
    self.content_hash.is_none() && self.local_path.is_dir()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const HASH: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

  #[test]
  fn classify_git_suffix() {
    let spec = SourceSpec::classify("https://github.com/org/libfoo.git", None, Path::new("/r")).unwrap();
    assert_eq!(
      spec,
      SourceSpec::GitRepository {
        url: "https://github.com/org/libfoo.git".to_string()
      }
    );
  }

  #[test]
  fn classify_archive_with_hash() {
    let spec = SourceSpec::classify("https://example.com/libfoo.tar.gz", Some(HASH), Path::new("/r")).unwrap();
    assert!(matches!(spec, SourceSpec::RemoteArchive { ref hash, .. } if hash == HASH));
  }

  #[test]
  fn classify_uppercase_hash_is_normalized() {
    let upper = HASH.to_uppercase();
    let spec = SourceSpec::classify("libfoo.tar.gz", Some(&upper), Path::new("/r")).unwrap();
    assert!(matches!(spec, SourceSpec::RemoteArchive { ref hash, .. } if hash == HASH));
  }

  #[test]
  fn classify_local_archive_is_relative_to_base() {
    let base = Path::new("/recipes/libfoo");
    let relative = SourceSpec::classify("libfoo-1.0.tar.gz", Some(HASH), base).unwrap();
    let absolute = SourceSpec::classify("/srv/libfoo-1.0.tar.gz", Some(HASH), base).unwrap();
    let file_url = SourceSpec::classify("file:///srv/libfoo-1.0.tar.gz", Some(HASH), base).unwrap();

    assert_eq!(relative.display_name(), "/recipes/libfoo/libfoo-1.0.tar.gz");
    assert_eq!(absolute.display_name(), "/srv/libfoo-1.0.tar.gz");
    assert_eq!(file_url.display_name(), "file:///srv/libfoo-1.0.tar.gz");
  }

  #[test]
  fn classify_local_directory_is_relative_to_base() {
    let spec = SourceSpec::classify("patches", None, Path::new("/recipes/libfoo")).unwrap();
    assert_eq!(
      spec,
      SourceSpec::LocalDirectory {
        path: PathBuf::from("/recipes/libfoo/patches")
      }
    );
  }

  #[test]
  fn classify_rejects_invalid_shapes() {
    let base = Path::new("/r");
    assert!(SourceSpec::classify("", None, base).is_err());
    assert!(SourceSpec::classify("https://github.com/org/libfoo.git", Some(HASH), base).is_err());
    assert!(SourceSpec::classify("https://example.com/libfoo.tar.gz", None, base).is_err());
    assert!(SourceSpec::classify("https://example.com/libfoo.tar.gz", Some("deadbeef"), base).is_err());
  }

  #[test]
  fn verified_archive_converts_to_remote_archive() {
    let source = VerifiedSource {
      local_path: PathBuf::from("/run/downloads/libfoo.tar.gz"),
      content_hash: Some(ContentHash(HASH.to_string())),
    };
    assert_eq!(
      source.as_remote_archive(),
      Some(SourceSpec::RemoteArchive {
        url: "/run/downloads/libfoo.tar.gz".to_string(),
        hash: HASH.to_string(),
      })
    );
  }
}

//! URL downloads with SHA-256 verification.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use super::SourceError;
use crate::util::hash::{ContentHash, hash_bytes, hash_file};

/// If `url` names a file on local disk (plain path or `file://` URL), return it.
pub fn local_file(url: &str) -> Option<PathBuf> {
  let path = PathBuf::from(url.strip_prefix("file://").unwrap_or(url));
  path.is_file().then_some(path)
}

/// Directory under `downloads_dir` that content with digest `sha256` is filed in.
///
/// Two sources that share a file name but not their bytes never land on the
/// same path.
pub fn content_dir(downloads_dir: &Path, sha256: &str) -> PathBuf {
  let digest: String = sha256
    .chars()
    .filter(char::is_ascii_hexdigit)
    .map(|c| c.to_ascii_lowercase())
    .collect();
  if digest.is_empty() {
    downloads_dir.join("unverified")
  } else {
    downloads_dir.join(digest)
  }
}

/// Fetch `url` into `downloads_dir` and verify it against `expected_sha256`.
///
/// Local files are verified in place without touching the network. Downloads
/// land in `<downloads_dir>/<sha256>/<filename>`, and a file already there
/// with the right digest is reused. A download whose digest disagrees is
/// never written to disk.
///
/// Returns the path of the verified file and its digest.
pub async fn fetch_url(
  url: &str,
  expected_sha256: &str,
  downloads_dir: &Path,
) -> Result<(PathBuf, ContentHash), SourceError> {
  if let Some(path) = local_file(url) {
    debug!(path = %path.display(), "verifying local file");
    let actual = hash_file(&path).map_err(|e| SourceError::Io {
      path: path.clone(),
      source: e,
    })?;
    return verified(url, expected_sha256, path, actual);
  }

  let dest_dir = content_dir(downloads_dir, expected_sha256);
  let dest_path = dest_dir.join(url_to_filename(url));

  // Check if file already exists with correct hash (cache hit)
  if dest_path.exists() {
    debug!(path = ?dest_path, "checking cached file");
    if let Ok(actual) = hash_file(&dest_path) {
      if actual.matches(expected_sha256) {
        info!(path = ?dest_path, "using cached file");
        return Ok((dest_path, actual));
      }
      debug!(expected = %expected_sha256, actual = %actual, "cached file hash mismatch, re-downloading");
    }
  }

  info!(url = %url, "fetching URL");
  let bytes = download_bytes(url).await?;
  let actual = hash_bytes(&bytes);

  // Verify hash before writing
  if !actual.matches(expected_sha256) {
    return Err(SourceError::HashMismatch {
      source_name: url.to_string(),
      expected: expected_sha256.to_string(),
      actual: actual.0,
    });
  }

  fs::create_dir_all(&dest_dir).await.map_err(|e| SourceError::Io {
    path: dest_dir.clone(),
    source: e,
  })?;
  write_file(&dest_path, &bytes).await?;
  info!(path = ?dest_path, size = bytes.len(), "download complete");

  Ok((dest_path, actual))
}

fn verified(
  url: &str,
  expected_sha256: &str,
  path: PathBuf,
  actual: ContentHash,
) -> Result<(PathBuf, ContentHash), SourceError> {
  if actual.matches(expected_sha256) {
    Ok((path, actual))
  } else {
    Err(SourceError::HashMismatch {
      source_name: url.to_string(),
      expected: expected_sha256.to_string(),
      actual: actual.0,
    })
  }
}

/// GET `url` and return the body, mapping transport errors and non-2xx
/// statuses to [`SourceError::DownloadFailure`].
pub async fn download_bytes(url: &str) -> Result<Vec<u8>, SourceError> {
  let failure = |message: String| SourceError::DownloadFailure {
    url: url.to_string(),
    message,
  };

  let response = reqwest::get(url).await.map_err(|e| failure(e.to_string()))?;
  if !response.status().is_success() {
    return Err(failure(format!("HTTP {}", response.status())));
  }

  let bytes = response.bytes().await.map_err(|e| failure(e.to_string()))?;
  Ok(bytes.to_vec())
}

async fn write_file(dest_path: &Path, bytes: &[u8]) -> Result<(), SourceError> {
  let io_err = |e| SourceError::Io {
    path: dest_path.to_path_buf(),
    source: e,
  };
  let mut file = fs::File::create(dest_path).await.map_err(io_err)?;
  file.write_all(bytes).await.map_err(io_err)?;
  file.flush().await.map_err(io_err)?;
  Ok(())
}

/// Convert a URL to a safe filename.
///
/// Takes the last path component and sanitizes it. Falls back to hash of URL
/// if no suitable filename can be extracted.
pub fn url_to_filename(url: &str) -> String {
  if let Some(filename) = url.rsplit('/').next() {
    // Remove query string
    let filename = filename.split('?').next().unwrap_or(filename);

    // Sanitize: only allow alphanumeric, dash, underscore, dot
    let sanitized: String = filename
      .chars()
      .map(|c| {
        if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' {
          c
        } else {
          '_'
        }
      })
      .collect();

    if !sanitized.is_empty() && sanitized != "." && sanitized != ".." {
      return sanitized;
    }
  }

  // Fallback: hash the URL
  let mut hasher = Sha256::new();
  hasher.update(url.as_bytes());
  format!("download_{}", &hex::encode(hasher.finalize())[..16])
}

//! Installing dependency artifacts into a prefix and removing them again.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, info, warn};

use super::{DependencyDescriptor, DependencyError, DownloadInfoSource, InstallMode};
use crate::consts::{DOWNLOADS_DIR, MANIFESTS_DIR};
use crate::package::unpack;
use crate::platform::Platform;
use crate::source::fetch::{fetch_url, url_to_filename};

/// Path of the install manifest for the artifact at `url`:
/// `<prefix>/manifests/<artifact-stem>.list`.
pub fn manifest_path(prefix: &Path, url: &str) -> PathBuf {
  let filename = url_to_filename(url);
  let stem = [".tar.gz", ".tgz", ".tar"]
    .iter()
    .find_map(|ext| filename.strip_suffix(ext))
    .unwrap_or(&filename);
  prefix.join(MANIFESTS_DIR).join(format!("{}.list", stem))
}

/// Install `descriptor`'s artifact for `platform` into `prefix`.
///
/// Every `install(url, hash)` the descriptor makes is downloaded into
/// `<prefix>/downloads/`, verified and unpacked into the prefix. For each
/// `write_manifest(url)` the unpacked file list is written to
/// [`manifest_path`]. Returns the manifests written.
pub async fn install_dependency(
  descriptor: &DependencyDescriptor,
  prefix: &Path,
  platform: &Platform,
) -> Result<Vec<PathBuf>, DependencyError> {
  let install_err = |message: String| DependencyError::Install {
    dependency: descriptor.name.clone(),
    message,
  };

  let eval = descriptor.evaluate(platform, prefix, InstallMode::Install)?;
  if eval.installs.is_empty() {
    return Err(install_err(format!("descriptor installed nothing for {}", platform)));
  }

  let downloads_dir = prefix.join(DOWNLOADS_DIR);
  let mut installed: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();

  for request in &eval.installs {
    info!(dependency = %descriptor.name, url = %request.url, "installing dependency");
    let (archive, _) = fetch_url(&request.url, &request.hash, &downloads_dir)
      .await
      .map_err(|e| install_err(e.to_string()))?;

    let dest = prefix.to_path_buf();
    let files = tokio::task::spawn_blocking(move || unpack(&archive, &dest))
      .await
      .map_err(|e| install_err(e.to_string()))?
      .map_err(|e| install_err(e.to_string()))?;

    debug!(dependency = %descriptor.name, files = files.len(), "unpacked dependency");
    installed.entry(request.url.clone()).or_default().extend(files);
  }

  let mut written = Vec::with_capacity(eval.manifests.len());
  for url in &eval.manifests {
    let files = installed
      .get(url)
      .ok_or_else(|| install_err(format!("write_manifest called for '{}' which was never installed", url)))?;
    let path = manifest_path(prefix, url);
    write_manifest(&path, files)?;
    written.push(path);
  }

  Ok(written)
}

fn write_manifest(path: &Path, files: &[PathBuf]) -> Result<(), DependencyError> {
  let io_err = |source| DependencyError::Io {
    path: path.to_path_buf(),
    source,
  };

  if let Some(parent) = path.parent() {
    fs::create_dir_all(parent).map_err(io_err)?;
  }

  let mut content = String::new();
  for file in files {
    content.push_str(&file.to_string_lossy());
    content.push('\n');
  }
  fs::write(path, content).map_err(io_err)
}

/// Remove `descriptor`'s artifact for `platform` from `prefix`.
///
/// The descriptor is re-evaluated with installation disabled to find which
/// artifact it would install, and the files listed in that artifact's
/// manifest are removed.
pub fn cleanup_dependency(
  descriptor: &DependencyDescriptor,
  prefix: &Path,
  platform: &Platform,
) -> Result<usize, DependencyError> {
  let info = descriptor.resolve_download_info(platform, prefix)?;
  let manifest = manifest_path(prefix, &info.url);
  if !manifest.is_file() {
    return Err(DependencyError::MissingManifest {
      dependency: descriptor.name.clone(),
      path: manifest,
    });
  }

  let removed = uninstall_manifest(prefix, &manifest)?;
  info!(dependency = %descriptor.name, platform = %platform, removed, "removed dependency");
  Ok(removed)
}

/// Remove every file listed in `manifest`, prune directories left empty, then
/// remove the manifest itself. Returns the number of files removed.
///
/// Entries must be relative paths inside `prefix`.
pub fn uninstall_manifest(prefix: &Path, manifest: &Path) -> Result<usize, DependencyError> {
  let content = fs::read_to_string(manifest).map_err(|source| DependencyError::Io {
    path: manifest.to_path_buf(),
    source,
  })?;

  let mut removed = 0;
  for entry in content.lines().map(str::trim).filter(|l| !l.is_empty()) {
    let relative = Path::new(entry);
    if !is_contained(relative) {
      return Err(DependencyError::UnsafeEntry {
        manifest: manifest.to_path_buf(),
        entry: entry.to_string(),
      });
    }

    let path = prefix.join(relative);
    match fs::remove_file(&path) {
      Ok(()) => removed += 1,
      Err(e) if e.kind() == ErrorKind::NotFound => {
        warn!(path = %path.display(), "manifest entry already gone");
      }
      Err(source) => return Err(DependencyError::Io { path, source }),
    }

    if let Some(parent) = path.parent() {
      prune_empty_dirs(parent, prefix);
    }
  }

  fs::remove_file(manifest).map_err(|source| DependencyError::Io {
    path: manifest.to_path_buf(),
    source,
  })?;
  if let Some(parent) = manifest.parent() {
    prune_empty_dirs(parent, prefix);
  }

  Ok(removed)
}

fn is_contained(path: &Path) -> bool {
  path
    .components()
    .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// Remove `dir` and its ancestors while they are empty, stopping at `root`.
fn prune_empty_dirs(dir: &Path, root: &Path) {
  let mut current = Some(dir);
  while let Some(dir) = current {
    if dir == root || !dir.starts_with(root) {
      break;
    }
    // remove_dir fails on non-empty directories, which ends the walk
    if fs::remove_dir(dir).is_err() {
      break;
    }
    debug!(path = %dir.display(), "pruned empty directory");
    current = dir.parent();
  }
}

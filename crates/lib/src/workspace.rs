//! Per-platform workspace lifecycle.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::consts::DOWNLOADS_DIR;
use crate::platform::Platform;

/// Transient directories backing one platform's build.
///
/// `build_dir` is `<run>/build/<triplet>/`. The runner creates the prefix
/// somewhere below it, and `downloads_dir` is the prefix's `downloads/`.
#[derive(Debug, Clone)]
pub struct Workspace {
  pub prefix_dir: PathBuf,
  pub downloads_dir: PathBuf,
  pub build_dir: PathBuf,
  pub platform: Platform,
}

impl Workspace {
  pub fn new(build_dir: PathBuf, prefix_dir: PathBuf, platform: Platform) -> Self {
    Self {
      downloads_dir: prefix_dir.join(DOWNLOADS_DIR),
      prefix_dir,
      build_dir,
      platform,
    }
  }

  /// Remove the prefix's downloads so they are not packaged.
  pub fn purge_downloads(&self) -> std::io::Result<()> {
    remove_dir_all_if_exists(&self.downloads_dir)
  }

  /// Remove the prefix and its parent, the runner's scratch tree.
  ///
  /// The parent is only removed when it still lies inside `build_dir`.
  pub fn destroy(&self) -> std::io::Result<()> {
    let scratch = match self.prefix_dir.parent() {
      Some(parent) if parent.starts_with(&self.build_dir) && parent != self.build_dir => parent,
      _ => self.prefix_dir.as_path(),
    };
    debug!(path = %scratch.display(), "destroying workspace");
    remove_dir_all_if_exists(scratch)
  }

  /// Remove `build_dir` if nothing is left in it. Returns whether it was removed.
  pub fn remove_build_dir_if_empty(&self) -> bool {
    remove_dir_if_empty(&self.build_dir)
  }
}

/// Remove `dir` if it exists and is empty.
pub fn remove_dir_if_empty(dir: &Path) -> bool {
  match std::fs::read_dir(dir) {
    Ok(mut entries) => entries.next().is_none() && std::fs::remove_dir(dir).is_ok(),
    Err(_) => false,
  }
}

fn remove_dir_all_if_exists(dir: &Path) -> std::io::Result<()> {
  match std::fs::remove_dir_all(dir) {
    Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
    other => other,
  }
}

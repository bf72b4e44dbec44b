//! Git mirrors for repository sources.
//!
//! Repositories are kept as bare mirrors under the run's downloads directory
//! so that every platform's workspace can check out from local disk. An
//! existing mirror is updated in place instead of cloned again.

use std::fs;
use std::path::{Path, PathBuf};

use gix::remote::Direction;
use thiserror::Error;
use tracing::{debug, info};

use super::fetch::url_to_filename;
use crate::util::hash::hash_bytes;

/// Errors that can occur during git operations.
#[derive(Debug, Error)]
pub enum GitError {
  /// Failed to create the mirror directory.
  #[error("failed to create mirror directory '{0}': {1}")]
  CreateDir(PathBuf, #[source] std::io::Error),

  /// Failed to clone a git repository.
  #[error("failed to clone repository '{url}': {source}")]
  Clone {
    url: String,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
  },

  /// Failed to open an existing git repository.
  #[error("failed to open repository at '{path}': {source}")]
  Open {
    path: PathBuf,
    #[source]
    source: Box<gix::open::Error>,
  },

  /// Failed to fetch from remote.
  #[error("failed to fetch from '{url}': {source}")]
  Fetch {
    url: String,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
  },

  /// Failed to checkout a working tree.
  #[error("failed to checkout '{path}': {source}")]
  Checkout {
    path: PathBuf,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
  },

  /// Mirror has no remote to fetch from.
  #[error("no remote configured for mirror '{0}'")]
  NoRemote(PathBuf),
}

/// Directory name of the mirror for `url` (e.g. `libfoo.git`).
pub fn mirror_name(url: &str) -> String {
  let name = url_to_filename(url.trim_end_matches('/'));
  if name.ends_with(".git") { name } else { format!("{}.git", name) }
}

/// Where the mirror for `url` lives under `cache_dir`.
///
/// Mirrors are keyed by a digest of the full URL, so repositories sharing a
/// name on different hosts or organisations get separate mirrors.
pub fn mirror_path(url: &str, cache_dir: &Path) -> PathBuf {
  let key = hash_bytes(url.trim_end_matches('/').as_bytes());
  cache_dir.join(&key.0[..16]).join(mirror_name(url))
}

/// Clone `url` as a bare mirror under `cache_dir`, or fetch updates into the
/// mirror if it already exists. Returns the mirror path.
pub fn mirror_repository(url: &str, cache_dir: &Path) -> Result<PathBuf, GitError> {
  let mirror_path = mirror_path(url, cache_dir);

  if let Some(parent) = mirror_path.parent() {
    fs::create_dir_all(parent).map_err(|e| GitError::CreateDir(parent.to_path_buf(), e))?;
  }

  if mirror_path.join("HEAD").exists() {
    debug!(url, path = %mirror_path.display(), "updating existing mirror");
    let repo = gix::open(&mirror_path).map_err(|e| GitError::Open {
      path: mirror_path.clone(),
      source: Box::new(e),
    })?;
    fetch_updates(&repo, url, &mirror_path)?;
  } else {
    info!(url, path = %mirror_path.display(), "cloning mirror");
    clone_bare(url, &mirror_path)?;
  }

  Ok(mirror_path)
}

/// Check out a working tree of the repository at `mirror` into `dest`.
pub fn checkout_mirror(mirror: &Path, dest: &Path) -> Result<(), GitError> {
  let url = mirror.to_string_lossy().to_string();
  let mut prepared = gix::prepare_clone(url.as_str(), dest).map_err(|e| GitError::Clone {
    url: url.clone(),
    source: Box::new(e),
  })?;

  let (mut checkout, _outcome) = prepared
    .fetch_then_checkout(gix::progress::Discard, &gix::interrupt::IS_INTERRUPTED)
    .map_err(|e| GitError::Clone {
      url: url.clone(),
      source: Box::new(e),
    })?;

  checkout
    .main_worktree(gix::progress::Discard, &gix::interrupt::IS_INTERRUPTED)
    .map_err(|e| GitError::Checkout {
      path: dest.to_path_buf(),
      source: Box::new(e),
    })?;

  Ok(())
}

fn clone_bare(url: &str, dest: &Path) -> Result<(), GitError> {
  let mut prepared = gix::prepare_clone_bare(url, dest).map_err(|e| GitError::Clone {
    url: url.to_string(),
    source: Box::new(e),
  })?;

  prepared
    .fetch_only(gix::progress::Discard, &gix::interrupt::IS_INTERRUPTED)
    .map_err(|e| GitError::Clone {
      url: url.to_string(),
      source: Box::new(e),
    })?;

  Ok(())
}

fn fetch_updates(repo: &gix::Repository, url: &str, mirror_path: &Path) -> Result<(), GitError> {
  let remote = repo
    .find_default_remote(Direction::Fetch)
    .ok_or_else(|| GitError::NoRemote(mirror_path.to_path_buf()))?
    .map_err(|e| GitError::Fetch {
      url: url.to_string(),
      source: Box::new(e),
    })?;

  let connection = remote.connect(Direction::Fetch).map_err(|e| GitError::Fetch {
    url: url.to_string(),
    source: Box::new(e),
  })?;

  connection
    .prepare_fetch(gix::progress::Discard, Default::default())
    .map_err(|e| GitError::Fetch {
      url: url.to_string(),
      source: Box::new(e),
    })?
    .receive(gix::progress::Discard, &gix::interrupt::IS_INTERRUPTED)
    .map_err(|e| GitError::Fetch {
      url: url.to_string(),
      source: Box::new(e),
    })?;

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::util::testutil::{GitUpstream, git};
  use tempfile::TempDir;

  #[test]
  fn mirror_name_keeps_git_suffix() {
    assert_eq!(mirror_name("https://github.com/org/libfoo.git"), "libfoo.git");
    assert_eq!(mirror_name("https://github.com/org/libfoo.git/"), "libfoo.git");
  }

  #[test]
  fn same_named_repositories_get_separate_mirrors() {
    let cache = Path::new("/run/downloads");
    let a = mirror_path("https://github.com/alice/libfoo.git", cache);
    let b = mirror_path("https://gitlab.com/bob/libfoo.git", cache);

    assert_ne!(a, b);
    assert!(a.ends_with("libfoo.git"));
    assert_eq!(a, mirror_path("https://github.com/alice/libfoo.git/", cache));
  }

  #[test]
  fn first_resolve_clones_a_bare_mirror() {
    let temp = TempDir::new().unwrap();
    let upstream = GitUpstream::new(temp.path(), "libfoo");
    let head = git(&upstream.bare, &["rev-parse", "main"]);

    let mirror = mirror_repository(&upstream.url(), &temp.path().join("downloads")).unwrap();

    assert_eq!(mirror, mirror_path(&upstream.url(), &temp.path().join("downloads")));
    assert!(mirror.join("HEAD").is_file());
    assert!(!mirror.join(".git").exists(), "mirror must be bare");
    git(&mirror, &["cat-file", "-e", &head]);
  }

  #[test]
  fn second_resolve_fetches_new_commits() {
    let temp = TempDir::new().unwrap();
    let downloads = temp.path().join("downloads");
    let upstream = GitUpstream::new(temp.path(), "libfoo");

    let first = mirror_repository(&upstream.url(), &downloads).unwrap();
    let added = upstream.commit("CHANGES", "second\n");
    let second = mirror_repository(&upstream.url(), &downloads).unwrap();

    assert_eq!(first, second);
    git(&second, &["cat-file", "-e", &added]);
  }

  #[test]
  fn checkout_mirror_writes_working_tree() {
    let temp = TempDir::new().unwrap();
    let upstream = GitUpstream::new(temp.path(), "libfoo");
    let mirror = mirror_repository(&upstream.url(), &temp.path().join("downloads")).unwrap();

    let dest = temp.path().join("checkout");
    checkout_mirror(&mirror, &dest).unwrap();

    assert_eq!(std::fs::read_to_string(dest.join("README")).unwrap(), "initial\n");
  }

  #[test]
  fn clone_of_missing_repository_fails() {
    let temp = TempDir::new().unwrap();
    let url = temp.path().join("nowhere.git").to_string_lossy().to_string();

    let result = mirror_repository(&url, &temp.path().join("downloads"));
    assert!(matches!(result, Err(GitError::Clone { .. })));
  }
}

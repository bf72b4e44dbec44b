//! Test utilities for autobuild-lib.
//!
//! Git fixtures drive the `git` binary directly. Local clones and fetches
//! spawn `git-upload-pack` anyway, so tests that use them need git installed.

use std::path::{Path, PathBuf};
use std::process::Command;

/// Run `git` in `dir` and return its trimmed stdout. Panics with stderr on
/// failure.
pub fn git(dir: &Path, args: &[&str]) -> String {
  let output = Command::new("git")
    .arg("-C")
    .arg(dir)
    .args(["-c", "user.name=autobuild", "-c", "user.email=autobuild@localhost"])
    .args(["-c", "commit.gpgsign=false"])
    .args(args)
    .output()
    .expect("git must be installed to run this test");
  assert!(
    output.status.success(),
    "git {:?} failed: {}",
    args,
    String::from_utf8_lossy(&output.stderr)
  );
  String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// A bare upstream repository and a working clone that pushes to it.
pub struct GitUpstream {
  pub bare: PathBuf,
  work: PathBuf,
}

impl GitUpstream {
  /// Create `<root>/<name>.git` whose `main` holds one commit adding `README`.
  pub fn new(root: &Path, name: &str) -> Self {
    let bare = root.join(format!("{}.git", name));
    let work = root.join(format!("{}-work", name));
    for dir in [&bare, &work] {
      std::fs::create_dir_all(dir).unwrap();
    }

    git(&bare, &["init", "-q", "--bare"]);
    git(&bare, &["symbolic-ref", "HEAD", "refs/heads/main"]);
    git(&work, &["init", "-q"]);
    git(&work, &["symbolic-ref", "HEAD", "refs/heads/main"]);
    git(&work, &["remote", "add", "origin", bare.to_str().unwrap()]);

    let upstream = Self { bare, work };
    upstream.commit("README", "initial\n");
    upstream
  }

  pub fn url(&self) -> String {
    self.bare.to_string_lossy().to_string()
  }

  /// Write `content` to `file`, commit it and push to `main`. Returns the
  /// new commit id.
  pub fn commit(&self, file: &str, content: &str) -> String {
    std::fs::write(self.work.join(file), content).unwrap();
    git(&self.work, &["add", file]);
    git(&self.work, &["commit", "-q", "-m", &format!("update {}", file)]);
    git(&self.work, &["push", "-q", "origin", "HEAD:refs/heads/main"]);
    git(&self.work, &["rev-parse", "HEAD"])
  }
}

//! Host shell runner.
//!
//! Builds run under `/bin/sh` with the environment cleared, in the spirit of
//! a Nix builder: a fixed `PATH`, `HOME` pointing nowhere, a private `TMPDIR`
//! and a pinned `SOURCE_DATE_EPOCH`. The script sees:
//!
//! - `prefix` - the install prefix that will be packaged
//! - `srcdir` - the directory sources were staged into (also the cwd)
//! - `target` - the platform triplet being built
//! - `WORKSPACE` - the workspace root

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::{BuildJob, SandboxError, SandboxRunner};
use crate::dependency::{DependencyDescriptor, install_dependency};
use crate::package::{is_archive, unpack};
use crate::platform::Platform;
use crate::source::VerifiedSource;
use crate::source::git::checkout_mirror;

/// `PATH` inside the build unless overridden.
const DEFAULT_PATH: &str = "/usr/local/bin:/usr/bin:/bin";

/// Value is 315532800 = January 1, 1980 00:00:00 UTC (ZIP epoch)
const BUILD_SOURCE_DATE_EPOCH: &str = "315532800";

/// Paths inside one workspace.
#[derive(Debug, Clone)]
pub struct LocalWorkspace {
  pub root: PathBuf,
  pub srcdir: PathBuf,
  pub prefix: PathBuf,
}

/// Runs build scripts with the host's `/bin/sh`.
#[derive(Debug, Clone)]
pub struct LocalRunner {
  shell: String,
  path: String,
}

impl Default for LocalRunner {
  fn default() -> Self {
    Self {
      shell: "/bin/sh".to_string(),
      path: DEFAULT_PATH.to_string(),
    }
  }
}

impl LocalRunner {
  pub fn new() -> Self {
    Self::default()
  }

  /// Replace the `PATH` the build script runs with.
  pub fn with_path(mut self, path: impl Into<String>) -> Self {
    self.path = path.into();
    self
  }
}

#[async_trait]
impl SandboxRunner for LocalRunner {
  type Handle = LocalWorkspace;

  async fn setup_workspace(
    &self,
    build_dir: &Path,
    sources: &[VerifiedSource],
    dependencies: &[DependencyDescriptor],
    platform: &Platform,
  ) -> Result<(PathBuf, LocalWorkspace), SandboxError> {
    let io_err = |path: &Path, source| SandboxError::Io {
      path: path.to_path_buf(),
      source,
    };

    tokio::fs::create_dir_all(build_dir)
      .await
      .map_err(|e| io_err(build_dir, e))?;

    // Kept on disk so a failed build can be inspected; the orchestrator
    // removes it after packaging.
    let root = tempfile::Builder::new()
      .prefix("workspace-")
      .tempdir_in(build_dir)
      .map_err(|e| io_err(build_dir, e))?
      .keep();

    let workspace = LocalWorkspace {
      srcdir: root.join("srcdir"),
      prefix: root.join("destdir"),
      root,
    };
    for dir in [&workspace.srcdir, &workspace.prefix] {
      tokio::fs::create_dir_all(dir).await.map_err(|e| io_err(dir.as_path(), e))?;
    }

    for source in sources {
      stage_source(source, &workspace.srcdir).await?;
    }

    for dependency in dependencies {
      install_dependency(dependency, &workspace.prefix, platform).await?;
    }

    info!(platform = %platform, root = %workspace.root.display(), "workspace ready");
    Ok((workspace.prefix.clone(), workspace))
  }

  async fn run_build(&self, workspace: LocalWorkspace, job: BuildJob) -> Result<bool, SandboxError> {
    info!(name = %job.source_name, platform = %job.platform, "running build script");

    let tmp_dir = workspace.root.join("tmp");
    tokio::fs::create_dir_all(&tmp_dir).await.map_err(|source| SandboxError::Io {
      path: tmp_dir.clone(),
      source,
    })?;

    let mut command = Command::new(&self.shell);
    command
      .arg("-c")
      .arg(&job.script)
      .current_dir(&workspace.srcdir)
      .env_clear()
      .env("PATH", &self.path)
      .env("HOME", "/homeless-shelter")
      .env("TMPDIR", &tmp_dir)
      .env("TMP", &tmp_dir)
      .env("TEMP", &tmp_dir)
      .env("LANG", "C")
      .env("LC_ALL", "C")
      .env("SOURCE_DATE_EPOCH", BUILD_SOURCE_DATE_EPOCH)
      .env("prefix", &workspace.prefix)
      .env("srcdir", &workspace.srcdir)
      .env("target", job.platform.triplet())
      .env("WORKSPACE", &workspace.root);

    debug!(shell = %self.shell, working_dir = ?workspace.srcdir, "spawning build shell");
    let output = command.output().await.map_err(|source| SandboxError::Spawn {
      shell: self.shell.clone(),
      source,
    })?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stdout.is_empty() {
      debug!(stdout = %stdout, "build stdout");
    }
    if !stderr.is_empty() {
      debug!(stderr = %stderr, "build stderr");
    }

    if !output.status.success() {
      warn!(
        platform = %job.platform,
        code = ?output.status.code(),
        stderr = %last_lines(&stderr, 20),
        "build script failed"
      );
      return Ok(false);
    }

    let mut complete = true;
    for product in &job.products {
      match product.locate(&workspace.prefix, &job.platform) {
        Some(path) => debug!(product = %product.variable, path = %path.display(), "found product"),
        None => {
          warn!(product = %product.variable, name = %product.name, platform = %job.platform, "product not found");
          complete = false;
        }
      }
    }

    Ok(complete)
  }
}

/// Put one verified source into `srcdir`: archives are unpacked, git mirrors
/// checked out, anything else copied.
async fn stage_source(source: &VerifiedSource, srcdir: &Path) -> Result<(), SandboxError> {
  let path = source.local_path.clone();
  let stage_err = |e: Box<dyn std::error::Error + Send + Sync>| SandboxError::StageSource {
    path: source.local_path.clone(),
    source: e,
  };

  if source.is_git_mirror() {
    let name = path
      .file_name()
      .map(|n| n.to_string_lossy().trim_end_matches(".git").to_string())
      .unwrap_or_else(|| "repository".to_string());
    let dest = srcdir.join(name);
    debug!(mirror = %path.display(), dest = %dest.display(), "checking out mirror");
    tokio::task::spawn_blocking(move || checkout_mirror(&path, &dest))
      .await
      .map_err(|e| SandboxError::Task(e.to_string()))?
      .map_err(|e| stage_err(Box::new(e)))?;
  } else if is_archive(&path) {
    let dest = srcdir.to_path_buf();
    debug!(archive = %path.display(), "unpacking source");
    tokio::task::spawn_blocking(move || unpack(&path, &dest))
      .await
      .map_err(|e| SandboxError::Task(e.to_string()))?
      .map_err(|e| stage_err(Box::new(e)))?;
  } else {
    let file_name = path.file_name().map(PathBuf::from).unwrap_or_default();
    let dest = srcdir.join(file_name);
    tokio::fs::copy(&path, &dest)
      .await
      .map_err(|e| stage_err(Box::new(e)))?;
  }

  Ok(())
}

fn last_lines(text: &str, n: usize) -> String {
  let lines: Vec<&str> = text.lines().collect();
  lines[lines.len().saturating_sub(n)..].join("\n")
}

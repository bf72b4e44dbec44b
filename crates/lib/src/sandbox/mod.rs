//! Isolated per-platform build execution.
//!
//! The orchestrator talks to a [`SandboxRunner`] in two steps: first
//! [`SandboxRunner::setup_workspace`] stages sources and dependencies and
//! returns the install prefix, then [`SandboxRunner::run_build`] consumes a
//! [`BuildJob`] and reports whether the build produced every declared product.
//!
//! [`LocalRunner`] is the default implementation: a cleared-environment
//! `/bin/sh` on the host.

mod local;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

pub use local::{LocalRunner, LocalWorkspace};

use crate::dependency::{DependencyDescriptor, DependencyError};
use crate::platform::Platform;
use crate::product::Product;
use crate::source::VerifiedSource;

#[derive(Debug, Error)]
pub enum SandboxError {
  #[error("io error at {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to stage source {path}: {source}")]
  StageSource {
    path: PathBuf,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
  },

  #[error(transparent)]
  Dependency(#[from] DependencyError),

  #[error("failed to spawn build shell '{shell}': {source}")]
  Spawn {
    shell: String,
    #[source]
    source: std::io::Error,
  },

  #[error("sandbox task failed: {0}")]
  Task(String),
}

/// Everything a runner needs to build one platform.
///
/// Constructed by the orchestrator and handed to the runner by value.
#[derive(Debug, Clone)]
pub struct BuildJob {
  /// Package name, used in log messages.
  pub source_name: String,
  pub verified_sources: Vec<VerifiedSource>,
  pub script: String,
  pub products: Vec<Product>,
  pub dependencies: Vec<DependencyDescriptor>,
  pub platform: Platform,
}

/// Executes builds in an isolated workspace.
#[async_trait]
pub trait SandboxRunner: Send + Sync {
  /// Runner-specific state carried from setup to build.
  type Handle: Send;

  /// Create a workspace under `build_dir`, stage `sources` and install
  /// `dependencies` into its prefix. Returns the prefix path and a handle for
  /// [`SandboxRunner::run_build`].
  async fn setup_workspace(
    &self,
    build_dir: &Path,
    sources: &[VerifiedSource],
    dependencies: &[DependencyDescriptor],
    platform: &Platform,
  ) -> Result<(PathBuf, Self::Handle), SandboxError>;

  /// Run `job` in the workspace behind `handle`. `Ok(false)` means the build
  /// ran but failed or did not produce its declared products.
  async fn run_build(&self, handle: Self::Handle, job: BuildJob) -> Result<bool, SandboxError>;
}

//! The autobuild pipeline.
//!
//! [`autobuild`] resolves sources once, then builds each requested platform in
//! turn:
//!
//! 1. the runner sets up a fresh workspace under `<run>/build/<triplet>/`
//! 2. `<prefix>/downloads/` is purged
//! 3. the build runs; a failure aborts the run and leaves the workspace behind
//! 4. dependencies are removed from the prefix again
//! 5. the prefix is packaged into `<run>/products/`
//! 6. the workspace is destroyed and the build directory removed if empty
//!
//! Once every platform has been packaged the manifest script is written next
//! to the tarballs. [`reconstruct_manifest`] produces the same manifest from a
//! published release instead of building.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{info, warn};

use crate::config::RunConfig;
use crate::consts::{BUILD_DIR, DOWNLOADS_DIR, HEARTBEAT_INTERVAL, PRODUCTS_DIR};
use crate::dependency::{DependencyDescriptor, cleanup_dependency};
use crate::error::AutobuildError;
use crate::heartbeat::Heartbeat;
use crate::manifest::{ManifestScript, ProductEntry, ProductHashMap};
use crate::package::package;
use crate::platform::Platform;
use crate::product::Product;
use crate::recipe::Recipe;
use crate::release::{ReleaseClient, reconstruct};
use crate::sandbox::{BuildJob, SandboxRunner};
use crate::source::{SourceSpec, VerifiedSource, resolve_sources};
use crate::workspace::Workspace;

/// Per-invocation state passed explicitly through the pipeline.
#[derive(Debug, Clone)]
pub struct RunContext {
  /// Root for downloads, build workspaces and products.
  pub run_dir: PathBuf,
  pub verbose: bool,
  pub config: RunConfig,
  pub heartbeat_interval: Duration,
}

impl RunContext {
  pub fn new(run_dir: impl Into<PathBuf>, config: RunConfig) -> Self {
    Self {
      run_dir: run_dir.into(),
      verbose: false,
      config,
      heartbeat_interval: HEARTBEAT_INTERVAL,
    }
  }

  pub fn downloads_dir(&self) -> PathBuf {
    self.run_dir.join(DOWNLOADS_DIR)
  }

  pub fn build_root(&self) -> PathBuf {
    self.run_dir.join(BUILD_DIR)
  }

  pub fn products_dir(&self) -> PathBuf {
    self.run_dir.join(PRODUCTS_DIR)
  }

  /// The heartbeat runs under CI unless verbose output already keeps the
  /// job alive. A zero interval disables it.
  pub fn heartbeat_enabled(&self) -> bool {
    self.config.ci && !self.verbose && !self.heartbeat_interval.is_zero()
  }
}

/// What to build.
#[derive(Debug, Clone)]
pub struct BuildRequest {
  pub name: String,
  pub version: String,
  pub sources: Vec<SourceSpec>,
  pub script: String,
  pub products: Vec<Product>,
  pub dependencies: Vec<DependencyDescriptor>,
  pub platforms: Vec<Platform>,
}

impl BuildRequest {
  /// Build `recipe` for `platforms`, loading its dependency descriptors.
  pub async fn from_recipe(recipe: &Recipe, platforms: Vec<Platform>) -> Result<Self, AutobuildError> {
    let mut request = Self::without_dependencies(recipe, platforms);
    for location in &recipe.dependencies {
      request
        .dependencies
        .push(DependencyDescriptor::load(location, &recipe.dir).await?);
    }
    Ok(request)
  }

  /// Describe `recipe` without loading its dependency descriptors. Enough for
  /// manifest reconstruction, which never stages dependencies.
  pub fn without_dependencies(recipe: &Recipe, platforms: Vec<Platform>) -> Self {
    Self {
      name: recipe.name.clone(),
      version: recipe.version.clone(),
      sources: recipe.sources.clone(),
      script: recipe.script.clone(),
      products: recipe.products.clone(),
      dependencies: Vec::new(),
      platforms,
    }
  }

  /// Base name of the produced tarballs: `<name>.v<version>`.
  pub fn artifact_base(&self) -> String {
    format!("{}.v{}", self.name, self.version)
  }

  fn validate(&self) -> Result<(), AutobuildError> {
    let invalid = |reason: &str| AutobuildError::InvalidSourceSpec {
      source_name: self.name.clone(),
      reason: reason.to_string(),
    };

    if self.name.trim().is_empty() {
      return Err(invalid("package name is empty"));
    }
    if self.platforms.is_empty() {
      return Err(invalid("no platforms requested"));
    }
    for (i, platform) in self.platforms.iter().enumerate() {
      if self.platforms[..i].contains(platform) {
        return Err(invalid(&format!("platform {} requested twice", platform)));
      }
    }
    Ok(())
  }

  fn manifest_script<'a>(&'a self, bin_prefix: &'a str, hashes: &'a ProductHashMap) -> ManifestScript<'a> {
    ManifestScript {
      name: &self.name,
      version: &self.version,
      products: &self.products,
      bin_prefix,
      hashes,
    }
  }
}

/// Build `request` for every platform it names and write the manifest script.
///
/// Fails fast: the first failing platform ends the run and no manifest is
/// written. Tarballs packaged for earlier platforms stay in place.
pub async fn autobuild<R>(ctx: &RunContext, request: &BuildRequest, runner: &R) -> Result<ProductHashMap, AutobuildError>
where
  R: SandboxRunner + ?Sized,
{
  request.validate()?;
  info!(
    name = %request.name,
    version = %request.version,
    platforms = request.platforms.len(),
    "starting autobuild"
  );

  let sources = resolve_sources(&request.sources, &ctx.downloads_dir()).await?;

  let heartbeat = ctx
    .heartbeat_enabled()
    .then(|| Heartbeat::start(ctx.heartbeat_interval));
  let result = build_platforms(ctx, request, &sources, runner).await;
  if let Some(heartbeat) = heartbeat {
    heartbeat.stop().await;
  }
  let hashes = result?;

  let products_dir = ctx.products_dir();
  let bin_prefix = ctx.config.bin_prefix(&products_dir);
  write_manifest_script(&request.manifest_script(&bin_prefix, &hashes), &products_dir)?;

  info!(name = %request.name, platforms = hashes.len(), "autobuild complete");
  Ok(hashes)
}

async fn build_platforms<R>(
  ctx: &RunContext,
  request: &BuildRequest,
  sources: &[VerifiedSource],
  runner: &R,
) -> Result<ProductHashMap, AutobuildError>
where
  R: SandboxRunner + ?Sized,
{
  let products_dir = ctx.products_dir();
  let artifact_base = products_dir.join(request.artifact_base());
  let mut hashes = ProductHashMap::new();

  for platform in &request.platforms {
    let platform = *platform;
    info!(platform = %platform, "building platform");
    let sandbox_err = |source| AutobuildError::Sandbox { platform, source };

    let build_dir = ctx.build_root().join(platform.triplet());
    let (prefix, handle) = runner
      .setup_workspace(&build_dir, sources, &request.dependencies, &platform)
      .await
      .map_err(sandbox_err)?;
    let workspace = Workspace::new(build_dir, prefix, platform);
    workspace.purge_downloads().map_err(|e| io_err(&workspace.downloads_dir, e))?;

    let job = BuildJob {
      source_name: request.name.clone(),
      verified_sources: sources.to_vec(),
      script: request.script.clone(),
      products: request.products.clone(),
      dependencies: request.dependencies.clone(),
      platform,
    };
    if !runner.run_build(handle, job).await.map_err(sandbox_err)? {
      warn!(platform = %platform, workspace = %workspace.build_dir.display(), "build failed, workspace kept for inspection");
      return Err(AutobuildError::BuildFailure { platform });
    }

    for dependency in &request.dependencies {
      cleanup_dependency(dependency, &workspace.prefix_dir, &platform).map_err(|e| {
        AutobuildError::DependencyCleanupFailure {
          dependency: dependency.name.clone(),
          platform,
          reason: e.to_string(),
        }
      })?;
    }

    let (tarball, hash) = package(&workspace.prefix_dir, &artifact_base, &platform).await?;
    let filename = tarball
      .file_name()
      .map(|n| n.to_string_lossy().to_string())
      .unwrap_or_default();
    if !hashes.insert_new(platform, ProductEntry { filename, hash }) {
      warn!(platform = %platform, "platform already packaged, keeping the first result");
    }

    workspace.destroy().map_err(|e| io_err(&workspace.prefix_dir, e))?;
    workspace.remove_build_dir_if_empty();
  }

  Ok(hashes)
}

/// Rebuild the product hash map from the release named by the environment
/// and write the manifest script, without building anything.
///
/// A missing repository or tag is reported before any network access.
pub async fn reconstruct_manifest<C>(
  ctx: &RunContext,
  request: &BuildRequest,
  client: &C,
) -> Result<ProductHashMap, AutobuildError>
where
  C: ReleaseClient + ?Sized,
{
  let target = ctx.config.release_target()?;
  let hashes = reconstruct(client, &target).await?;

  let bin_prefix = target.download_base();
  write_manifest_script(&request.manifest_script(&bin_prefix, &hashes), &ctx.products_dir())?;
  Ok(hashes)
}

fn write_manifest_script(script: &ManifestScript<'_>, dir: &Path) -> Result<PathBuf, AutobuildError> {
  script.write(dir).map_err(|e| io_err(dir, e))
}

fn io_err(path: &Path, source: std::io::Error) -> AutobuildError {
  AutobuildError::Io {
    path: path.to_path_buf(),
    source,
  }
}

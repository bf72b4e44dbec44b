//! Build command implementation.
//!
//! Loads a recipe, builds the selected platforms in local workspaces and
//! prints the resulting product hashes.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::debug;

use autobuild_lib::autobuild::{BuildRequest, RunContext, autobuild};
use autobuild_lib::config::RunConfig;
use autobuild_lib::manifest::ProductHashMap;
use autobuild_lib::platform::Platform;
use autobuild_lib::recipe::Recipe;
use autobuild_lib::sandbox::LocalRunner;

use crate::output::{
  OutputFormat, format_duration, print_info, print_json, print_stat, print_success, print_warning, truncate_hash,
};

pub fn cmd_build(
  recipe_path: &Path,
  platforms: &[String],
  run_dir: &Path,
  heartbeat_interval: Option<Duration>,
  verbose: bool,
  output: OutputFormat,
) -> Result<()> {
  let recipe = Recipe::load(recipe_path).with_context(|| format!("Failed to load {}", recipe_path.display()))?;

  let filter = parse_platforms(platforms)?;
  let selected = recipe.select_platforms(&filter);
  if selected.is_empty() {
    anyhow::bail!("none of the requested platforms are built by {}", recipe.name);
  }
  for platform in &filter {
    if !selected.contains(platform) {
      print_warning(&format!("{} is not built by {}, skipping", platform, recipe.name));
    }
  }

  debug!(recipe = %recipe_path.display(), platforms = ?selected, "selected platforms");

  let mut ctx = RunContext::new(prepare_run_dir(run_dir)?, RunConfig::from_env());
  ctx.verbose = verbose;
  if let Some(interval) = heartbeat_interval {
    ctx.heartbeat_interval = interval;
  }

  if !output.is_json() {
    print_info(&format!(
      "Building {} v{} for {} platform(s)",
      recipe.name,
      recipe.version,
      selected.len()
    ));
  }

  let start = Instant::now();
  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let hashes = rt
    .block_on(async {
      let request = BuildRequest::from_recipe(&recipe, selected).await?;
      autobuild(&ctx, &request, &LocalRunner::new()).await
    })
    .context("Build failed")?;
  let elapsed = start.elapsed();

  if output.is_json() {
    print_json(&serde_json::json!({
      "name": recipe.name,
      "version": recipe.version,
      "products_dir": ctx.products_dir(),
      "products": hashes,
    }))?;
  } else {
    print_success(&format!("Built {} v{} in {}", recipe.name, recipe.version, format_duration(elapsed)));
    print_products(&hashes);
    print_stat("Products", &ctx.products_dir().display().to_string());
  }

  Ok(())
}

pub(crate) fn parse_platforms(triplets: &[String]) -> Result<Vec<Platform>> {
  triplets
    .iter()
    .map(|t| t.parse::<Platform>().map_err(anyhow::Error::from))
    .collect()
}

/// The run directory as an absolute path, so `file://` prefixes in the
/// manifest script resolve from anywhere.
pub(crate) fn prepare_run_dir(run_dir: &Path) -> Result<PathBuf> {
  std::fs::create_dir_all(run_dir).with_context(|| format!("Failed to create {}", run_dir.display()))?;
  dunce::canonicalize(run_dir).with_context(|| format!("Failed to resolve {}", run_dir.display()))
}

pub(crate) fn print_products(hashes: &ProductHashMap) {
  for (platform, entry) in hashes {
    print_stat(
      &platform.triplet(),
      &format!("{} ({})", entry.filename, truncate_hash(&entry.hash.0)),
    );
  }
}

//! Manifest command implementation.
//!
//! Recreates the manifest script for an already published release, using the
//! repository and tag from the environment.

use std::path::Path;

use anyhow::{Context, Result};

use autobuild_lib::autobuild::{BuildRequest, RunContext, reconstruct_manifest};
use autobuild_lib::config::RunConfig;
use autobuild_lib::consts::MANIFEST_SCRIPT_NAME;
use autobuild_lib::recipe::Recipe;
use autobuild_lib::release::GithubReleases;

use super::build::{prepare_run_dir, print_products};
use crate::output::{OutputFormat, print_json, print_stat, print_success, print_warning};

pub fn cmd_manifest(recipe_path: &Path, run_dir: &Path, verbose: bool, output: OutputFormat) -> Result<()> {
  let config = RunConfig::from_env();
  // Fail before touching the recipe or the network.
  let target = config.release_target()?;

  let recipe = Recipe::load(recipe_path).with_context(|| format!("Failed to load {}", recipe_path.display()))?;
  let mut ctx = RunContext::new(prepare_run_dir(run_dir)?, config);
  ctx.verbose = verbose;

  // Nothing is staged, so dependency descriptors are never loaded.
  let request = BuildRequest::without_dependencies(&recipe, recipe.platforms.clone());

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let hashes = rt
    .block_on(async {
      let client = GithubReleases::new()?;
      reconstruct_manifest(&ctx, &request, &client).await
    })
    .context("Manifest reconstruction failed")?;

  let script = ctx.products_dir().join(MANIFEST_SCRIPT_NAME);
  if output.is_json() {
    print_json(&serde_json::json!({
      "repository": target.repository,
      "tag": target.tag,
      "manifest": script,
      "products": hashes,
    }))?;
    return Ok(());
  }

  if hashes.is_empty() {
    print_warning(&format!("Release {} of {} has no platform tarballs", target.tag, target.repository));
  }
  print_success(&format!("Wrote {}", script.display()));
  print_stat("Release", &target.download_base());
  print_products(&hashes);
  Ok(())
}

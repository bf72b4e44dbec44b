//! Reconstructing a manifest from published tarballs.

use tempfile::TempDir;

use autobuild_lib::autobuild::{BuildRequest, RunContext, reconstruct_manifest};
use autobuild_lib::config::RunConfig;
use autobuild_lib::recipe::Recipe;
use autobuild_lib::release::reconstruct;

use super::common::{DirectoryRelease, build_recipe, write_zlib_recipe};

fn release_config() -> RunConfig {
  RunConfig {
    ci: false,
    repository: Some("org/Zlib_jll".to_string()),
    tag: Some("Zlib-v1.2.11".to_string()),
  }
}

#[tokio::test]
async fn reconstruction_matches_the_build() {
  let temp = TempDir::new().unwrap();
  let recipe = write_zlib_recipe(&temp.path().join("zlib"));
  let run_dir = temp.path().join("run");
  let built = build_recipe(&recipe, &run_dir).await;

  let release = DirectoryRelease {
    dir: run_dir.join("products"),
  };
  let target = release_config().release_target().unwrap();
  let reconstructed = reconstruct(&release, &target).await.unwrap();

  assert_eq!(reconstructed, built);
}

#[tokio::test]
async fn reconstructed_manifest_points_at_the_release() {
  let temp = TempDir::new().unwrap();
  let recipe_path = write_zlib_recipe(&temp.path().join("zlib"));
  let built = build_recipe(&recipe_path, &temp.path().join("run")).await;

  let recipe = Recipe::load(&recipe_path).unwrap();
  let request = BuildRequest::from_recipe(&recipe, recipe.platforms.clone()).await.unwrap();
  let out_dir = temp.path().join("manifest-run");
  let ctx = RunContext::new(&out_dir, release_config());
  let release = DirectoryRelease {
    dir: temp.path().join("run/products"),
  };

  let hashes = reconstruct_manifest(&ctx, &request, &release).await.unwrap();
  assert_eq!(hashes, built);

  let script = std::fs::read_to_string(out_dir.join("products/build.lua")).unwrap();
  assert!(script.contains("https://github.com/org/Zlib_jll/releases/download/Zlib-v1.2.11"));
  for (_, entry) in &built {
    assert!(script.contains(&entry.hash.0));
    assert!(script.contains(&entry.filename));
  }
}

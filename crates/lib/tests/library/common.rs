//! Shared helpers for library integration tests.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use autobuild_lib::autobuild::{BuildRequest, RunContext, autobuild};
use autobuild_lib::config::RunConfig;
use autobuild_lib::manifest::ProductHashMap;
use autobuild_lib::recipe::Recipe;
use autobuild_lib::release::{ReleaseAsset, ReleaseClient, ReleaseError};
use autobuild_lib::sandbox::LocalRunner;

/// Packages a static library and a header copied from `zsrc/`.
pub const ZLIB_RECIPE: &str = r#"
return {
  name = "Zlib",
  version = "1.2.11",
  sources = { recipe_dir .. "/zsrc" },
  script = [[
    mkdir -p "$prefix/lib" "$prefix/include"
    cp "$srcdir/libz.so" "$prefix/lib/"
    cp "$srcdir/zlib.h" "$prefix/include/"
  ]],
  products = {
    { kind = "library", name = "libz" },
  },
  platforms = { "x86_64-linux-gnu", "aarch64-linux-gnu" },
}
"#;

/// Write `ZLIB_RECIPE` and its sources into `dir`.
pub fn write_zlib_recipe(dir: &Path) -> PathBuf {
  std::fs::create_dir_all(dir.join("zsrc")).unwrap();
  std::fs::write(dir.join("zsrc/libz.so"), "zlib elf").unwrap();
  std::fs::write(dir.join("zsrc/zlib.h"), "#define ZLIB_VERSION \"1.2.11\"\n").unwrap();
  write_recipe(dir, ZLIB_RECIPE)
}

pub fn write_recipe(dir: &Path, content: &str) -> PathBuf {
  std::fs::create_dir_all(dir).unwrap();
  let path = dir.join("build_tarballs.lua");
  std::fs::write(&path, content).unwrap();
  path
}

/// Build every platform of the recipe at `recipe_path` into `run_dir`.
pub async fn build_recipe(recipe_path: &Path, run_dir: &Path) -> ProductHashMap {
  let recipe = Recipe::load(recipe_path).unwrap();
  let request = BuildRequest::from_recipe(&recipe, recipe.platforms.clone()).await.unwrap();
  let ctx = RunContext::new(run_dir, RunConfig::default());
  autobuild(&ctx, &request, &LocalRunner::new()).await.unwrap()
}

/// A release whose assets are the files of a local directory.
pub struct DirectoryRelease {
  pub dir: PathBuf,
}

#[async_trait]
impl ReleaseClient for DirectoryRelease {
  async fn list_assets(&self, _repository: &str, _tag: &str) -> Result<Vec<ReleaseAsset>, ReleaseError> {
    let mut names: Vec<String> = std::fs::read_dir(&self.dir)
      .unwrap()
      .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
      .collect();
    names.sort();
    Ok(
      names
        .into_iter()
        .map(|name| ReleaseAsset {
          url: self.dir.join(&name).display().to_string(),
          name,
        })
        .collect(),
    )
  }

  async fn download(&self, url: &str, dest: &Path) -> Result<(), ReleaseError> {
    std::fs::copy(url, dest).unwrap();
    Ok(())
  }
}

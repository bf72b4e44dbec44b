//! Building with dependencies and checking what ends up in the tarballs.

use std::path::PathBuf;

use tempfile::TempDir;

use autobuild_lib::autobuild::{BuildRequest, RunContext, autobuild};
use autobuild_lib::config::RunConfig;
use autobuild_lib::error::AutobuildError;
use autobuild_lib::package::unpack;
use autobuild_lib::platform::Platform;
use autobuild_lib::platform::arch::Arch;
use autobuild_lib::platform::os::Libc;
use autobuild_lib::recipe::Recipe;
use autobuild_lib::sandbox::LocalRunner;

use super::common::{build_recipe, write_recipe, write_zlib_recipe};

fn linux64() -> Platform {
  Platform::linux(Arch::X86_64, Libc::Glibc)
}

/// Depends on the manifest script Zlib's build wrote, and fails unless the
/// dependency is installed while it runs.
fn png_recipe(zlib_manifest: &std::path::Path) -> String {
  format!(
    r#"
return {{
  name = "Libpng",
  version = "1.6.37",
  script = [[
    test -f "$prefix/lib/libz.so" || exit 7
    test -f "$prefix/include/zlib.h" || exit 8
    mkdir -p "$prefix/lib"
    echo png > "$prefix/lib/libpng.so"
  ]],
  products = {{
    {{ kind = "library", name = "libpng" }},
  }},
  dependencies = {{ "{}" }},
  platforms = {{ "x86_64-linux-gnu" }},
}}
"#,
    zlib_manifest.display()
  )
}

#[tokio::test]
async fn dependencies_are_installed_for_the_build_but_not_packaged() {
  let temp = TempDir::new().unwrap();
  let zlib_run = temp.path().join("zlib-run");
  let zlib_hashes = build_recipe(&write_zlib_recipe(&temp.path().join("zlib")), &zlib_run).await;
  assert_eq!(zlib_hashes.len(), 2);

  let zlib_manifest = zlib_run.join("products/build.lua");
  let png_path = write_recipe(&temp.path().join("png"), &png_recipe(&zlib_manifest));
  let png_run = temp.path().join("png-run");
  let png_hashes = build_recipe(&png_path, &png_run).await;

  let entry = png_hashes.get(&linux64()).unwrap();
  assert_eq!(entry.filename, "Libpng.v1.6.37.x86_64-linux-gnu.tar.gz");

  let check = temp.path().join("check");
  let mut files = unpack(&png_run.join("products").join(&entry.filename), &check).unwrap();
  files.sort();
  assert_eq!(files, vec![PathBuf::from("lib/libpng.so")]);
  assert!(!check.join("include").exists());
  assert!(!check.join("manifests").exists());
  assert!(!check.join("downloads").exists());
}

#[tokio::test]
async fn rebuilding_gives_identical_hashes() {
  let temp = TempDir::new().unwrap();
  let recipe = write_zlib_recipe(&temp.path().join("zlib"));

  let first = build_recipe(&recipe, &temp.path().join("run-1")).await;
  let second = build_recipe(&recipe, &temp.path().join("run-2")).await;

  assert_eq!(first, second);
}

#[tokio::test]
async fn missing_product_fails_the_platform() {
  let temp = TempDir::new().unwrap();
  let path = write_recipe(
    temp.path(),
    r#"
return {
  name = "Empty",
  version = "0.1",
  script = "true",
  products = { { kind = "executable", name = "empty" } },
  platforms = { "x86_64-linux-gnu" },
}
"#,
  );
  let recipe = Recipe::load(&path).unwrap();
  let request = BuildRequest::from_recipe(&recipe, recipe.platforms.clone()).await.unwrap();
  let run_dir = temp.path().join("run");
  let ctx = RunContext::new(&run_dir, RunConfig::default());

  let result = autobuild(&ctx, &request, &LocalRunner::new()).await;

  assert!(matches!(result, Err(AutobuildError::BuildFailure { platform }) if platform == linux64()));
  assert!(!run_dir.join("products/build.lua").exists());
  assert!(run_dir.join("build/x86_64-linux-gnu").is_dir(), "failed workspace is kept");
}

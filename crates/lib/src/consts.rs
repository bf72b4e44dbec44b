//! Names and fixed values shared across the crate.

use std::time::Duration;

pub const APP_NAME: &str = "autobuild";

/// Default recipe file name looked up by the CLI.
pub const RECIPE_FILENAME: &str = "build_tarballs.lua";

/// Manifest script emitted next to the built tarballs.
pub const MANIFEST_SCRIPT_NAME: &str = "build.lua";

/// Release asset names that are manifest scripts rather than platform tarballs.
/// `build.jl` is what older tooling published alongside its tarballs.
pub const MANIFEST_SCRIPT_ASSETS: &[&str] = &[MANIFEST_SCRIPT_NAME, "build.jl"];

/// Archive extension for packaged artifacts.
pub const TARBALL_EXTENSION: &str = "tar.gz";

/// Subdirectories of a run directory.
pub const DOWNLOADS_DIR: &str = "downloads";
pub const BUILD_DIR: &str = "build";
pub const PRODUCTS_DIR: &str = "products";

/// Subdirectory of a prefix holding dependency file manifests.
pub const MANIFESTS_DIR: &str = "manifests";

/// Interval between CI heartbeat markers.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(4);

//! Rendering the product hash map as a Lua manifest script.
//!
//! The script is itself a dependency descriptor: a downstream package lists it
//! in its `dependencies` and the artifact for the platform being built is
//! installed from `download_info`.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use tracing::info;

use super::ProductHashMap;
use crate::consts::{APP_NAME, MANIFEST_SCRIPT_NAME};
use crate::product::{Product, ProductKind};

/// Inputs for a manifest script.
#[derive(Debug, Clone, Copy)]
pub struct ManifestScript<'a> {
  pub name: &'a str,
  pub version: &'a str,
  pub products: &'a [Product],
  /// URL prefix each artifact file name is appended to.
  pub bin_prefix: &'a str,
  pub hashes: &'a ProductHashMap,
}

impl ManifestScript<'_> {
  pub fn render(&self) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "-- Generated by {} for {} v{}", APP_NAME, self.name, self.version);
    let _ = writeln!(out, "name = {}", lua_string(self.name));
    let _ = writeln!(out, "version = {}", lua_string(self.version));
    out.push('\n');

    out.push_str("products = {\n");
    for product in self.products {
      let _ = writeln!(
        out,
        "  {{ kind = {}, name = {}, variable = {} }},",
        lua_string(kind_name(product.kind)),
        lua_string(&product.name),
        lua_string(&product.variable)
      );
    }
    out.push_str("}\n\n");

    let _ = writeln!(out, "local bin_prefix = {}", lua_string(self.bin_prefix.trim_end_matches('/')));
    out.push('\n');

    out.push_str("download_info = {\n");
    for (platform, entry) in self.hashes {
      let _ = writeln!(
        out,
        "  [{}] = {{ bin_prefix .. \"/\" .. {}, {} }},",
        lua_string(&platform.triplet()),
        lua_string(&entry.filename),
        lua_string(&entry.hash.0)
      );
    }
    out.push_str("}\n\n");

    out.push_str(
      r#"local info = download_info[platform_key()]
if info == nil then
  error(name .. " is not available for " .. platform_key())
end
install(info[1], info[2])
write_manifest(info[1])
"#,
    );
    out
  }

  /// Write the script to `<dir>/build.lua`, replacing any previous one.
  pub fn write(&self, dir: &Path) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(MANIFEST_SCRIPT_NAME);
    std::fs::write(&path, self.render())?;
    info!(path = %path.display(), platforms = self.hashes.len(), "wrote manifest script");
    Ok(path)
  }
}

fn kind_name(kind: ProductKind) -> &'static str {
  match kind {
    ProductKind::Library => "library",
    ProductKind::Executable => "executable",
    ProductKind::File => "file",
  }
}

/// Quote `s` as a Lua string literal.
fn lua_string(s: &str) -> String {
  let mut out = String::with_capacity(s.len() + 2);
  out.push('"');
  for c in s.chars() {
    match c {
      '\\' => out.push_str("\\\\"),
      '"' => out.push_str("\\\""),
      '\n' => out.push_str("\\n"),
      '\r' => out.push_str("\\r"),
      '\0' => out.push_str("\\0"),
      c => out.push(c),
    }
  }
  out.push('"');
  out
}

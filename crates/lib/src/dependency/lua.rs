//! Restricted evaluation of dependency descriptors.
//!
//! A descriptor is a Lua script that declares a global `download_info` table
//! mapping platform triplets to `{ url, sha256 }` and then asks for its own
//! artifact to be installed:
//!
//! ```lua
//! download_info = {
//!   ["x86_64-linux-gnu"] = { "https://example.com/zlib.v1.2.11.x86_64-linux-gnu.tar.gz", "3c4e..." },
//! }
//! local url, hash = table.unpack(download_info[platform_key()])
//! install(url, hash)
//! write_manifest(url)
//! ```
//!
//! The script runs with only the `table`, `string` and `math` standard
//! libraries, so it cannot touch the filesystem or spawn processes. The
//! capabilities it needs are injected as globals:
//!
//! - `platform_key()` - the platform being built, pinned by the caller
//! - `prefix` - the prefix path the dependency is staged into
//! - `install(url, hash)` - request the artifact be installed
//! - `write_manifest(url)` - request the installed file list be recorded
//!
//! In [`InstallMode::Shadow`] both requests are dropped, which lets the
//! descriptor compute its per-platform URL and hash without installing anything.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::Path;
use std::rc::Rc;

use mlua::prelude::*;
use mlua::{LuaOptions, StdLib};

use crate::platform::Platform;

/// Whether `install`/`write_manifest` calls are honoured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallMode {
  /// Record install and manifest requests for the caller to carry out.
  Install,
  /// Replace install and manifest requests with no-ops.
  Shadow,
}

/// A platform's entry in a descriptor's `download_info` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadInfo {
  pub url: String,
  pub hash: String,
}

/// Everything a descriptor declared or requested during evaluation.
#[derive(Debug, Default)]
pub struct Evaluation {
  pub download_info: BTreeMap<String, DownloadInfo>,
  /// `install(url, hash)` calls, in call order. Empty in shadow mode.
  pub installs: Vec<DownloadInfo>,
  /// `write_manifest(url)` calls, in call order. Empty in shadow mode.
  pub manifests: Vec<String>,
}

#[derive(Default)]
struct Requests {
  installs: Vec<DownloadInfo>,
  manifests: Vec<String>,
}

/// Create the restricted Lua state with capabilities for `platform`.
fn create_restricted_runtime(platform: &Platform, prefix: &Path, mode: InstallMode) -> LuaResult<(Lua, Rc<RefCell<Requests>>)> {
  let lua = Lua::new_with(StdLib::TABLE | StdLib::STRING | StdLib::MATH, LuaOptions::default())?;
  let globals = lua.globals();
  // The base library is always present; take away its file loaders.
  for name in ["dofile", "loadfile"] {
    globals.set(name, LuaValue::Nil)?;
  }
  let requests = Rc::new(RefCell::new(Requests::default()));

  let triplet = platform.triplet();
  globals.set(
    "platform_key",
    lua.create_function(move |_, ()| Ok(triplet.clone()))?,
  )?;
  globals.set("prefix", prefix.to_string_lossy().to_string())?;

  let install_requests = requests.clone();
  globals.set(
    "install",
    lua.create_function(move |_, (url, hash): (String, String)| {
      if mode == InstallMode::Install {
        install_requests.borrow_mut().installs.push(DownloadInfo { url, hash });
      }
      Ok(())
    })?,
  )?;

  let manifest_requests = requests.clone();
  globals.set(
    "write_manifest",
    lua.create_function(move |_, url: String| {
      if mode == InstallMode::Install {
        manifest_requests.borrow_mut().manifests.push(url);
      }
      Ok(())
    })?,
  )?;

  drop(globals);
  Ok((lua, requests))
}

/// Evaluate `script` for `platform` and collect its declarations.
pub fn evaluate(name: &str, script: &str, platform: &Platform, prefix: &Path, mode: InstallMode) -> LuaResult<Evaluation> {
  let (lua, requests) = create_restricted_runtime(platform, prefix, mode)?;

  lua.load(script).set_name(format!("@{}", name)).exec()?;

  let download_info = match lua.globals().get::<LuaValue>("download_info")? {
    LuaValue::Table(table) => parse_download_info(&table)?,
    LuaValue::Nil => return Err(LuaError::external("descriptor does not define download_info")),
    _ => return Err(LuaError::external("download_info must be a table")),
  };

  let requests = requests.take();
  Ok(Evaluation {
    download_info,
    installs: requests.installs,
    manifests: requests.manifests,
  })
}

fn parse_download_info(table: &LuaTable) -> LuaResult<BTreeMap<String, DownloadInfo>> {
  let mut info = BTreeMap::new();
  for pair in table.pairs::<String, LuaTable>() {
    let (triplet, entry) = pair?;
    info.insert(triplet.clone(), parse_entry(&triplet, &entry)?);
  }
  Ok(info)
}

/// Entries are either `{ url, hash }` or `{ url = ..., sha256 = ... }`.
fn parse_entry(triplet: &str, entry: &LuaTable) -> LuaResult<DownloadInfo> {
  let url: Option<String> = entry.get("url")?;
  let hash: Option<String> = entry.get("sha256")?;
  let url = match url {
    Some(url) => Some(url),
    None => entry.get(1)?,
  };
  let hash = match hash {
    Some(hash) => Some(hash),
    None => entry.get(2)?,
  };

  match (url, hash) {
    (Some(url), Some(hash)) => Ok(DownloadInfo { url, hash }),
    _ => Err(LuaError::external(format!(
      "download_info['{}'] must provide a url and a sha256",
      triplet
    ))),
  }
}

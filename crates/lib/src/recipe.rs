//! Build recipes.
//!
//! A recipe is a Lua file (`build_tarballs.lua` by default) returning a table
//! that describes one package:
//!
//! ```lua
//! return {
//!   name = "Zlib",
//!   version = "1.2.11",
//!   sources = {
//!     { url = "https://zlib.net/zlib-1.2.11.tar.gz", sha256 = "c3e5e9fd..." },
//!     "./bundled",
//!   },
//!   script = [[
//!     cd zlib-1.2.11
//!     ./configure --prefix="$prefix"
//!     make install
//!   ]],
//!   products = {
//!     { kind = "library", name = "libz" },
//!   },
//!   dependencies = { "deps/build.lua" },
//!   -- Optional, defaults to every supported platform
//!   platforms = { "x86_64-linux-gnu", "aarch64-apple-darwin" },
//! }
//! ```
//!
//! The global `recipe_dir` holds the directory the recipe lives in.

use std::path::{Path, PathBuf};

use mlua::prelude::*;
use thiserror::Error;
use tracing::debug;

use crate::platform::{Platform, supported_platforms};
use crate::product::{Product, ProductKind};
use crate::source::SourceSpec;

#[derive(Debug, Error)]
pub enum RecipeError {
  #[error("cannot read recipe {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to evaluate recipe {path}: {message}")]
  Evaluate { path: PathBuf, message: String },

  #[error("invalid recipe {path}: {message}")]
  Invalid { path: PathBuf, message: String },
}

/// An evaluated recipe.
#[derive(Debug, Clone, PartialEq)]
pub struct Recipe {
  pub name: String,
  pub version: String,
  pub sources: Vec<SourceSpec>,
  pub script: String,
  pub products: Vec<Product>,
  /// Dependency descriptor locations, URLs or paths relative to `dir`.
  pub dependencies: Vec<String>,
  pub platforms: Vec<Platform>,
  /// Directory containing the recipe.
  pub dir: PathBuf,
}

impl Recipe {
  /// Load and evaluate the recipe at `path`.
  pub fn load(path: &Path) -> Result<Self, RecipeError> {
    let canonical_path = dunce::canonicalize(path).map_err(|source| RecipeError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    let content = std::fs::read_to_string(&canonical_path).map_err(|source| RecipeError::Read {
      path: canonical_path.clone(),
      source,
    })?;
    let dir = canonical_path.parent().unwrap_or(Path::new("")).to_path_buf();
    Self::parse(&content, &canonical_path, &dir)
  }

  /// Evaluate recipe source text. `path` names the chunk in error messages and
  /// relative sources resolve against `dir`.
  pub fn parse(content: &str, path: &Path, dir: &Path) -> Result<Self, RecipeError> {
    let invalid = |message: String| RecipeError::Invalid {
      path: path.to_path_buf(),
      message,
    };
    let lua_err = |e: LuaError| RecipeError::Evaluate {
      path: path.to_path_buf(),
      message: e.to_string(),
    };

    let lua = Lua::new();
    lua
      .globals()
      .set("recipe_dir", dir.to_string_lossy().to_string())
      .map_err(lua_err)?;

    let result = lua
      .load(content)
      .set_name(format!("@{}", path.display()))
      .eval::<LuaValue>()
      .map_err(lua_err)?;
    let LuaValue::Table(table) = result else {
      return Err(invalid("recipe must return a table".to_string()));
    };

    let name = required_string(&table, "name").map_err(lua_err)?.ok_or_else(|| invalid("missing 'name'".to_string()))?;
    let version = required_string(&table, "version")
      .map_err(lua_err)?
      .ok_or_else(|| invalid("missing 'version'".to_string()))?;
    let script = required_string(&table, "script")
      .map_err(lua_err)?
      .ok_or_else(|| invalid("missing 'script'".to_string()))?;

    let sources = match table.get::<LuaValue>("sources").map_err(lua_err)? {
      LuaValue::Nil => Vec::new(),
      LuaValue::Table(t) => parse_sources(&t, dir).map_err(lua_err)?.map_err(invalid)?,
      _ => return Err(invalid("'sources' must be a list".to_string())),
    };

    let products = match table.get::<LuaValue>("products").map_err(lua_err)? {
      LuaValue::Nil => Vec::new(),
      LuaValue::Table(t) => parse_products(&t).map_err(lua_err)?.map_err(invalid)?,
      _ => return Err(invalid("'products' must be a list".to_string())),
    };

    let dependencies = string_list(&table, "dependencies").map_err(lua_err)?;

    let platforms = if table.contains_key("platforms").map_err(lua_err)? {
      let mut platforms = Vec::new();
      for triplet in string_list(&table, "platforms").map_err(lua_err)? {
        let platform = Platform::parse(&triplet).ok_or_else(|| invalid(format!("unknown platform '{}'", triplet)))?;
        if !platforms.contains(&platform) {
          platforms.push(platform);
        }
      }
      platforms
    } else {
      supported_platforms()
    };

    debug!(
      name = %name,
      version = %version,
      sources = sources.len(),
      products = products.len(),
      platforms = platforms.len(),
      "loaded recipe"
    );

    Ok(Self {
      name,
      version,
      sources,
      script,
      products,
      dependencies,
      platforms,
      dir: dir.to_path_buf(),
    })
  }

  /// Base name of this package's artifacts: `<name>.v<version>`.
  pub fn artifact_base(&self) -> String {
    format!("{}.v{}", self.name, self.version)
  }

  /// The recipe's platforms restricted to `filter`, in recipe order. An empty
  /// filter selects every platform.
  pub fn select_platforms(&self, filter: &[Platform]) -> Vec<Platform> {
    if filter.is_empty() {
      return self.platforms.clone();
    }
    self.platforms.iter().copied().filter(|p| filter.contains(p)).collect()
  }
}

fn required_string(table: &LuaTable, key: &str) -> LuaResult<Option<String>> {
  let value: Option<String> = table.get(key)?;
  Ok(value.filter(|s| !s.trim().is_empty()))
}

fn string_list(table: &LuaTable, key: &str) -> LuaResult<Vec<String>> {
  match table.get::<LuaValue>(key)? {
    LuaValue::Nil => Ok(Vec::new()),
    LuaValue::Table(list) => list.sequence_values::<String>().collect(),
    _ => Err(LuaError::external(format!("'{}' must be a list of strings", key))),
  }
}

/// Sources are either a location string or `{ url = ..., sha256 = ... }`.
///
/// The outer result carries Lua errors, the inner one shape errors.
fn parse_sources(list: &LuaTable, dir: &Path) -> LuaResult<Result<Vec<SourceSpec>, String>> {
  let mut sources = Vec::new();
  for (index, value) in list.sequence_values::<LuaValue>().enumerate() {
    let spec = match value? {
      LuaValue::String(location) => SourceSpec::classify(&location.to_str()?, None, dir),
      LuaValue::Table(entry) => {
        let url: Option<String> = entry.get("url")?;
        let hash: Option<String> = entry.get("sha256")?;
        match url {
          Some(url) => SourceSpec::classify(&url, hash.as_deref(), dir),
          None => Err(format!("source {} has no url", index + 1)),
        }
      }
      _ => Err(format!("source {} must be a string or a table", index + 1)),
    };
    match spec {
      Ok(spec) => sources.push(spec),
      Err(message) => return Ok(Err(message)),
    }
  }
  Ok(Ok(sources))
}

/// Products are `{ kind = "library" | "executable" | "file", name = ..., variable = ... }`.
/// `variable` defaults to `name`.
fn parse_products(list: &LuaTable) -> LuaResult<Result<Vec<Product>, String>> {
  let mut products = Vec::new();
  for entry in list.sequence_values::<LuaTable>() {
    let entry = entry?;
    let kind: String = entry.get::<Option<String>>("kind")?.unwrap_or_default();
    let kind = match kind.as_str() {
      "library" => ProductKind::Library,
      "executable" => ProductKind::Executable,
      "file" => ProductKind::File,
      other => return Ok(Err(format!("unknown product kind '{}'", other))),
    };
    let Some(name) = entry.get::<Option<String>>("name")? else {
      return Ok(Err("product without a name".to_string()));
    };
    let variable = entry.get::<Option<String>>("variable")?.unwrap_or_else(|| name.clone());
    products.push(Product::new(kind, name, variable));
  }
  Ok(Ok(products))
}

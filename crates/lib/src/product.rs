//! Declared build outputs.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::platform::Platform;
use crate::platform::os::Os;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductKind {
  /// A shared library, e.g. `libz` for `lib/libz.so`.
  Library,
  /// A program in `bin/`.
  Executable,
  /// Any file, named by its path relative to the prefix.
  File,
}

/// An output the build script must produce.
///
/// `variable` is the name downstream scripts use to refer to the product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
  pub kind: ProductKind,
  pub name: String,
  pub variable: String,
}

impl Product {
  pub fn new(kind: ProductKind, name: impl Into<String>, variable: impl Into<String>) -> Self {
    Self {
      kind,
      name: name.into(),
      variable: variable.into(),
    }
  }

  /// Candidate locations for this product under `prefix` on `platform`.
  pub fn candidates(&self, prefix: &Path, platform: &Platform) -> Vec<PathBuf> {
    match self.kind {
      ProductKind::Library => match platform.os {
        Os::MacOs => vec![prefix.join("lib").join(format!("{}.dylib", self.name))],
        Os::Windows => vec![prefix.join("bin").join(format!("{}.dll", self.name))],
        Os::Linux | Os::FreeBsd => vec![
          prefix.join("lib").join(format!("{}.so", self.name)),
          prefix.join("lib64").join(format!("{}.so", self.name)),
        ],
      },
      ProductKind::Executable => {
        let file = if platform.os == Os::Windows {
          format!("{}.exe", self.name)
        } else {
          self.name.clone()
        };
        vec![prefix.join("bin").join(file)]
      }
      ProductKind::File => vec![prefix.join(&self.name)],
    }
  }

  /// The first candidate that exists, if any.
  pub fn locate(&self, prefix: &Path, platform: &Platform) -> Option<PathBuf> {
    self.candidates(prefix, platform).into_iter().find(|p| p.exists())
  }
}

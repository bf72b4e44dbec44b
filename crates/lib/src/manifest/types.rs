//! The product hash map.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use serde::{Deserialize, Serialize};

use crate::platform::Platform;
use crate::util::hash::ContentHash;

/// One platform's artifact: its file name and the SHA-256 of its bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductEntry {
  pub filename: String,
  pub hash: ContentHash,
}

/// Platform → artifact mapping produced by a build or rebuilt from a release.
///
/// Ordered by platform so it renders and serializes deterministically.
///
/// ```json
/// {
///   "aarch64-apple-darwin": { "filename": "Zlib.v1.2.11.aarch64-apple-darwin.tar.gz", "hash": "9f2c..." },
///   "x86_64-linux-gnu": { "filename": "Zlib.v1.2.11.x86_64-linux-gnu.tar.gz", "hash": "3c4e..." }
/// }
/// ```
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductHashMap {
  entries: BTreeMap<Platform, ProductEntry>,
}

impl ProductHashMap {
  pub fn new() -> Self {
    Self::default()
  }

  /// Record `entry` for `platform` unless the platform already has one.
  /// Returns whether the entry was recorded.
  pub fn insert_new(&mut self, platform: Platform, entry: ProductEntry) -> bool {
    match self.entries.entry(platform) {
      Entry::Vacant(slot) => {
        slot.insert(entry);
        true
      }
      Entry::Occupied(_) => false,
    }
  }

  /// Record `entry` for `platform`, returning the entry it replaced.
  pub fn insert(&mut self, platform: Platform, entry: ProductEntry) -> Option<ProductEntry> {
    self.entries.insert(platform, entry)
  }

  pub fn get(&self, platform: &Platform) -> Option<&ProductEntry> {
    self.entries.get(platform)
  }

  pub fn contains(&self, platform: &Platform) -> bool {
    self.entries.contains_key(platform)
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = (&Platform, &ProductEntry)> {
    self.entries.iter()
  }
}

impl<'a> IntoIterator for &'a ProductHashMap {
  type Item = (&'a Platform, &'a ProductEntry);
  type IntoIter = std::collections::btree_map::Iter<'a, Platform, ProductEntry>;

  fn into_iter(self) -> Self::IntoIter {
    self.entries.iter()
  }
}

//! Target platform identifiers.
//!
//! A [`Platform`] is treated as an opaque triplet by the build pipeline: it keys
//! the product hash map and names directories and artifacts. This module owns
//! the mapping between triplet strings and the known architecture/OS/libc
//! combinations.

pub mod arch;
pub mod os;
pub mod paths;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::TARBALL_EXTENSION;
use arch::Arch;
use os::{Libc, Os};

/// A build target such as `x86_64-linux-gnu` or `aarch64-apple-darwin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Platform {
  pub arch: Arch,
  pub os: Os,
  /// Only meaningful on Linux.
  pub libc: Option<Libc>,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown platform triplet: {0}")]
pub struct UnknownPlatform(pub String);

impl Platform {
  pub fn linux(arch: Arch, libc: Libc) -> Self {
    Self {
      arch,
      os: Os::Linux,
      libc: Some(libc),
    }
  }

  pub fn new(arch: Arch, os: Os) -> Self {
    let libc = (os == Os::Linux).then_some(Libc::Glibc);
    Self { arch, os, libc }
  }

  /// Detect the current platform at runtime
  ///
  /// Returns `None` if the OS or architecture is not supported
  pub fn current() -> Option<Self> {
    let os = Os::current()?;
    let platform = Self {
      arch: Arch::current()?,
      os,
      libc: (os == Os::Linux).then(Libc::current),
    };
    supported_platforms().contains(&platform).then_some(platform)
  }

  /// Returns the triplet string (e.g., "x86_64-linux-gnu")
  pub fn triplet(&self) -> String {
    match (self.os, self.libc) {
      (Os::Linux, libc) => {
        let abi = libc.unwrap_or(Libc::Glibc).as_str();
        if self.arch == Arch::Armv7l {
          format!("{}-linux-{}eabihf", self.arch, abi)
        } else {
          format!("{}-linux-{}", self.arch, abi)
        }
      }
      (os, _) => format!("{}-{}", self.arch, os),
    }
  }

  /// Parse a triplet into a known platform.
  ///
  /// Version suffixes on darwin and freebsd triplets (`x86_64-apple-darwin14`)
  /// are ignored.
  pub fn parse(triplet: &str) -> Option<Self> {
    let normalized = triplet.trim().trim_end_matches(|c: char| c.is_ascii_digit() || c == '.');
    let normalized = if normalized.ends_with("darwin") || normalized.ends_with("freebsd") {
      normalized
    } else {
      triplet.trim()
    };
    supported_platforms().into_iter().find(|p| p.triplet() == normalized)
  }
}

impl fmt::Display for Platform {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.triplet())
  }
}

impl FromStr for Platform {
  type Err = UnknownPlatform;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::parse(s).ok_or_else(|| UnknownPlatform(s.to_string()))
  }
}

impl TryFrom<String> for Platform {
  type Error = UnknownPlatform;

  fn try_from(value: String) -> Result<Self, Self::Error> {
    value.parse()
  }
}

impl From<Platform> for String {
  fn from(platform: Platform) -> Self {
    platform.triplet()
  }
}

/// Every platform autobuild knows how to name, in a stable order.
pub fn supported_platforms() -> Vec<Platform> {
  let mut platforms = Vec::new();
  for libc in [Libc::Glibc, Libc::Musl] {
    for arch in Arch::ALL {
      platforms.push(Platform::linux(arch, libc));
    }
  }
  platforms.push(Platform::new(Arch::X86_64, Os::MacOs));
  platforms.push(Platform::new(Arch::Aarch64, Os::MacOs));
  platforms.push(Platform::new(Arch::I686, Os::Windows));
  platforms.push(Platform::new(Arch::X86_64, Os::Windows));
  platforms.push(Platform::new(Arch::X86_64, Os::FreeBsd));
  platforms
}

/// File name of the tarball for `base_name` built for `platform`:
/// `<base_name>.<triplet>.tar.gz`.
pub fn artifact_filename(base_name: &str, platform: &Platform) -> String {
  format!("{}.{}.{}", base_name, platform.triplet(), TARBALL_EXTENSION)
}

/// Recover the platform from an artifact file name produced by
/// [`artifact_filename`]. Returns `None` when the name does not end in a known
/// triplet followed by `.tar.gz`.
pub fn platform_from_artifact(filename: &str) -> Option<Platform> {
  let stem = filename.strip_suffix(&format!(".{}", TARBALL_EXTENSION))?;
  let (_, triplet) = stem.rsplit_once('.')?;
  Platform::parse(triplet)
}

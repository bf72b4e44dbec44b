use std::fmt;

/// Operating system variants that can appear in a platform triplet
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Os {
  Linux,
  MacOs,
  Windows,
  FreeBsd,
}

impl Os {
  /// Detect the current operating system at runtime
  pub fn current() -> Option<Self> {
    match std::env::consts::OS {
      "linux" => Some(Self::Linux),
      "macos" => Some(Self::MacOs),
      "windows" => Some(Self::Windows),
      "freebsd" => Some(Self::FreeBsd),
      _ => None,
    }
  }

  /// Returns the vendor-os part of a triplet for this OS
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Linux => "linux",
      Self::MacOs => "apple-darwin",
      Self::Windows => "w64-mingw32",
      Self::FreeBsd => "unknown-freebsd",
    }
  }
}

impl fmt::Display for Os {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

/// C library a Linux triplet links against
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Libc {
  Glibc,
  Musl,
}

impl Libc {
  /// Detect the C library this binary was built against
  pub fn current() -> Self {
    if cfg!(target_env = "musl") { Self::Musl } else { Self::Glibc }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Glibc => "gnu",
      Self::Musl => "musl",
    }
  }
}

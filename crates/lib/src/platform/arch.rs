use std::fmt;

/// CPU architecture variants that can appear in a platform triplet
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Arch {
  I686,
  X86_64,
  Aarch64,
  Armv7l,
  Powerpc64le,
}

impl Arch {
  pub const ALL: [Arch; 5] = [Self::I686, Self::X86_64, Self::Aarch64, Self::Armv7l, Self::Powerpc64le];

  /// Detect the current CPU architecture at runtime
  pub fn current() -> Option<Self> {
    match std::env::consts::ARCH {
      "x86" => Some(Self::I686),
      "x86_64" => Some(Self::X86_64),
      "aarch64" => Some(Self::Aarch64),
      "arm" => Some(Self::Armv7l),
      "powerpc64" => Some(Self::Powerpc64le),
      _ => None,
    }
  }

  /// Returns the lowercase string identifier for this architecture
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::I686 => "i686",
      Self::X86_64 => "x86_64",
      Self::Aarch64 => "aarch64",
      Self::Armv7l => "armv7l",
      Self::Powerpc64le => "powerpc64le",
    }
  }
}

impl fmt::Display for Arch {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

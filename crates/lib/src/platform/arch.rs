use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// CPU architectures a build can target.
///
/// Each architecture has one canonical name and a set of accepted aliases;
/// [`Arch::parse`] normalizes aliases so table lookups only ever see the
/// canonical form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
  X86,
  X64,
  Armv6,
  Armv7,
  Armv8,
  Mips,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown architecture: {0}")]
pub struct UnknownArch(pub String);

impl Arch {
  pub const ALL: [Arch; 6] = [Self::X86, Self::X64, Self::Armv6, Self::Armv7, Self::Armv8, Self::Mips];

  /// Detect the current CPU architecture at runtime
  pub fn current() -> Option<Self> {
    Self::parse(std::env::consts::ARCH).ok()
  }

  /// Parse a canonical name or alias, case-insensitively.
  pub fn parse(name: &str) -> Result<Self, UnknownArch> {
    let lower = name.to_ascii_lowercase();
    Self::ALL
      .into_iter()
      .find(|arch| arch.aliases().contains(&lower.as_str()))
      .ok_or(UnknownArch(name.to_string()))
  }

  /// Returns the canonical lowercase name
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::X86 => "x86",
      Self::X64 => "x64",
      Self::Armv6 => "armv6",
      Self::Armv7 => "armv7",
      Self::Armv8 => "armv8",
      Self::Mips => "mips",
    }
  }

  /// All names this architecture answers to, canonical name first.
  pub fn aliases(&self) -> &'static [&'static str] {
    match self {
      Self::X86 => &["x86", "i386", "i686"],
      Self::X64 => &["x64", "x86_64", "amd64"],
      Self::Armv6 => &["armv6", "arm"],
      Self::Armv7 => &["armv7", "armv7a", "armhf"],
      Self::Armv8 => &["armv8", "aarch64", "arm64"],
      Self::Mips => &["mips"],
    }
  }

  pub fn is_64bit(&self) -> bool {
    matches!(self, Self::X64 | Self::Armv8)
  }
}

impl FromStr for Arch {
  type Err = UnknownArch;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::parse(s)
  }
}

impl fmt::Display for Arch {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

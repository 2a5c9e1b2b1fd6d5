use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Operating system families, used both as host families and as targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Os {
  Linux,
  MacOs,
  Windows,
  FreeBsd,
  OpenBsd,
  Android,
  Ios,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown operating system: {0}")]
pub struct UnknownOs(pub String);

impl Os {
  pub const ALL: [Os; 7] = [
    Self::Linux,
    Self::MacOs,
    Self::Windows,
    Self::FreeBsd,
    Self::OpenBsd,
    Self::Android,
    Self::Ios,
  ];

  /// Detect the current operating system at runtime
  pub fn current() -> Option<Self> {
    match std::env::consts::OS {
      "linux" => Some(Self::Linux),
      "macos" => Some(Self::MacOs),
      "windows" => Some(Self::Windows),
      "freebsd" => Some(Self::FreeBsd),
      "openbsd" => Some(Self::OpenBsd),
      "android" => Some(Self::Android),
      "ios" => Some(Self::Ios),
      _ => None,
    }
  }

  /// Returns the lowercase string identifier for this OS
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Linux => "linux",
      Self::MacOs => "macos",
      Self::Windows => "windows",
      Self::FreeBsd => "freebsd",
      Self::OpenBsd => "openbsd",
      Self::Android => "android",
      Self::Ios => "ios",
    }
  }
}

impl FromStr for Os {
  type Err = UnknownOs;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let lower = s.to_ascii_lowercase();
    match lower.as_str() {
      "darwin" | "osx" => Ok(Self::MacOs),
      "win32" | "win64" => Ok(Self::Windows),
      _ => Self::ALL
        .into_iter()
        .find(|os| os.as_str() == lower)
        .ok_or_else(|| UnknownOs(s.to_string())),
    }
  }
}

impl fmt::Display for Os {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn current_returns_supported_os() {
    assert!(Os::current().is_some(), "Current OS should be supported");
  }

  #[test]
  fn parses_common_spellings() {
    assert_eq!("darwin".parse::<Os>().unwrap(), Os::MacOs);
    assert_eq!("Windows".parse::<Os>().unwrap(), Os::Windows);
    assert!("beos".parse::<Os>().is_err());
  }
}

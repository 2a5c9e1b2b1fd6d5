//! Architectures, operating systems and the running host.

pub mod arch;
pub mod host;
pub mod os;

pub use arch::Arch;
pub use host::{PackageTool, current_host};
pub use os::Os;

/// Platform table key combining target and architecture (e.g. "windows-x64").
pub fn platform_key(target: &str, arch: Arch) -> String {
  format!("{target}-{arch}")
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn platform_key_format() {
    assert_eq!(platform_key("windows", Arch::X64), "windows-x64");
    assert_eq!(platform_key("android", Arch::Armv8), "android-armv8");
  }
}

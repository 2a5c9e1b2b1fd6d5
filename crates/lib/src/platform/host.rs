//! Running-host detection and package tools.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::os::Os;
use crate::data;

/// Location of the distribution identification file on Linux.
pub const OS_RELEASE_PATH: &str = "/etc/os-release";

/// System package managers known to the host tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageTool {
  Apt,
  Yum,
  Apk,
  Zypper,
  Opkg,
  Brew,
  Choco,
  Pkg,
}

impl PackageTool {
  pub const ALL: [PackageTool; 8] = [
    Self::Apt,
    Self::Yum,
    Self::Apk,
    Self::Zypper,
    Self::Opkg,
    Self::Brew,
    Self::Choco,
    Self::Pkg,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Apt => "apt",
      Self::Yum => "yum",
      Self::Apk => "apk",
      Self::Zypper => "zypper",
      Self::Opkg => "opkg",
      Self::Brew => "brew",
      Self::Choco => "choco",
      Self::Pkg => "pkg",
    }
  }
}

impl FromStr for PackageTool {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::ALL
      .into_iter()
      .find(|tool| tool.as_str() == s)
      .ok_or_else(|| format!("unknown package tool: {s}"))
  }
}

impl fmt::Display for PackageTool {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

/// Name of the host this process is running on.
///
/// On Linux this is the distribution from `/etc/os-release` when it is one
/// the host table knows, otherwise the generic `linux` host. Elsewhere it is
/// the OS name.
pub fn current_host() -> String {
  match Os::current() {
    Some(Os::Linux) => {
      let detected = std::fs::read_to_string(OS_RELEASE_PATH)
        .ok()
        .and_then(|content| host_from_os_release(&content));
      debug!(host = ?detected, "detected linux distribution");
      detected.unwrap_or_else(|| Os::Linux.as_str().to_string())
    }
    Some(os) => os.as_str().to_string(),
    None => Os::Linux.as_str().to_string(),
  }
}

/// Map the contents of an os-release file to a known host name.
///
/// `ID` is tried first, then each entry of `ID_LIKE`.
pub fn host_from_os_release(content: &str) -> Option<String> {
  let mut id = None;
  let mut id_like = None;

  for line in content.lines() {
    let Some((key, value)) = line.split_once('=') else {
      continue;
    };
    let value = value.trim().trim_matches('"').trim_matches('\'');
    match key.trim() {
      "ID" => id = Some(value.to_ascii_lowercase()),
      "ID_LIKE" => id_like = Some(value.to_ascii_lowercase()),
      _ => {}
    }
  }

  let candidates = id
    .into_iter()
    .chain(id_like.iter().flat_map(|like| like.split_whitespace().map(str::to_string)));

  candidates
    .map(|candidate| normalize_distro(&candidate).to_string())
    .find(|name| data::host(name).is_some_and(|host| host.os == Os::Linux))
}

fn normalize_distro(id: &str) -> &str {
  match id {
    "rhel" | "rocky" | "almalinux" | "amzn" | "ol" => "centos",
    "opensuse-leap" | "opensuse-tumbleweed" | "sles" | "suse" => "opensuse",
    other => other,
  }
}

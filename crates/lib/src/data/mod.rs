//! Builtin knowledge about hosts, targets, compilers and platforms.
//!
//! The typed tables ([`HOSTS`], [`COMPILERS`]) are what build specifications
//! are validated against. [`builtin_table`] and [`platform_table`] are the
//! configuration each of those entries contributes during resolution, in
//! the same JSON shape as a project descriptor.

use serde_json::{Map, Value, json};

use crate::platform::{Arch, Os, PackageTool, platform_key};

/// Wildcard accepted in a compiler's supported host or target list.
pub const ANY: &str = "*";

/// A host a build can run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostInfo {
  pub name: &'static str,
  pub os: Os,
  pub pkg_tool: Option<PackageTool>,
  /// Package commands need elevated privileges
  pub sudo: bool,
  pub pkg_update: &'static str,
  pub pkg_install: &'static str,
}

/// A compiler family with its known versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompilerInfo {
  pub name: &'static str,
  /// Known versions. `default` is the unversioned system compiler.
  pub versions: &'static [&'static str],
  /// Host names or OS families this compiler runs on.
  pub hosts: &'static [&'static str],
  /// Targets or OS families this compiler produces code for.
  pub targets: &'static [&'static str],
  pub cc: &'static str,
  pub cxx: &'static str,
}

pub const DEFAULT_VERSION: &str = "default";
pub const DEFAULT_COMPILER: &str = "default";

const fn host_entry(
  name: &'static str,
  os: Os,
  pkg_tool: Option<PackageTool>,
  sudo: bool,
  pkg_update: &'static str,
  pkg_install: &'static str,
) -> HostInfo {
  HostInfo {
    name,
    os,
    pkg_tool,
    sudo,
    pkg_update,
    pkg_install,
  }
}

pub static HOSTS: &[HostInfo] = &[
  host_entry("linux", Os::Linux, None, false, "", ""),
  host_entry(
    "ubuntu",
    Os::Linux,
    Some(PackageTool::Apt),
    true,
    "apt-get -qq update",
    "apt-get -qq install -y",
  ),
  host_entry(
    "debian",
    Os::Linux,
    Some(PackageTool::Apt),
    true,
    "apt-get -qq update",
    "apt-get -qq install -y",
  ),
  host_entry(
    "raspbian",
    Os::Linux,
    Some(PackageTool::Apt),
    true,
    "apt-get -qq update",
    "apt-get -qq install -y",
  ),
  host_entry(
    "fedora",
    Os::Linux,
    Some(PackageTool::Yum),
    true,
    "yum -q makecache",
    "yum -q install -y",
  ),
  host_entry(
    "centos",
    Os::Linux,
    Some(PackageTool::Yum),
    true,
    "yum -q makecache",
    "yum -q install -y",
  ),
  host_entry(
    "alpine",
    Os::Linux,
    Some(PackageTool::Apk),
    true,
    "apk update",
    "apk add --no-cache",
  ),
  host_entry(
    "opensuse",
    Os::Linux,
    Some(PackageTool::Zypper),
    true,
    "zypper --non-interactive refresh",
    "zypper --non-interactive install",
  ),
  host_entry(
    "openwrt",
    Os::Linux,
    Some(PackageTool::Opkg),
    false,
    "opkg update",
    "opkg install",
  ),
  host_entry(
    "macos",
    Os::MacOs,
    Some(PackageTool::Brew),
    false,
    "brew update",
    "brew install",
  ),
  host_entry(
    "windows",
    Os::Windows,
    Some(PackageTool::Choco),
    false,
    "",
    "choco install -y",
  ),
  host_entry(
    "freebsd",
    Os::FreeBsd,
    Some(PackageTool::Pkg),
    true,
    "pkg update",
    "pkg install -y",
  ),
  host_entry("openbsd", Os::OpenBsd, None, true, "", "pkg_add"),
];

pub static COMPILERS: &[CompilerInfo] = &[
  CompilerInfo {
    name: DEFAULT_COMPILER,
    versions: &[DEFAULT_VERSION],
    hosts: &[ANY],
    targets: &[ANY],
    cc: "cc",
    cxx: "c++",
  },
  CompilerInfo {
    name: "gcc",
    versions: &[
      DEFAULT_VERSION,
      "5",
      "6",
      "7",
      "8",
      "9",
      "10",
      "11",
      "12",
      "13",
      "14",
    ],
    hosts: &["linux", "freebsd"],
    targets: &["linux", "freebsd"],
    cc: "gcc",
    cxx: "g++",
  },
  CompilerInfo {
    name: "clang",
    versions: &[
      DEFAULT_VERSION,
      "6",
      "7",
      "8",
      "9",
      "10",
      "11",
      "12",
      "13",
      "14",
      "15",
      "16",
      "17",
      "18",
    ],
    hosts: &["linux", "macos", "windows", "freebsd", "openbsd"],
    targets: &["linux", "macos", "windows", "freebsd", "openbsd", "android", "ios"],
    cc: "clang",
    cxx: "clang++",
  },
  CompilerInfo {
    name: "msvc",
    versions: &[DEFAULT_VERSION, "15", "16", "17"],
    hosts: &["windows"],
    targets: &["windows"],
    cc: "cl.exe",
    cxx: "cl.exe",
  },
  CompilerInfo {
    name: "appleclang",
    versions: &[DEFAULT_VERSION],
    hosts: &["macos"],
    targets: &["macos", "ios"],
    cc: "clang",
    cxx: "clang++",
  },
];

pub fn host(name: &str) -> Option<&'static HostInfo> {
  HOSTS.iter().find(|h| h.name == name)
}

pub fn compiler(name: &str) -> Option<&'static CompilerInfo> {
  COMPILERS.iter().find(|c| c.name == name)
}

/// Targets are operating system families.
pub fn target(name: &str) -> Option<Os> {
  Os::ALL.into_iter().find(|os| os.as_str() == name)
}

pub fn host_names() -> impl Iterator<Item = &'static str> {
  HOSTS.iter().map(|h| h.name)
}

pub fn target_names() -> impl Iterator<Item = &'static str> {
  Os::ALL.into_iter().map(|os| os.as_str())
}

pub fn compiler_names() -> impl Iterator<Item = &'static str> {
  COMPILERS.iter().map(|c| c.name)
}

/// Whether `entries` (a compiler's supported list) admits `name` or its family.
pub fn supports(entries: &[&str], name: &str, family: Os) -> bool {
  entries
    .iter()
    .any(|entry| *entry == ANY || *entry == name || *entry == family.as_str())
}

/// The builtin defaults table with its nested sections.
pub fn builtin_table() -> Value {
  json!({
    "variables": {
      "exe_suffix": "",
      "lib_prefix": "lib",
      "static_lib_suffix": ".a",
    },
    "architectures": architectures_section(),
    "hosts": hosts_section(),
    "targets": targets_section(),
    "compilers": compilers_section(),
  })
}

/// The fixed platform table entry for a target and architecture.
pub fn platform_table(target: &str, arch: Arch) -> Option<Value> {
  let key = platform_key(target, arch);
  let table = match key.as_str() {
    "linux-x86" => json!({ "cmake_args": ["-DCMAKE_C_FLAGS=-m32", "-DCMAKE_CXX_FLAGS=-m32"] }),
    "windows-x86" => json!({ "cmake_args": ["-A", "Win32"] }),
    "windows-x64" => json!({ "cmake_args": ["-A", "x64"] }),
    "windows-armv7" => json!({ "cmake_args": ["-A", "ARM"] }),
    "windows-armv8" => json!({ "cmake_args": ["-A", "ARM64"] }),
    "macos-x64" => json!({ "cmake_args": ["-DCMAKE_OSX_ARCHITECTURES=x86_64"] }),
    "macos-armv8" => json!({ "cmake_args": ["-DCMAKE_OSX_ARCHITECTURES=arm64"] }),
    "ios-armv8" => json!({ "cmake_args": ["-DCMAKE_OSX_ARCHITECTURES=arm64"] }),
    "android-x86" => json!({ "cmake_args": ["-DANDROID_ABI=x86"] }),
    "android-x64" => json!({ "cmake_args": ["-DANDROID_ABI=x86_64"] }),
    "android-armv7" => json!({ "cmake_args": ["-DANDROID_ABI=armeabi-v7a"] }),
    "android-armv8" => json!({ "cmake_args": ["-DANDROID_ABI=arm64-v8a"] }),
    _ => return None,
  };
  Some(table)
}

fn architectures_section() -> Value {
  let mut section = Map::new();
  for arch in Arch::ALL {
    let bits = if arch.is_64bit() { "64" } else { "32" };
    section.insert(arch.as_str().to_string(), json!({ "variables": { "bits": bits } }));
  }
  Value::Object(section)
}

fn hosts_section() -> Value {
  let mut section = Map::new();
  for host in HOSTS {
    section.insert(
      host.name.to_string(),
      json!({
        "pkg_tool": host.pkg_tool.map(|tool| tool.as_str()),
        "sudo": host.sudo,
        "pkg_update": host.pkg_update,
        "pkg_install": host.pkg_install,
      }),
    );
  }
  Value::Object(section)
}

fn targets_section() -> Value {
  json!({
    "windows": {
      "variables": { "exe_suffix": ".exe", "lib_prefix": "", "static_lib_suffix": ".lib" },
    },
    "android": {
      "variables": { "android_api": "21" },
      "cmake_args": ["-DCMAKE_SYSTEM_NAME=Android", "-DANDROID_PLATFORM=android-{android_api}"],
    },
    "ios": {
      "cmake_args": ["-DCMAKE_SYSTEM_NAME=iOS"],
    },
  })
}

fn compilers_section() -> Value {
  let mut section = Map::new();
  for compiler in COMPILERS {
    let mut versions = Map::new();
    for version in compiler.versions.iter().filter(|v| **v != DEFAULT_VERSION) {
      versions.insert(version.to_string(), version_table(compiler.name, version));
    }

    let packages: Vec<&str> = match compiler.name {
      "gcc" => vec!["gcc", "g++"],
      "clang" => vec!["clang"],
      _ => Vec::new(),
    };

    section.insert(
      compiler.name.to_string(),
      json!({
        "compiler_packages": packages,
        "versions": versions,
      }),
    );
  }
  Value::Object(section)
}

fn version_table(compiler: &str, version: &str) -> Value {
  match compiler {
    "gcc" => json!({ "!compiler_packages": [format!("gcc-{version}"), format!("g++-{version}")] }),
    "clang" => json!({ "!compiler_packages": [format!("clang-{version}")] }),
    "msvc" => {
      let generator = match version {
        "15" => "Visual Studio 15 2017",
        "16" => "Visual Studio 16 2019",
        _ => "Visual Studio 17 2022",
      };
      json!({ "cmake_args": ["-G", generator] })
    }
    _ => json!({}),
  }
}

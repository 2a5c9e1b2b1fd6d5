//! The configuration key registry.
//!
//! Every resolved configuration contains exactly the keys listed in [`KEYS`].
//! Each key declares its default, and the default's shape fixes the key's
//! [`MergePolicy`] once, here, rather than at merge time.

use serde_json::{Map, Value};

/// How a plain (unmarked) value combines with the accumulated one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePolicy {
  /// Scalars: the later value wins.
  Replace,
  /// Lists: the later items are appended, duplicates dropped.
  Append,
  /// Mappings: merged key by key, recursively.
  Merge,
}

impl MergePolicy {
  /// Policy for a value whose key is not in the registry.
  pub fn of_value(value: &Value) -> Self {
    match value {
      Value::Array(_) => Self::Append,
      Value::Object(_) => Self::Merge,
      _ => Self::Replace,
    }
  }
}

/// Declared default of a configuration key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyDefault {
  Null,
  Str(&'static str),
  Bool(bool),
  List,
  Map,
}

impl KeyDefault {
  pub fn to_value(self) -> Value {
    match self {
      Self::Null => Value::Null,
      Self::Str(s) => Value::String(s.to_string()),
      Self::Bool(b) => Value::Bool(b),
      Self::List => Value::Array(Vec::new()),
      Self::Map => Value::Object(Map::new()),
    }
  }

  pub fn policy(self) -> MergePolicy {
    match self {
      Self::List => MergePolicy::Append,
      Self::Map => MergePolicy::Merge,
      Self::Null | Self::Str(_) | Self::Bool(_) => MergePolicy::Replace,
    }
  }
}

/// One entry of the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyDef {
  pub name: &'static str,
  pub default: KeyDefault,
}

impl KeyDef {
  pub fn policy(&self) -> MergePolicy {
    self.default.policy()
  }

  pub fn default_value(&self) -> Value {
    self.default.to_value()
  }
}

const fn key(name: &'static str, default: KeyDefault) -> KeyDef {
  KeyDef { name, default }
}

pub const BUILD_DIR: &str = "build_dir";
pub const DEPS_DIR: &str = "deps_dir";
pub const INSTALL_DIR: &str = "install_dir";
pub const VARIABLES: &str = "variables";
pub const PKG_TOOL: &str = "pkg_tool";

/// Path keys, in the order they are substituted. Each may reference the
/// ones before it.
pub const PATH_KEYS: [&str; 3] = [BUILD_DIR, DEPS_DIR, INSTALL_DIR];

/// Generic package keys and the suffix of their package-tool-specific form
/// (`apt_install`, `brew_packages`, ...).
pub const PACKAGE_KEYS: [(&str, &str); 5] = [
  ("pkg_setup", "setup"),
  ("pkg_update", "update"),
  ("pkg_install", "install"),
  ("packages", "packages"),
  ("compiler_packages", "compiler_packages"),
];

pub static KEYS: &[KeyDef] = &[
  // Toolchain
  key("c", KeyDefault::Null),
  key("cxx", KeyDefault::Null),
  key("cross_compile_platform", KeyDefault::Null),
  key("needs_compiler", KeyDefault::Bool(true)),
  // Paths
  key(BUILD_DIR, KeyDefault::Str("{source_dir}/build")),
  key(DEPS_DIR, KeyDefault::Str("{build_dir}/deps")),
  key(INSTALL_DIR, KeyDefault::Str("{build_dir}/install")),
  key("build_type", KeyDefault::Str("RelWithDebInfo")),
  key("cmake_args", KeyDefault::List),
  // Steps
  key("pre_build_steps", KeyDefault::List),
  key("build_steps", KeyDefault::List),
  key("post_build_steps", KeyDefault::List),
  key("test_steps", KeyDefault::List),
  key("install_steps", KeyDefault::List),
  key("run_tests", KeyDefault::Bool(true)),
  key("build_tests", KeyDefault::Bool(true)),
  // Environment
  key("env", KeyDefault::Map),
  key("pre_build_env", KeyDefault::Map),
  key("build_env", KeyDefault::Map),
  key("post_build_env", KeyDefault::Map),
  key("test_env", KeyDefault::Map),
  // Packages
  key(PKG_TOOL, KeyDefault::Null),
  key("pkg_setup", KeyDefault::List),
  key("pkg_update", KeyDefault::Str("")),
  key("pkg_install", KeyDefault::Str("")),
  key("packages", KeyDefault::List),
  key("compiler_packages", KeyDefault::List),
  key("sudo", KeyDefault::Bool(false)),
  // Graph
  key("imports", KeyDefault::List),
  key("upstream", KeyDefault::List),
  key("downstream", KeyDefault::List),
  key(VARIABLES, KeyDefault::Map),
];

/// Descriptor fields that describe the project rather than configure it.
/// They are neither registry keys nor substitution variables.
pub const METADATA_KEYS: [&str; 5] = ["name", "account", "url", "revision", "targets"];

pub fn lookup(name: &str) -> Option<&'static KeyDef> {
  KEYS.iter().find(|k| k.name == name)
}

pub fn is_known(name: &str) -> bool {
  lookup(name).is_some()
}

pub fn is_metadata(name: &str) -> bool {
  METADATA_KEYS.contains(&name)
}

/// Whether `name` is a package-tool-specific form of a package key.
pub fn is_package_tool_key(name: &str) -> bool {
  crate::platform::PackageTool::ALL.iter().any(|tool| {
    name
      .strip_prefix(tool.as_str())
      .and_then(|rest| rest.strip_prefix('_'))
      .is_some_and(|suffix| PACKAGE_KEYS.iter().any(|(_, s)| *s == suffix))
  })
}

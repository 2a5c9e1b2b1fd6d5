//! Build specifications.
//!
//! A [`BuildSpec`] names one build permutation: which host runs the build,
//! which target and architecture it produces code for, and which compiler
//! and version compile it. Specs are validated against the builtin tables in
//! [`crate::data`] on construction and cannot be modified afterwards except
//! through the `with_*` builders, which validate again.
//!
//! # String Form
//!
//! `host-compiler-version-target-arch[-downstream]`, e.g.
//! `ubuntu-gcc-9-linux-x64` or `macos-appleclang-default-ios-armv8-downstream`.

use std::fmt;

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::data::{self, DEFAULT_COMPILER, DEFAULT_VERSION};
use crate::platform::arch::UnknownArch;
use crate::platform::{Arch, Os, current_host};

/// Suffix marking a spec that also builds consumers.
pub const DOWNSTREAM_SUFFIX: &str = "downstream";

/// Errors raised when a build specification is invalid.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpecError {
  #[error("unknown host '{0}'")]
  UnknownHost(String),

  #[error("unknown target '{0}'")]
  UnknownTarget(String),

  #[error(transparent)]
  UnknownArch(#[from] UnknownArch),

  #[error("unknown compiler '{0}'")]
  UnknownCompiler(String),

  #[error("compiler {compiler} has no version '{version}'")]
  UnknownVersion { compiler: String, version: String },

  #[error("compiler {compiler} does not run on host {host}")]
  UnsupportedHost { compiler: String, host: String },

  #[error("compiler {compiler} cannot build for target {target}")]
  UnsupportedTarget { compiler: String, target: String },

  #[error("malformed build spec '{0}': expected host-compiler-version-target-arch[-downstream]")]
  Malformed(String),

  #[error("the running platform is not supported")]
  UnsupportedPlatform,
}

/// One validated build permutation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct BuildSpec {
  host: String,
  target: String,
  arch: Arch,
  compiler: String,
  compiler_version: String,
  downstream: bool,
}

impl BuildSpec {
  /// Create a spec, normalizing names to lowercase and validating them.
  pub fn new(
    host: &str,
    compiler: &str,
    compiler_version: &str,
    target: &str,
    arch: Arch,
    downstream: bool,
  ) -> Result<Self, SpecError> {
    let spec = Self {
      host: host.to_ascii_lowercase(),
      target: target.to_ascii_lowercase(),
      arch,
      compiler: compiler.to_ascii_lowercase(),
      compiler_version: compiler_version.to_ascii_lowercase(),
      downstream,
    };
    spec.validate()?;
    Ok(spec)
  }

  /// Parse the `host-compiler-version-target-arch[-downstream]` form.
  ///
  /// Architecture aliases are accepted and normalized.
  pub fn parse(input: &str) -> Result<Self, SpecError> {
    let parts: Vec<&str> = input.split('-').collect();
    let downstream = match parts.len() {
      5 => false,
      6 if parts[5].eq_ignore_ascii_case(DOWNSTREAM_SUFFIX) => true,
      _ => return Err(SpecError::Malformed(input.to_string())),
    };
    let arch = Arch::parse(parts[4])?;
    Self::new(parts[0], parts[1], parts[2], parts[3], arch, downstream)
  }

  /// The spec for the running machine: its host, OS and architecture, built
  /// with the default compiler.
  pub fn detect() -> Result<Self, SpecError> {
    let os = Os::current().ok_or(SpecError::UnsupportedPlatform)?;
    let arch = Arch::current().ok_or(SpecError::UnsupportedPlatform)?;
    let host = current_host();
    debug!(host = %host, target = %os, arch = %arch, "detected build spec");
    Self::new(&host, DEFAULT_COMPILER, DEFAULT_VERSION, os.as_str(), arch, false)
  }

  /// Replace target and optionally architecture, from `os` or `os-arch`.
  pub fn with_target(&self, target: &str) -> Result<Self, SpecError> {
    let (os, arch) = match target.split_once('-') {
      Some((os, arch)) => (os, Arch::parse(arch)?),
      None => (target, self.arch),
    };
    Self::new(
      &self.host,
      &self.compiler,
      &self.compiler_version,
      os,
      arch,
      self.downstream,
    )
  }

  /// Replace compiler and optionally version, from `name` or `name-version`.
  pub fn with_compiler(&self, compiler: &str) -> Result<Self, SpecError> {
    let (name, version) = compiler.split_once('-').unwrap_or((compiler, DEFAULT_VERSION));
    Self::new(&self.host, name, version, &self.target, self.arch, self.downstream)
  }

  pub fn with_downstream(&self, downstream: bool) -> Self {
    Self {
      downstream,
      ..self.clone()
    }
  }

  fn validate(&self) -> Result<(), SpecError> {
    let host = data::host(&self.host).ok_or_else(|| SpecError::UnknownHost(self.host.clone()))?;
    let target = data::target(&self.target).ok_or_else(|| SpecError::UnknownTarget(self.target.clone()))?;
    let compiler =
      data::compiler(&self.compiler).ok_or_else(|| SpecError::UnknownCompiler(self.compiler.clone()))?;

    if !compiler.versions.contains(&self.compiler_version.as_str()) {
      return Err(SpecError::UnknownVersion {
        compiler: self.compiler.clone(),
        version: self.compiler_version.clone(),
      });
    }
    if !data::supports(compiler.hosts, host.name, host.os) {
      return Err(SpecError::UnsupportedHost {
        compiler: self.compiler.clone(),
        host: self.host.clone(),
      });
    }
    if !data::supports(compiler.targets, &self.target, target) {
      return Err(SpecError::UnsupportedTarget {
        compiler: self.compiler.clone(),
        target: self.target.clone(),
      });
    }
    Ok(())
  }

  pub fn host(&self) -> &str {
    &self.host
  }

  /// OS family of the host.
  pub fn host_os(&self) -> Os {
    data::host(&self.host).map(|h| h.os).unwrap_or(Os::Linux)
  }

  pub fn target(&self) -> &str {
    &self.target
  }

  pub fn arch(&self) -> Arch {
    self.arch
  }

  pub fn compiler(&self) -> &str {
    &self.compiler
  }

  pub fn compiler_version(&self) -> &str {
    &self.compiler_version
  }

  pub fn downstream(&self) -> bool {
    self.downstream
  }

  /// Display name in the string form accepted by [`BuildSpec::parse`].
  pub fn name(&self) -> String {
    let mut name = format!(
      "{}-{}-{}-{}-{}",
      self.host, self.compiler, self.compiler_version, self.target, self.arch
    );
    if self.downstream {
      name.push('-');
      name.push_str(DOWNSTREAM_SUFFIX);
    }
    name
  }
}

impl fmt::Display for BuildSpec {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.name())
  }
}

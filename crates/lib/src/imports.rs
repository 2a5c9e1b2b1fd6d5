//! Imports: dependencies that are installed rather than built.
//!
//! A project lists imports by name under `imports`. Each name is looked up
//! in the [`ImportRegistry`]; unknown names yield an [`UnresolvedImport`]
//! whose installation fails.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;
use tracing::{debug, info};

use crate::config::ResolvedConfig;
use crate::context::BuildContext;
use crate::platform::PackageTool;
use crate::shell::ShellError;

#[derive(Debug, Error)]
pub enum ImportError {
  #[error("import '{0}' is unknown and cannot be installed")]
  Unresolved(String),

  #[error("import '{import}' has no package for this host")]
  NoPackage { import: String },

  #[error(transparent)]
  Shell(#[from] ShellError),
}

/// A non-project dependency with its own installation procedure.
pub trait Import: fmt::Debug {
  fn name(&self) -> &str;

  fn resolved(&self) -> bool {
    true
  }

  /// Provides a compiler toolchain.
  fn compiler(&self) -> bool {
    false
  }

  /// Provides a library.
  fn library(&self) -> bool {
    false
  }

  fn install(&self, ctx: &mut BuildContext, config: &ResolvedConfig) -> Result<(), ImportError>;
}

/// Installs the packages of the resolved compiler.
#[derive(Debug, Default)]
pub struct CompilerImport;

impl Import for CompilerImport {
  fn name(&self) -> &str {
    "compiler"
  }

  fn compiler(&self) -> bool {
    true
  }

  fn install(&self, ctx: &mut BuildContext, config: &ResolvedConfig) -> Result<(), ImportError> {
    let packages = config.get_strings("compiler_packages");
    if packages.is_empty() {
      debug!(compiler = config.spec.compiler(), "no compiler packages to install");
      return Ok(());
    }
    ctx.install_packages(config, &packages)?;
    Ok(())
  }
}

/// Installs the host's OpenSSL development package.
#[derive(Debug, Default)]
pub struct LibCrypto;

impl LibCrypto {
  pub fn package(tool: PackageTool) -> &'static str {
    match tool {
      PackageTool::Apt => "libssl-dev",
      PackageTool::Yum => "openssl-devel",
      PackageTool::Apk => "openssl-dev",
      PackageTool::Zypper => "libopenssl-devel",
      PackageTool::Opkg => "libopenssl",
      PackageTool::Brew | PackageTool::Choco | PackageTool::Pkg => "openssl",
    }
  }
}

impl Import for LibCrypto {
  fn name(&self) -> &str {
    "libcrypto"
  }

  fn library(&self) -> bool {
    true
  }

  fn install(&self, ctx: &mut BuildContext, config: &ResolvedConfig) -> Result<(), ImportError> {
    let tool = config
      .get_str("pkg_tool")
      .and_then(|tool| tool.parse::<PackageTool>().ok())
      .ok_or_else(|| ImportError::NoPackage {
        import: self.name().to_string(),
      })?;
    ctx.install_packages(config, &[Self::package(tool).to_string()])?;
    Ok(())
  }
}

/// An import name nothing is registered for.
#[derive(Debug)]
pub struct UnresolvedImport {
  name: String,
}

impl UnresolvedImport {
  pub fn new(name: &str) -> Self {
    Self { name: name.to_string() }
  }
}

impl Import for UnresolvedImport {
  fn name(&self) -> &str {
    &self.name
  }

  fn resolved(&self) -> bool {
    false
  }

  fn install(&self, _ctx: &mut BuildContext, _config: &ResolvedConfig) -> Result<(), ImportError> {
    Err(ImportError::Unresolved(self.name.clone()))
  }
}

pub type ImportFactory = fn() -> Box<dyn Import>;

/// Imports by lowercase name.
#[derive(Debug, Clone, Default)]
pub struct ImportRegistry {
  entries: BTreeMap<String, ImportFactory>,
}

impl ImportRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_builtins() -> Self {
    let mut registry = Self::new();
    registry.register("compiler", || Box::new(CompilerImport));
    registry.register("libcrypto", || Box::new(LibCrypto));
    registry
  }

  /// Register an import. The first registration of a name wins.
  pub fn register(&mut self, name: &str, factory: ImportFactory) {
    self.entries.entry(name.to_ascii_lowercase()).or_insert(factory);
  }

  pub fn names(&self) -> impl Iterator<Item = &str> {
    self.entries.keys().map(String::as_str)
  }

  /// The import registered under `name`, or an unresolved placeholder.
  pub fn get(&self, name: &str) -> Box<dyn Import> {
    match self.entries.get(&name.to_ascii_lowercase()) {
      Some(factory) => factory(),
      None => {
        info!(import = name, "import not known");
        Box::new(UnresolvedImport::new(name))
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::context::tests::context_for;
  use serde_json::json;

  #[test]
  fn builtin_imports_and_tags() {
    let registry = ImportRegistry::with_builtins();
    assert_eq!(registry.names().collect::<Vec<_>>(), vec!["compiler", "libcrypto"]);

    let compiler = registry.get("Compiler");
    assert!(compiler.resolved() && compiler.compiler() && !compiler.library());

    let crypto = registry.get("libcrypto");
    assert!(crypto.library() && !crypto.compiler());

    let unknown = registry.get("cuda");
    assert!(!unknown.resolved());
    assert_eq!(unknown.name(), "cuda");
  }

  #[test]
  fn compiler_import_installs_versioned_packages() {
    let (_temp, mut ctx) = context_for(json!({}));
    let config = ctx.config().unwrap();

    CompilerImport.install(&mut ctx, &config).unwrap();
    let install = ctx.shell.history().last().unwrap();
    assert!(install.ends_with(&["gcc-9".to_string(), "g++-9".to_string()]));
  }

  #[test]
  fn libcrypto_uses_host_package_name() {
    let (_temp, mut ctx) = context_for(json!({}));
    let config = ctx.config().unwrap();

    LibCrypto.install(&mut ctx, &config).unwrap();
    assert_eq!(
      ctx.shell.history().last().and_then(|argv| argv.last()).map(String::as_str),
      Some("libssl-dev")
    );
  }

  #[test]
  fn unresolved_import_fails_to_install() {
    let (_temp, mut ctx) = context_for(json!({}));
    let config = ctx.config().unwrap();
    let err = UnresolvedImport::new("cuda").install(&mut ctx, &config).unwrap_err();
    assert!(matches!(err, ImportError::Unresolved(name) if name == "cuda"));
  }
}

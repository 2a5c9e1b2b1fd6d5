//! System package and compiler installation.

use tracing::info;

use crate::action::{Action, ActionError, Script, Step, run_action};
use crate::context::BuildContext;

/// Runs `pkg_setup`, then installs `packages` with the host's package tool.
#[derive(Debug)]
pub struct InstallPackages;

impl Action for InstallPackages {
  fn name(&self) -> &str {
    "install-packages"
  }

  fn run(&self, ctx: &mut BuildContext) -> Result<Vec<Step>, ActionError> {
    let config = ctx.config()?;

    let setup = Script::from_values("pkg_setup", config.get_list("pkg_setup"))?;
    if !setup.is_empty() {
      run_action(ctx, &setup)?;
    }

    let packages = config.get_strings("packages");
    if packages.is_empty() {
      info!(project = %config.project, "no packages to install");
    }
    ctx.install_packages(&config, &packages)?;
    Ok(Vec::new())
  }
}

/// Installs the packages of the resolved compiler.
#[derive(Debug)]
pub struct InstallCompiler;

impl Action for InstallCompiler {
  fn name(&self) -> &str {
    "install-compiler"
  }

  fn run(&self, ctx: &mut BuildContext) -> Result<Vec<Step>, ActionError> {
    let config = ctx.config()?;
    if !config.get_bool("needs_compiler") {
      info!(project = %config.project, "project does not need a compiler");
      return Ok(Vec::new());
    }
    ctx.imports.get("compiler").install(ctx, &config)?;
    Ok(Vec::new())
  }
}

//! The `clean` action: removal of a project's build directory.

use tracing::{info, warn};

use crate::action::{Action, ActionError, Step};
use crate::context::BuildContext;

/// Removes the current project's build directory.
#[derive(Debug)]
pub struct Clean;

impl Action for Clean {
  fn name(&self) -> &str {
    "clean"
  }

  fn run(&self, ctx: &mut BuildContext) -> Result<Vec<Step>, ActionError> {
    let config = ctx.config()?;
    let Some(build_dir) = config.get_path("build_dir") else {
      return Ok(Vec::new());
    };

    if config.source_dir.starts_with(&build_dir) {
      warn!(build_dir = %build_dir.display(), "build directory contains the sources, not removing");
      return Ok(Vec::new());
    }
    if !build_dir.exists() {
      return Ok(Vec::new());
    }
    if ctx.shell.dry_run() {
      info!(build_dir = %build_dir.display(), "dry run: would remove build directory");
      return Ok(Vec::new());
    }

    std::fs::remove_dir_all(&build_dir).map_err(|source| ActionError::Io {
      path: build_dir.clone(),
      source,
    })?;
    info!(build_dir = %build_dir.display(), "removed build directory");
    Ok(Vec::new())
  }
}

#[cfg(test)]
mod tests {
  use crate::action::run_named;
  use crate::context::tests::context_for;
  use crate::shell::Shell;
  use serde_json::json;

  #[test]
  fn removes_build_directory() {
    let (temp, ctx) = context_for(json!({}));
    let mut ctx = ctx.with_shell(Shell::new());
    let build_dir = temp.path().join("demo").join("build");
    std::fs::create_dir_all(build_dir.join("CMakeFiles")).unwrap();

    run_named(&mut ctx, "clean").unwrap();
    assert!(!build_dir.exists());
    assert!(temp.path().join("demo").join("xbuild.json").exists());
  }

  #[test]
  fn refuses_to_remove_sources() {
    let (temp, ctx) = context_for(json!({ "build_dir": "{source_dir}" }));
    let mut ctx = ctx.with_shell(Shell::new());

    run_named(&mut ctx, "clean").unwrap();
    assert!(temp.path().join("demo").join("xbuild.json").exists());
  }

  #[test]
  fn dry_run_keeps_directory() {
    let (temp, mut ctx) = context_for(json!({}));
    let build_dir = temp.path().join("demo").join("build");
    std::fs::create_dir_all(&build_dir).unwrap();

    run_named(&mut ctx, "clean").unwrap();
    assert!(build_dir.exists());
  }
}

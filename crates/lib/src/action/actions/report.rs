//! Reporting actions. Their output goes to [`BuildContext::report`].

use crate::action::{Action, ActionError, Step};
use crate::context::BuildContext;

/// Reports the current project's resolved configuration as JSON.
#[derive(Debug)]
pub struct PrintConfig;

impl Action for PrintConfig {
  fn name(&self) -> &str {
    "print-config"
  }

  fn run(&self, ctx: &mut BuildContext) -> Result<Vec<Step>, ActionError> {
    let config = ctx.config()?;
    ctx.report(format!("{:#}", config.to_json()));
    Ok(Vec::new())
  }
}

/// Reports the transitive dependencies in build order, one per line.
#[derive(Debug)]
pub struct PrintDeps;

impl Action for PrintDeps {
  fn name(&self) -> &str {
    "print-deps"
  }

  fn run(&self, ctx: &mut BuildContext) -> Result<Vec<Step>, ActionError> {
    let id = ctx.project_id().clone();
    let dependencies = ctx.graph().get_flattened_dependencies(&id, false)?;

    for dependency in dependencies {
      let project = ctx.projects.project(&dependency)?;
      let line = match &project.path {
        Some(path) => format!("{} {}", project.name, path.display()),
        None => format!("{} (not fetched)", project.name),
      };
      ctx.report(line);
    }
    Ok(Vec::new())
  }
}

#[cfg(test)]
mod tests {
  use crate::action::run_named;
  use crate::context::tests::context_for;
  use crate::util::testutil::write_project;
  use serde_json::{Value, json};

  #[test]
  fn print_config_reports_json() {
    let (_temp, mut ctx) = context_for(json!({ "build_type": "Debug", "variants": { "asan": { "cmake_args": ["-DASAN=ON"] } } }));
    run_named(&mut ctx, "print-config").unwrap();

    let printed: Value = serde_json::from_str(&ctx.reports()[0]).unwrap();
    assert_eq!(printed["build_type"], "Debug");
    assert_eq!(printed["project"], "demo");
    assert_eq!(printed["spec"], "ubuntu-gcc-9-linux-x64");
    assert!(printed["variants"]["asan"]["cmake_args"].as_array().unwrap().contains(&json!("-DASAN=ON")));
  }

  #[test]
  fn print_deps_marks_unfetched_projects() {
    let (temp, mut ctx) = context_for(json!({ "upstream": ["zlib", "remote"] }));
    write_project(temp.path(), "zlib", json!({}));

    run_named(&mut ctx, "print-deps").unwrap();
    let reports = ctx.reports();
    assert_eq!(reports.len(), 2);
    assert!(reports[0].starts_with("zlib "));
    assert_eq!(reports[1], "remote (not fetched)");
  }
}

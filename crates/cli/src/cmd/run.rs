//! Implementation of `xbuild <action>`.
//!
//! Loads the root project, applies command-line overrides and runs one action
//! against a fresh build context.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde_json::Value;
use tracing::info;

use xbuild_lib::action::{ActionError, run_command};
use xbuild_lib::config::{ConfigTable, Directive};
use xbuild_lib::context::BuildContext;
use xbuild_lib::project::ProjectCache;
use xbuild_lib::shell::Shell;
use xbuild_lib::spec::BuildSpec;

/// Arguments of a single run.
#[derive(Debug)]
pub struct RunArgs<'a> {
  pub action: &'a str,
  pub overrides: &'a [String],
  pub project: Option<&'a Path>,
  pub spec: Option<&'a str>,
  pub target: Option<&'a str>,
  pub compiler: Option<&'a str>,
  pub variant: Option<&'a str>,
  pub search_dirs: &'a [PathBuf],
  pub dry_run: bool,
}

/// Run `args.action` on the project at `args.project`.
///
/// Library failures surface as [`ActionError`] inside the returned error so the
/// caller can map them to an exit status.
pub fn cmd_run(args: &RunArgs<'_>) -> Result<()> {
  let overrides = parse_overrides(args.overrides)?;
  let spec = build_spec(args).map_err(ActionError::from)?;

  let mut projects = ProjectCache::from_env();
  for dir in args.search_dirs {
    projects.add_search_dir(dir.clone());
  }

  let dir = match args.project {
    Some(dir) => dir.to_path_buf(),
    None => std::env::current_dir().context("failed to read current directory")?,
  };
  let root = projects.load_root(&dir).map_err(ActionError::from)?;
  {
    let project = projects.project_mut(&root).map_err(ActionError::from)?;
    project.set_overrides(overrides);
    project.set_variant(args.variant);
  }

  info!(project = %root, spec = %spec, action = args.action, dry_run = args.dry_run, "running");
  let mut ctx = BuildContext::new(spec, projects, root)
    .map_err(ActionError::from)?
    .with_shell(Shell::new().with_dry_run(args.dry_run));

  run_command(&mut ctx, args.action)?;

  for line in ctx.reports() {
    println!("{line}");
  }
  Ok(())
}

fn build_spec(args: &RunArgs<'_>) -> Result<BuildSpec, xbuild_lib::spec::SpecError> {
  let mut spec = match args.spec {
    Some(spec) => BuildSpec::parse(spec)?,
    None => BuildSpec::detect()?,
  };
  if let Some(target) = args.target {
    spec = spec.with_target(target)?;
  }
  if let Some(compiler) = args.compiler {
    spec = spec.with_compiler(compiler)?;
  }
  Ok(spec)
}

/// Parse `key=value` arguments into an override table.
///
/// Values that parse as JSON keep their type; anything else is a string.
fn parse_overrides(args: &[String]) -> Result<ConfigTable> {
  let mut table = ConfigTable::new();
  for arg in args {
    let Some((key, raw)) = arg.split_once('=') else {
      bail!("invalid override '{arg}': expected key=value");
    };
    if key.is_empty() {
      bail!("invalid override '{arg}': empty key");
    }
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    let (name, directive) = Directive::decode(key, value);
    table.insert(name, directive);
  }
  Ok(table)
}

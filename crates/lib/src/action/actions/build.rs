//! The build pipeline.
//!
//! `build` expands into five phases, each a registered action of its own:
//!
//! | action       | steps key          | env key          | working dir |
//! |--------------|--------------------|------------------|-------------|
//! | `pre-build`  | `pre_build_steps`  | `pre_build_env`  | source      |
//! | `compile`    | `build_steps`      | `build_env`      | build       |
//! | `post-build` | `post_build_steps` | `post_build_env` | source      |
//! | `test`       | `test_steps`       | `test_env`       | build       |
//! | `install`    | `install_steps`    | `build_env`      | build       |
//!
//! Each phase runs inside a scope holding its working directory and `env`
//! overlaid with the phase env. `pre-build` first installs the project's
//! imports and builds its dependencies. Phases with no steps of their own
//! fall back to the build tool's commands where it has some.

use std::path::PathBuf;
use std::rc::Rc;

use serde_json::{Value, json};
use tracing::{debug, info};

use crate::action::tool::BuildTool;
use crate::action::{Action, ActionError, Script, Step, run_action, run_named};
use crate::config::{Directive, ResolvedConfig};
use crate::context::BuildContext;
use crate::project::{Project, ProjectId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
  PreBuild,
  Build,
  PostBuild,
  Test,
  Install,
}

impl Phase {
  pub const ALL: [Phase; 5] = [
    Phase::PreBuild,
    Phase::Build,
    Phase::PostBuild,
    Phase::Test,
    Phase::Install,
  ];

  pub fn action_name(self) -> &'static str {
    match self {
      Self::PreBuild => "pre-build",
      Self::Build => "compile",
      Self::PostBuild => "post-build",
      Self::Test => "test",
      Self::Install => "install",
    }
  }

  pub fn steps_key(self) -> &'static str {
    match self {
      Self::PreBuild => "pre_build_steps",
      Self::Build => "build_steps",
      Self::PostBuild => "post_build_steps",
      Self::Test => "test_steps",
      Self::Install => "install_steps",
    }
  }

  pub fn env_key(self) -> &'static str {
    match self {
      Self::PreBuild => "pre_build_env",
      Self::Build | Self::Install => "build_env",
      Self::PostBuild => "post_build_env",
      Self::Test => "test_env",
    }
  }

  fn working_dir(self, config: &ResolvedConfig) -> PathBuf {
    match self {
      Self::PreBuild | Self::PostBuild => config.source_dir.clone(),
      Self::Build | Self::Test | Self::Install => config
        .get_path("build_dir")
        .unwrap_or_else(|| config.source_dir.join("build")),
    }
  }

  fn default_steps(self, tool: &dyn BuildTool, config: &ResolvedConfig) -> Vec<Step> {
    let commands = match self {
      Self::Build => tool.build(config),
      Self::Test => tool.test(config),
      Self::Install => tool.install(config),
      Self::PreBuild | Self::PostBuild => Vec::new(),
    };
    commands.into_iter().map(Step::Argv).collect()
  }
}

/// Builds the current project: every phase, then its consumers when the
/// spec asks for downstream builds.
#[derive(Debug)]
pub struct Build;

impl Action for Build {
  fn name(&self) -> &str {
    "build"
  }

  fn run(&self, ctx: &mut BuildContext) -> Result<Vec<Step>, ActionError> {
    let id = ctx.project_id().clone();
    info!(project = %id, spec = %ctx.spec, "building");

    let mut steps: Vec<Step> = Phase::ALL.into_iter().map(|phase| Step::action(PhaseAction(phase))).collect();
    steps.push(Step::callable(move |ctx| {
      ctx.mark_built(&id);
      Ok(Vec::new())
    }));
    if ctx.is_root() && ctx.spec.downstream() {
      steps.push(Step::action(BuildConsumers));
    }
    Ok(steps)
  }
}

#[derive(Debug)]
pub struct PhaseAction(pub Phase);

impl Action for PhaseAction {
  fn name(&self) -> &str {
    self.0.action_name()
  }

  fn run(&self, ctx: &mut BuildContext) -> Result<Vec<Step>, ActionError> {
    let phase = self.0;
    let id = ctx.project_id().clone();
    ctx.ensure_source(&id)?;
    let config = ctx.config()?;

    if phase == Phase::Test && !config.get_bool("run_tests") {
      debug!(project = %id, "tests disabled");
      return Ok(Vec::new());
    }
    if phase == Phase::PreBuild {
      install_imports(ctx, &config)?;
      build_dependencies(ctx, &id, &config)?;
    }

    let name = format!("{id}:{}", phase.action_name());
    let mut script = Script::from_values(name.clone(), config.get_list(phase.steps_key()))?;
    if script.is_empty() {
      let tool = Rc::clone(&ctx.build_tool);
      script = Script::new(name, phase.default_steps(tool.as_ref(), &config));
    }
    if script.is_empty() {
      return Ok(Vec::new());
    }

    let dir = phase.working_dir(&config);
    if !ctx.shell.dry_run() && !dir.is_dir() {
      std::fs::create_dir_all(&dir).map_err(|source| ActionError::Io {
        path: dir.clone(),
        source,
      })?;
    }
    let mut env = config.get_env("env");
    env.extend(config.get_env(phase.env_key()));

    info!(project = %id, phase = phase.action_name(), steps = script.steps().len(), "running phase");
    ctx.scoped(Some(&dir), env, |ctx| run_action(ctx, &script))?;
    Ok(Vec::new())
  }
}

/// Builds and tests every transitive consumer of the current project.
#[derive(Debug)]
pub struct BuildConsumers;

impl Action for BuildConsumers {
  fn name(&self) -> &str {
    "build-consumers"
  }

  fn run(&self, ctx: &mut BuildContext) -> Result<Vec<Step>, ActionError> {
    let id = ctx.project_id().clone();
    let consumers = ctx.graph().get_flattened_consumers(&id, false)?;
    if consumers.is_empty() {
      info!(project = %id, "no consumers to build");
    }

    Ok(
      consumers
        .into_iter()
        .map(|consumer| {
          Step::callable(move |ctx| {
            info!(consumer = %consumer, "building consumer");
            ctx.with_project(&consumer, |ctx| run_named(ctx, "build"))?;
            Ok(Vec::new())
          })
        })
        .collect(),
    )
  }
}

fn install_imports(ctx: &mut BuildContext, config: &ResolvedConfig) -> Result<(), ActionError> {
  for name in config.get_strings("imports") {
    let import = ctx.imports.get(&name);
    info!(project = %config.project, import = import.name(), "installing import");
    import.install(ctx, config)?;
  }
  Ok(())
}

fn build_dependencies(ctx: &mut BuildContext, id: &ProjectId, config: &ResolvedConfig) -> Result<(), ActionError> {
  let dependencies = ctx.graph().get_flattened_dependencies(id, false)?;
  let deps_dir = config.get_str("deps_dir").map(str::to_string);

  for dependency in dependencies {
    if ctx.is_built(&dependency) {
      debug!(dependency = %dependency, "already built");
      continue;
    }
    if let Some(dir) = &deps_dir {
      install_into(ctx.projects.project_mut(&dependency)?, dir);
    }
    info!(project = %id, dependency = %dependency, "building dependency");
    ctx.with_project(&dependency, |ctx| run_named(ctx, "build"))?;
  }
  Ok(())
}

/// Point a dependency's install prefix and dependency directory at the
/// consuming project's `deps_dir`, unless its reference set them already.
fn install_into(project: &mut Project, deps_dir: &str) {
  let mut overrides = project.overrides().clone();
  let defaults: [(&str, Value); 3] = [
    ("install_dir", json!(deps_dir)),
    ("deps_dir", json!(deps_dir)),
    ("run_tests", json!(false)),
  ];

  let mut changed = false;
  for (key, value) in defaults {
    if overrides.get(key).is_none() {
      overrides.insert(key, Directive::Replace(value));
      changed = true;
    }
  }
  if changed {
    project.set_overrides(overrides);
  }
}

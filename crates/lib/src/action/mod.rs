//! Action execution.
//!
//! An [`Action`] runs against a [`BuildContext`] and may yield child
//! [`Step`]s, which run right after it, depth first. A [`Script`] is an
//! action made of steps; each step is interpreted as follows:
//!
//! - [`Step::Command`]: a registered action name runs that action, anything
//!   else is split on whitespace and executed
//! - [`Step::Argv`]: executed as given
//! - [`Step::Named`]: runs the registered action, failing when there is none
//! - [`Step::Action`]: runs the action
//! - [`Step::Callable`]: invoked; its children run after the whole script
//!
//! String and list steps are substituted against the current project's
//! variables first.

pub mod actions;
pub mod fetch;
pub mod tool;
mod types;

pub use types::*;

use std::collections::BTreeMap;
use std::rc::Rc;

use serde_json::Value;
use tracing::{debug, info};

use crate::consts::MAX_ACTION_DEPTH;
use crate::context::BuildContext;
use crate::shell::ExecOptions;

/// Constructs a registered action.
pub type ActionFactory = fn() -> Rc<dyn Action>;

/// Lowercase a name and drop `-`, `_` and spaces.
pub fn normalize(name: &str) -> String {
  name
    .chars()
    .filter(|c| !matches!(c, '-' | '_' | ' '))
    .flat_map(char::to_lowercase)
    .collect()
}

/// Actions by name. Lookups ignore case, hyphens and underscores.
#[derive(Debug, Clone, Default)]
pub struct ActionRegistry {
  entries: BTreeMap<String, (&'static str, ActionFactory)>,
}

impl ActionRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// A registry holding every builtin action.
  pub fn with_builtins() -> Self {
    let mut registry = Self::new();
    actions::register_builtins(&mut registry);
    registry
  }

  /// Register an action. The first registration of a name wins.
  pub fn register(&mut self, name: &'static str, factory: ActionFactory) {
    self.entries.entry(normalize(name)).or_insert((name, factory));
  }

  pub fn contains(&self, name: &str) -> bool {
    self.entries.contains_key(&normalize(name))
  }

  pub fn lookup(&self, name: &str) -> Option<Rc<dyn Action>> {
    self.entries.get(&normalize(name)).map(|(_, factory)| factory())
  }

  /// Registered names as written at registration, sorted.
  pub fn names(&self) -> Vec<&'static str> {
    let mut names: Vec<_> = self.entries.values().map(|(name, _)| *name).collect();
    names.sort_unstable();
    names
  }

  fn known(&self) -> String {
    self.names().join(", ")
  }
}

/// Run the action a user asked for by name.
///
/// # Errors
///
/// [`ActionError::ClassNotFound`] when no action has that name.
pub fn run_command(ctx: &mut BuildContext, name: &str) -> Result<(), ActionError> {
  let action = ctx.actions.lookup(name).ok_or_else(|| ActionError::ClassNotFound {
    name: name.to_string(),
    known: ctx.actions.known(),
  })?;
  run_action(ctx, action.as_ref())
}

/// Run a registered action by name.
///
/// # Errors
///
/// [`ActionError::NotFound`] when no action has that name.
pub fn run_named(ctx: &mut BuildContext, name: &str) -> Result<(), ActionError> {
  let action = ctx.actions.lookup(name).ok_or_else(|| ActionError::NotFound {
    name: name.to_string(),
    known: ctx.actions.known(),
  })?;
  run_action(ctx, action.as_ref())
}

/// Run an action and then, depth first, every child it yields.
pub fn run_action(ctx: &mut BuildContext, action: &dyn Action) -> Result<(), ActionError> {
  guarded(ctx, action.name(), |ctx| {
    debug!(action = action.name(), project = %ctx.project_id(), "running action");
    let children = action.run(ctx)?;
    run_steps(ctx, &children)
  })
}

/// Run steps in order, each followed by the children it yields.
pub fn run_steps(ctx: &mut BuildContext, steps: &[Step]) -> Result<(), ActionError> {
  for step in steps {
    let children = execute_step(ctx, step)?;
    if !children.is_empty() {
      guarded(ctx, "callable", |ctx| run_steps(ctx, &children))?;
    }
  }
  Ok(())
}

fn guarded<T>(
  ctx: &mut BuildContext,
  name: &str,
  f: impl FnOnce(&mut BuildContext) -> Result<T, ActionError>,
) -> Result<T, ActionError> {
  if ctx.action_depth() >= MAX_ACTION_DEPTH {
    return Err(ActionError::TooDeep {
      name: name.to_string(),
      depth: MAX_ACTION_DEPTH,
    });
  }
  ctx.enter_action();
  let result = f(ctx);
  ctx.leave_action();
  result
}

/// Run a single step. Children of a callable are returned, not run.
fn execute_step(ctx: &mut BuildContext, step: &Step) -> Result<Vec<Step>, ActionError> {
  let step = step.substitute(&ctx.step_variables())?;
  match step {
    Step::Command(command) => {
      if let Some(action) = ctx.actions.lookup(&command) {
        run_action(ctx, action.as_ref())?;
      } else {
        let argv: Vec<String> = command.split_whitespace().map(str::to_string).collect();
        if !argv.is_empty() {
          ctx.shell.exec(&argv, &ExecOptions::default())?;
        }
      }
      Ok(Vec::new())
    }
    Step::Argv(argv) => {
      ctx.shell.exec(&argv, &ExecOptions::default())?;
      Ok(Vec::new())
    }
    Step::Named(name) => {
      run_named(ctx, &name)?;
      Ok(Vec::new())
    }
    Step::Action(action) => {
      run_action(ctx, action.as_ref())?;
      Ok(Vec::new())
    }
    Step::Callable(callable) => callable(ctx),
  }
}

/// A named, ordered list of steps.
#[derive(Debug, Clone)]
pub struct Script {
  name: String,
  steps: Vec<Step>,
}

impl Script {
  pub fn new(name: impl Into<String>, steps: Vec<Step>) -> Self {
    Self {
      name: name.into(),
      steps,
    }
  }

  /// A script from a configuration step list.
  pub fn from_values(name: impl Into<String>, values: &[Value]) -> Result<Self, ActionError> {
    let steps = values.iter().map(Step::from_value).collect::<Result<Vec<_>, _>>()?;
    Ok(Self::new(name, steps))
  }

  pub fn steps(&self) -> &[Step] {
    &self.steps
  }

  pub fn is_empty(&self) -> bool {
    self.steps.is_empty()
  }
}

impl Action for Script {
  fn name(&self) -> &str {
    &self.name
  }

  /// Runs every step in order. Children of callables are collected and
  /// returned, so they run once all sibling steps have finished.
  fn run(&self, ctx: &mut BuildContext) -> Result<Vec<Step>, ActionError> {
    info!(script = %self.name, steps = self.steps.len(), "running script");
    let mut deferred = Vec::new();
    for step in &self.steps {
      deferred.extend(execute_step(ctx, step)?);
    }
    Ok(deferred)
  }
}

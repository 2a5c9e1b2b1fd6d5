use std::fmt;
use std::path::PathBuf;
use std::rc::Rc;

use serde_json::Value;
use thiserror::Error;

use crate::config::ConfigError;
use crate::consts::{
  EXIT_ACTION_CLASS_NOT_FOUND, EXIT_ACTION_NOT_FOUND, EXIT_COMMAND_FAILED, EXIT_NO_PROJECT, EXIT_UNKNOWN_STEP,
};
use crate::context::BuildContext;
use crate::imports::ImportError;
use crate::project::ProjectError;
use crate::shell::ShellError;
use crate::spec::SpecError;
use crate::vars::{self, SubstituteError, Variables};

/// Errors raised while running actions.
///
/// Every variant maps to a process exit status through [`ActionError::exit_code`].
#[derive(Debug, Error)]
pub enum ActionError {
  /// The action requested as a command does not exist.
  #[error("unknown command '{name}'; known actions: {known}")]
  ClassNotFound { name: String, known: String },

  /// A step referenced an action by name that does not exist.
  #[error("action '{name}' not found; known actions: {known}")]
  NotFound { name: String, known: String },

  #[error("unknown step type: {0}")]
  UnknownStep(String),

  #[error("action nesting deeper than {depth} while running '{name}'")]
  TooDeep { name: String, depth: usize },

  #[error("project {0} has no source on disk and no url to fetch it from")]
  Unfetchable(String),

  #[error("failed to access {}: {source}", path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error(transparent)]
  Shell(#[from] ShellError),

  #[error(transparent)]
  Import(#[from] ImportError),

  #[error(transparent)]
  Project(#[from] ProjectError),

  #[error(transparent)]
  Config(#[from] ConfigError),

  #[error(transparent)]
  Spec(#[from] SpecError),

  #[error(transparent)]
  Substitute(#[from] SubstituteError),
}

impl ActionError {
  /// The process exit status this error maps to.
  pub fn exit_code(&self) -> i32 {
    match self {
      Self::ClassNotFound { .. } => EXIT_ACTION_CLASS_NOT_FOUND,
      Self::NotFound { .. } => EXIT_ACTION_NOT_FOUND,
      Self::UnknownStep(_) => EXIT_UNKNOWN_STEP,
      Self::Shell(_) | Self::Import(ImportError::Shell(_)) => EXIT_COMMAND_FAILED,
      _ => EXIT_NO_PROJECT,
    }
  }
}

/// A unit of work.
///
/// `run` may return child steps; they are run right after it, in order,
/// depth first.
pub trait Action: fmt::Debug {
  fn name(&self) -> &str;

  fn run(&self, ctx: &mut BuildContext) -> Result<Vec<Step>, ActionError>;
}

/// A step producing further steps when invoked.
pub type Callable = Rc<dyn Fn(&mut BuildContext) -> Result<Vec<Step>, ActionError>>;

/// One item of a script.
#[derive(Clone)]
pub enum Step {
  /// A registered action name, or else a command split on whitespace.
  Command(String),
  /// A command run as given, without splitting.
  Argv(Vec<String>),
  /// A registered action name. Not falling back to a command.
  Named(String),
  Action(Rc<dyn Action>),
  /// Children of a callable run after the rest of its script.
  Callable(Callable),
}

impl fmt::Debug for Step {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Command(command) => f.debug_tuple("Command").field(command).finish(),
      Self::Argv(argv) => f.debug_tuple("Argv").field(argv).finish(),
      Self::Named(name) => f.debug_tuple("Named").field(name).finish(),
      Self::Action(action) => f.debug_tuple("Action").field(&action.name()).finish(),
      Self::Callable(_) => f.write_str("Callable"),
    }
  }
}

impl Step {
  pub fn action(action: impl Action + 'static) -> Self {
    Self::Action(Rc::new(action))
  }

  pub fn callable(f: impl Fn(&mut BuildContext) -> Result<Vec<Step>, ActionError> + 'static) -> Self {
    Self::Callable(Rc::new(f))
  }

  pub fn argv<S: Into<String>>(args: impl IntoIterator<Item = S>) -> Self {
    Self::Argv(args.into_iter().map(Into::into).collect())
  }

  /// Interpret a configuration value as a step.
  ///
  /// A string is a [`Step::Command`], a list of scalars an [`Step::Argv`],
  /// and `{"action": "<name>"}` a [`Step::Named`]. Anything else is an
  /// [`ActionError::UnknownStep`].
  pub fn from_value(value: &Value) -> Result<Self, ActionError> {
    match value {
      Value::String(command) => Ok(Self::Command(command.clone())),
      Value::Array(items) => {
        let argv = items
          .iter()
          .map(|item| match item {
            Value::String(_) | Value::Number(_) | Value::Bool(_) => Ok(vars::stringify(item)),
            _ => Err(ActionError::UnknownStep(value.to_string())),
          })
          .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::Argv(argv))
      }
      Value::Object(object) if object.len() == 1 => match object.get("action") {
        Some(Value::String(name)) => Ok(Self::Named(name.clone())),
        _ => Err(ActionError::UnknownStep(value.to_string())),
      },
      _ => Err(ActionError::UnknownStep(value.to_string())),
    }
  }

  /// Substitute variables into string and list steps.
  ///
  /// List items expanding to lists are spliced into the argument vector.
  pub fn substitute(&self, variables: &Variables) -> Result<Self, SubstituteError> {
    Ok(match self {
      Self::Command(command) => Self::Command(vars::substitute_str(command, variables)?),
      Self::Named(name) => Self::Named(vars::substitute_str(name, variables)?),
      Self::Argv(argv) => {
        let items = Value::Array(argv.iter().cloned().map(Value::String).collect());
        let expanded = vars::substitute_value(&items, variables)?;
        let argv = expanded
          .as_array()
          .map(|items| items.iter().map(vars::stringify).collect())
          .unwrap_or_default();
        Self::Argv(argv)
      }
      other => other.clone(),
    })
  }
}

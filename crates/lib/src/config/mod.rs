//! Layered configuration: the key registry, configuration tables, merging,
//! and resolution against a build specification.

pub mod keys;
pub mod merge;
pub mod resolve;
pub mod table;

use thiserror::Error;

use crate::vars::SubstituteError;

pub use resolve::{ConfigResolver, ResolveRequest, ResolvedConfig};
pub use table::{ConfigTable, Directive, Section};

/// Errors raised while loading or resolving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("configuration must be an object, found {found}")]
  NotATable { found: String },

  #[error("{section}.{name} must be an object")]
  InvalidSection { section: String, name: String },

  #[error("configuration sections nested deeper than {0} levels")]
  NestingTooDeep(usize),

  #[error("project {project} has no variant '{variant}'")]
  UnknownVariant { project: String, variant: String },

  #[error("project {0} is not resolved: its source is not on disk and it has no configuration")]
  UnresolvedProject(String),

  #[error(transparent)]
  Substitute(#[from] SubstituteError),
}

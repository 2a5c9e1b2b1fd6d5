//! Projects, descriptor loading, the project cache and the project graph.

pub mod cache;
pub mod descriptor;
pub mod graph;
pub mod types;

use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;

pub use cache::{ProjectCache, ProjectFactory};
pub use graph::{Direction, ProjectGraph};
pub use types::{Project, ProjectId, ProjectReference};

/// Errors raised while loading projects or walking the project graph.
#[derive(Debug, Error)]
pub enum ProjectError {
  #[error("project directory not found: {}", .0.display())]
  NotFound(PathBuf),

  #[error("failed to read {}: {source}", path.display())]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse {}: {source}", path.display())]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("invalid descriptor {}: {source}", path.display())]
  InvalidDescriptor {
    path: PathBuf,
    #[source]
    source: ConfigError,
  },

  #[error("invalid project reference: {0}")]
  InvalidReference(String),

  #[error("project {0} is not in the project cache")]
  UnknownProject(String),

  #[error("dependency cycle detected involving project {project}")]
  Cycle { project: String },

  #[error(transparent)]
  Config(#[from] ConfigError),
}

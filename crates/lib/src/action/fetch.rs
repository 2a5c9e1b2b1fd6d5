//! Fetching the source of projects that are not on disk.

use std::fmt;
use std::path::Path;

use tracing::info;

use super::ActionError;
use crate::config::resolve::path_string;
use crate::consts::PACKAGE_RETRIES;
use crate::project::Project;
use crate::shell::{ExecOptions, Shell};

pub trait SourceFetcher: fmt::Debug {
  /// Place the source of `project` at `dest`.
  fn fetch(&self, shell: &mut Shell, project: &Project, dest: &Path) -> Result<(), ActionError>;
}

/// Clones with `git`, then checks out the project's revision if it has one.
#[derive(Debug, Default, Clone, Copy)]
pub struct GitFetcher;

impl GitFetcher {
  /// The project's url, or its GitHub location when only an account is known.
  pub fn clone_url(project: &Project) -> Option<String> {
    project.url.clone().or_else(|| {
      project
        .account
        .as_ref()
        .map(|account| format!("https://github.com/{account}/{}.git", project.name))
    })
  }
}

impl SourceFetcher for GitFetcher {
  fn fetch(&self, shell: &mut Shell, project: &Project, dest: &Path) -> Result<(), ActionError> {
    let url = Self::clone_url(project).ok_or_else(|| ActionError::Unfetchable(project.name.clone()))?;

    if dest.join(".git").exists() {
      info!(project = %project.name, dest = %dest.display(), "source already fetched");
      return Ok(());
    }
    if !shell.dry_run() {
      if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent).map_err(|source| ActionError::Io {
          path: parent.to_path_buf(),
          source,
        })?;
      }
    }

    let dest_arg = path_string(dest);
    let options = ExecOptions::default().retries(PACKAGE_RETRIES);
    shell.exec(
      &["git".into(), "clone".into(), "--recursive".into(), url, dest_arg.clone()],
      &options,
    )?;
    if let Some(revision) = &project.revision {
      shell.exec(
        &["git".into(), "-C".into(), dest_arg, "checkout".into(), revision.clone()],
        &ExecOptions::default(),
      )?;
    }
    Ok(())
  }
}

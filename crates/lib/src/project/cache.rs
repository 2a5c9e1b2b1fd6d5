//! The process-wide project cache.
//!
//! Every project name maps to exactly one [`Project`] instance, owned here.
//! Graph traversal looks projects up through [`ProjectCache::find_project`],
//! which consults the cache first, then the file system, then registered
//! factories, and finally creates an unresolved placeholder.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use walkdir::WalkDir;

use super::descriptor::{self, Descriptor};
use super::types::{Project, ProjectId, ProjectReference};
use super::ProjectError;
use crate::consts::SEARCH_PATH_ENV;

/// Constructor for a project known by name without a source checkout.
pub type ProjectFactory = fn() -> Project;

#[derive(Debug, Default)]
pub struct ProjectCache {
  projects: BTreeMap<ProjectId, Project>,
  search_dirs: Vec<PathBuf>,
  factories: BTreeMap<ProjectId, ProjectFactory>,
}

impl ProjectCache {
  pub fn new() -> Self {
    Self::default()
  }

  /// A cache whose search directories come from `XBUILD_PATH`.
  pub fn from_env() -> Self {
    let mut cache = Self::new();
    if let Some(paths) = std::env::var_os(SEARCH_PATH_ENV) {
      for dir in std::env::split_paths(&paths) {
        if !dir.as_os_str().is_empty() {
          cache.add_search_dir(dir);
        }
      }
    }
    cache
  }

  /// Add a directory to the global search list. Duplicates are ignored.
  pub fn add_search_dir(&mut self, dir: impl Into<PathBuf>) {
    let dir = dir.into();
    if !self.search_dirs.contains(&dir) {
      debug!(dir = %dir.display(), "added project search directory");
      self.search_dirs.push(dir);
    }
  }

  pub fn search_dirs(&self) -> &[PathBuf] {
    &self.search_dirs
  }

  pub fn register_factory(&mut self, name: &str, factory: ProjectFactory) {
    self.factories.insert(ProjectId::new(name), factory);
  }

  pub fn get(&self, id: &ProjectId) -> Option<&Project> {
    self.projects.get(id)
  }

  pub fn get_mut(&mut self, id: &ProjectId) -> Option<&mut Project> {
    self.projects.get_mut(id)
  }

  pub fn project(&self, id: &ProjectId) -> Result<&Project, ProjectError> {
    self
      .projects
      .get(id)
      .ok_or_else(|| ProjectError::UnknownProject(id.to_string()))
  }

  pub fn project_mut(&mut self, id: &ProjectId) -> Result<&mut Project, ProjectError> {
    self
      .projects
      .get_mut(id)
      .ok_or_else(|| ProjectError::UnknownProject(id.to_string()))
  }

  /// Insert a project unless one with the same name is cached already.
  pub fn insert(&mut self, project: Project) -> ProjectId {
    let id = project.id();
    self.projects.entry(id.clone()).or_insert(project);
    id
  }

  pub fn len(&self) -> usize {
    self.projects.len()
  }

  pub fn is_empty(&self) -> bool {
    self.projects.is_empty()
  }

  /// Load the project rooted at `dir` and cache it.
  ///
  /// # Errors
  ///
  /// Fails if `dir` does not exist or its descriptor cannot be read.
  pub fn load_root(&mut self, dir: &Path) -> Result<ProjectId, ProjectError> {
    let dir = dunce::canonicalize(dir).map_err(|_| ProjectError::NotFound(dir.to_path_buf()))?;
    if !dir.is_dir() {
      return Err(ProjectError::NotFound(dir));
    }

    let descriptor = descriptor::load(&dir)?;
    let id = ProjectId::new(&descriptor.name);
    if self.projects.get(&id).is_some_and(Project::is_resolved) {
      return Ok(id);
    }

    info!(project = %descriptor.name, path = %dir.display(), "loaded project");
    let project = self
      .projects
      .entry(id.clone())
      .or_insert_with(|| Project::placeholder(&descriptor.name));
    apply_descriptor(project, &dir, descriptor);
    Ok(id)
  }

  /// Resolve a reference to a cached project.
  ///
  /// Looks in the cache, then in `hints` followed by the global search
  /// directories, then among registered factories. A name found nowhere
  /// becomes an unresolved placeholder; that is not an error.
  pub fn find_project(&mut self, reference: &ProjectReference, hints: &[PathBuf]) -> Result<ProjectId, ProjectError> {
    let id = reference.id();

    if let Some(project) = self.projects.get_mut(&id) {
      if project.is_resolved() {
        debug!(project = %id, "project cache hit");
        project.absorb(reference);
        return Ok(id);
      }
    }

    if let Some(dir) = self.locate(&reference.name, hints) {
      let descriptor = descriptor::load(&dir)?;
      let project = self
        .projects
        .entry(id.clone())
        .or_insert_with(|| Project::placeholder(&reference.name));
      apply_descriptor(project, &dir, descriptor);
      project.absorb(reference);
      return Ok(id);
    }

    let project = match self.projects.remove(&id) {
      Some(existing) => existing,
      None => match self.factories.get(&id) {
        Some(factory) => {
          debug!(project = %id, "project created from factory");
          factory()
        }
        None => {
          info!(project = %reference.name, "project not found locally; it will be fetched when needed");
          Project::placeholder(&reference.name)
        }
      },
    };
    let project = self.projects.entry(id.clone()).or_insert(project);
    project.absorb(reference);
    Ok(id)
  }

  /// Search `hints`, then the global search directories, for a project.
  ///
  /// A directory matches when it holds a descriptor declaring `name`, or
  /// when one of its children is a directory named `name` (ignoring case).
  pub fn locate(&self, name: &str, hints: &[PathBuf]) -> Option<PathBuf> {
    for dir in hints.iter().chain(&self.search_dirs) {
      if !dir.is_dir() {
        continue;
      }

      if descriptor::has_descriptor(dir)
        && descriptor::load(dir).is_ok_and(|d| d.name.eq_ignore_ascii_case(name))
      {
        return Some(canonical(dir));
      }

      let child = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .find(|entry| entry.file_type().is_dir() && entry.file_name().to_string_lossy().eq_ignore_ascii_case(name));
      if let Some(entry) = child {
        debug!(project = name, path = %entry.path().display(), "located project directory");
        return Some(canonical(entry.path()));
      }
    }
    None
  }

  /// Bind a cached project to a freshly fetched source directory.
  pub fn bind(&mut self, id: &ProjectId, dir: &Path) -> Result<(), ProjectError> {
    let descriptor = descriptor::load(dir)?;
    let project = self.project_mut(id)?;
    apply_descriptor(project, &canonical(dir), descriptor);
    Ok(())
  }
}

fn apply_descriptor(project: &mut Project, dir: &Path, descriptor: Descriptor) {
  if project.account.is_none() {
    project.account = descriptor.account;
  }
  if project.url.is_none() {
    project.url = descriptor.url;
  }
  if project.revision.is_none() {
    project.revision = descriptor.revision;
  }
  project.bind(dir, descriptor.raw);
}

fn canonical(path: &Path) -> PathBuf {
  dunce::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::ConfigTable;
  use crate::util::testutil::write_project;
  use serde_json::json;
  use serial_test::serial;
  use tempfile::TempDir;
  use tracing_test::traced_test;

  #[test]
  fn finds_project_directory_in_hints() {
    let temp = TempDir::new().unwrap();
    write_project(temp.path(), "zlib", json!({ "name": "zlib" }));

    let mut cache = ProjectCache::new();
    let id = cache
      .find_project(&ProjectReference::named("ZLIB"), &[temp.path().to_path_buf()])
      .unwrap();

    let project = cache.get(&id).unwrap();
    assert!(project.is_resolved());
    assert_eq!(project.name, "ZLIB");
    assert!(project.path.as_ref().unwrap().ends_with("zlib"));
  }

  #[test]
  fn directory_without_descriptor_still_resolves() {
    let temp = TempDir::new().unwrap();
    std::fs::create_dir(temp.path().join("plain")).unwrap();

    let mut cache = ProjectCache::new();
    let id = cache
      .find_project(&ProjectReference::named("plain"), &[temp.path().to_path_buf()])
      .unwrap();
    assert!(cache.get(&id).unwrap().is_resolved());
  }

  #[test]
  fn hint_directory_holding_the_descriptor_matches() {
    let temp = TempDir::new().unwrap();
    let dir = write_project(temp.path(), "checkout", json!({ "name": "fmt" }));

    let mut cache = ProjectCache::new();
    let id = cache.find_project(&ProjectReference::named("fmt"), &[dir]).unwrap();
    assert!(cache.get(&id).unwrap().path.as_ref().unwrap().ends_with("checkout"));
  }

  #[test]
  #[traced_test]
  fn missing_project_becomes_placeholder() {
    let mut cache = ProjectCache::new();
    let id = cache.find_project(&ProjectReference::named("nowhere"), &[]).unwrap();

    let project = cache.get(&id).unwrap();
    assert!(!project.is_resolved());
    assert!(project.raw().is_none());
    assert!(logs_contain("not found locally"));
  }

  #[test]
  fn cached_instance_is_reused() {
    let temp = TempDir::new().unwrap();
    write_project(temp.path(), "zlib", json!({}));
    let hints = [temp.path().to_path_buf()];

    let mut cache = ProjectCache::new();
    let first = cache.find_project(&ProjectReference::named("zlib"), &hints).unwrap();
    let second = cache
      .find_project(
        &ProjectReference {
          name: "Zlib".into(),
          revision: Some("v1.3".into()),
          ..ProjectReference::default()
        },
        &[],
      )
      .unwrap();

    assert_eq!(first, second);
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.get(&first).unwrap().revision.as_deref(), Some("v1.3"));
  }

  #[test]
  fn factory_projects_carry_configuration() {
    fn make() -> Project {
      let mut project = Project::with_config("gtest", ConfigTable::from_json(&json!({ "build_tests": false })).unwrap());
      project.url = Some("https://github.com/google/googletest.git".into());
      project
    }

    let mut cache = ProjectCache::new();
    cache.register_factory("gtest", make);
    let id = cache.find_project(&ProjectReference::named("GTest"), &[]).unwrap();

    let project = cache.get(&id).unwrap();
    assert!(!project.is_resolved());
    assert!(project.raw().is_some());
  }

  #[test]
  fn load_root_rejects_missing_directory() {
    let mut cache = ProjectCache::new();
    assert!(matches!(
      cache.load_root(Path::new("/definitely/not/here")),
      Err(ProjectError::NotFound(_))
    ));
  }

  #[test]
  #[serial]
  fn search_dirs_come_from_environment() {
    let temp = TempDir::new().unwrap();
    write_project(temp.path(), "json", json!({}));
    let joined = std::env::join_paths([temp.path()]).unwrap();

    temp_env::with_var(SEARCH_PATH_ENV, Some(joined), || {
      let mut cache = ProjectCache::from_env();
      assert_eq!(cache.search_dirs(), &[temp.path().to_path_buf()]);
      let id = cache.find_project(&ProjectReference::named("json"), &[]).unwrap();
      assert!(cache.get(&id).unwrap().is_resolved());
    });
  }
}

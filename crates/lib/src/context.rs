//! The build session.
//!
//! [`BuildContext`] owns everything a run shares: the project cache, the
//! action and import registries, and the shell with its scope stack. Actions
//! receive it mutably and switch the current project with
//! [`BuildContext::with_project`].

use std::collections::BTreeMap;
use std::path::Path;
use std::rc::Rc;

use tracing::{debug, info, warn};

use crate::action::fetch::{GitFetcher, SourceFetcher};
use crate::action::tool::{BuildTool, CMake};
use crate::action::{ActionError, ActionRegistry};
use crate::config::{ConfigError, ConfigResolver, ResolvedConfig};
use crate::consts::PACKAGE_RETRIES;
use crate::imports::ImportRegistry;
use crate::project::{Project, ProjectCache, ProjectError, ProjectGraph, ProjectId};
use crate::shell::{self, ExecOptions, Shell, ShellError};
use crate::spec::BuildSpec;
use crate::util::unique::UniqueList;
use crate::vars::Variables;

pub struct BuildContext {
  pub spec: BuildSpec,
  pub resolver: ConfigResolver,
  pub projects: ProjectCache,
  pub actions: ActionRegistry,
  pub imports: ImportRegistry,
  pub shell: Shell,
  /// Extra substitution variables applied to every project.
  pub variables: Variables,
  pub build_tool: Rc<dyn BuildTool>,
  pub fetcher: Rc<dyn SourceFetcher>,
  root: ProjectId,
  current: ProjectId,
  depth: usize,
  built: UniqueList<ProjectId>,
  packages_updated: bool,
  reports: Vec<String>,
}

impl BuildContext {
  /// A session building `root`, which must already be in `projects`.
  pub fn new(spec: BuildSpec, projects: ProjectCache, root: ProjectId) -> Result<Self, ConfigError> {
    Ok(Self {
      spec,
      resolver: ConfigResolver::new()?,
      projects,
      actions: ActionRegistry::with_builtins(),
      imports: ImportRegistry::with_builtins(),
      shell: Shell::new(),
      variables: Variables::new(),
      build_tool: Rc::new(CMake),
      fetcher: Rc::new(GitFetcher),
      current: root.clone(),
      root,
      depth: 0,
      built: UniqueList::new(),
      packages_updated: false,
      reports: Vec::new(),
    })
  }

  pub fn with_resolver(mut self, resolver: ConfigResolver) -> Self {
    self.resolver = resolver;
    self
  }

  pub fn with_shell(mut self, shell: Shell) -> Self {
    self.shell = shell;
    self
  }

  pub fn with_variables(mut self, variables: Variables) -> Self {
    self.variables = variables;
    self
  }

  pub fn with_build_tool(mut self, tool: impl BuildTool + 'static) -> Self {
    self.build_tool = Rc::new(tool);
    self
  }

  pub fn with_fetcher(mut self, fetcher: impl SourceFetcher + 'static) -> Self {
    self.fetcher = Rc::new(fetcher);
    self
  }

  pub fn root(&self) -> &ProjectId {
    &self.root
  }

  /// The project actions currently apply to.
  pub fn project_id(&self) -> &ProjectId {
    &self.current
  }

  pub fn is_root(&self) -> bool {
    self.current == self.root
  }

  pub fn project(&self) -> Result<&Project, ProjectError> {
    self.projects.project(&self.current)
  }

  pub fn project_mut(&mut self) -> Result<&mut Project, ProjectError> {
    self.projects.project_mut(&self.current)
  }

  /// The current project's resolved configuration.
  pub fn config(&mut self) -> Result<ResolvedConfig, ActionError> {
    let id = self.current.clone();
    self.config_of(&id)
  }

  pub fn config_of(&mut self, id: &ProjectId) -> Result<ResolvedConfig, ActionError> {
    let project = self.projects.project_mut(id)?;
    Ok(project.config(&self.resolver, &self.spec, &self.variables)?.clone())
  }

  /// Variables for substituting steps: the current project's when its
  /// configuration has been resolved, otherwise the session extras.
  pub fn step_variables(&self) -> Variables {
    self
      .projects
      .get(&self.current)
      .and_then(Project::cached_config)
      .map(|config| config.variables.clone())
      .unwrap_or_else(|| self.variables.clone())
  }

  pub fn graph(&mut self) -> ProjectGraph<'_> {
    ProjectGraph::new(&mut self.projects, &self.resolver, &self.spec, &self.variables)
  }

  /// Run `f` with `id` as the current project.
  pub fn with_project<T>(&mut self, id: &ProjectId, f: impl FnOnce(&mut Self) -> T) -> T {
    let previous = std::mem::replace(&mut self.current, id.clone());
    debug!(project = %id, "entering project");
    let result = f(self);
    self.current = previous;
    result
  }

  /// Run `f` inside a shell scope, releasing it whatever `f` returns.
  pub fn scoped<T>(
    &mut self,
    dir: Option<&Path>,
    env: BTreeMap<String, String>,
    f: impl FnOnce(&mut Self) -> T,
  ) -> T {
    shell::in_scope(self, dir, env, f)
  }

  pub fn action_depth(&self) -> usize {
    self.depth
  }

  pub(crate) fn enter_action(&mut self) {
    self.depth += 1;
  }

  pub(crate) fn leave_action(&mut self) {
    self.depth = self.depth.saturating_sub(1);
  }

  /// Record that `id` has been built. Returns false if it already was.
  pub fn mark_built(&mut self, id: &ProjectId) -> bool {
    self.built.push(id.clone())
  }

  pub fn is_built(&self, id: &ProjectId) -> bool {
    self.built.contains(id)
  }

  /// Output lines produced by reporting actions.
  pub fn reports(&self) -> &[String] {
    &self.reports
  }

  pub fn report(&mut self, line: impl Into<String>) {
    self.reports.push(line.into());
  }

  /// Make sure the source of `id` is on disk, fetching it into the root
  /// project's `deps_dir` when it is not.
  pub fn ensure_source(&mut self, id: &ProjectId) -> Result<(), ActionError> {
    if self.projects.project(id)?.is_resolved() {
      return Ok(());
    }

    let root = self.root.clone();
    let deps_dir = self
      .config_of(&root)?
      .get_path("deps_dir")
      .ok_or_else(|| ActionError::Unfetchable(id.to_string()))?;
    let project = self.projects.project(id)?;
    let dest = deps_dir.join(&project.name);

    info!(project = %project.name, dest = %dest.display(), "fetching project source");
    let fetcher = Rc::clone(&self.fetcher);
    fetcher.fetch(&mut self.shell, project, &dest)?;
    self.projects.bind(id, &dest)?;
    Ok(())
  }

  /// Install system packages with the host's package tool.
  ///
  /// The package index is updated once per session, before the first
  /// installation.
  pub fn install_packages(&mut self, config: &ResolvedConfig, packages: &[String]) -> Result<(), ShellError> {
    if packages.is_empty() {
      return Ok(());
    }
    let sudo = config.get_bool("sudo");

    if !self.packages_updated {
      if let Some(update) = config.get_str("pkg_update") {
        self.package_command(sudo, update, &[])?;
      }
      self.packages_updated = true;
    }

    match config.get_str("pkg_install") {
      Some(install) => {
        info!(packages = ?packages, "installing packages");
        self.package_command(sudo, install, packages)
      }
      None => {
        warn!(host = config.spec.host(), "no package install command for host");
        Ok(())
      }
    }
  }

  fn package_command(&mut self, sudo: bool, command: &str, packages: &[String]) -> Result<(), ShellError> {
    let mut argv: Vec<String> = Vec::new();
    if sudo {
      argv.push("sudo".into());
    }
    argv.extend(command.split_whitespace().map(str::to_string));
    argv.extend(packages.iter().cloned());
    self.shell.exec(&argv, &ExecOptions::default().retries(PACKAGE_RETRIES))?;
    Ok(())
  }
}

impl AsMut<Shell> for BuildContext {
  fn as_mut(&mut self) -> &mut Shell {
    &mut self.shell
  }
}

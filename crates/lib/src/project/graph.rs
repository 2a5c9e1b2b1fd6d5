//! Dependency and consumer graphs.
//!
//! Edges come from each project's resolved `upstream` (dependencies) and
//! `downstream` (consumers) reference lists. References are turned into
//! cached projects through [`ProjectCache::find_project`], so every name
//! maps to a single node no matter how many paths lead to it.
//!
//! # Ordering
//!
//! - [`ProjectGraph::get_flattened_dependencies`] is post-order: every
//!   dependency precedes everything that depends on it.
//! - [`ProjectGraph::get_flattened_consumers`] is pre-order: each consumer is
//!   followed by its own consumers before the next sibling.
//!
//! In both, the first visit of a project fixes its position. Unresolved
//! projects without configuration are leaves. A cycle is a fatal error.

use std::collections::{BTreeMap, VecDeque};
use std::path::PathBuf;

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use tracing::{debug, trace};

use super::cache::ProjectCache;
use super::types::{ProjectId, ProjectReference};
use super::ProjectError;
use crate::config::ConfigResolver;
use crate::spec::BuildSpec;
use crate::util::unique::UniqueList;
use crate::vars::Variables;

/// Which reference list to follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
  Upstream,
  Downstream,
}

impl Direction {
  pub fn key(&self) -> &'static str {
    match self {
      Self::Upstream => "upstream",
      Self::Downstream => "downstream",
    }
  }
}

type Adjacency = BTreeMap<ProjectId, Vec<ProjectId>>;

/// Graph queries for one build specification.
pub struct ProjectGraph<'a> {
  cache: &'a mut ProjectCache,
  resolver: &'a ConfigResolver,
  spec: &'a BuildSpec,
  variables: &'a Variables,
}

impl<'a> ProjectGraph<'a> {
  pub fn new(
    cache: &'a mut ProjectCache,
    resolver: &'a ConfigResolver,
    spec: &'a BuildSpec,
    variables: &'a Variables,
  ) -> Self {
    Self {
      cache,
      resolver,
      spec,
      variables,
    }
  }

  /// Direct dependencies of `id` that apply to the current target.
  pub fn get_dependencies(&mut self, id: &ProjectId) -> Result<Vec<ProjectId>, ProjectError> {
    self.direct(id, Direction::Upstream)
  }

  /// Direct consumers of `id` that apply to the current target.
  pub fn get_consumers(&mut self, id: &ProjectId) -> Result<Vec<ProjectId>, ProjectError> {
    self.direct(id, Direction::Downstream)
  }

  /// All transitive dependencies in build order.
  pub fn get_flattened_dependencies(
    &mut self,
    id: &ProjectId,
    include_self: bool,
  ) -> Result<Vec<ProjectId>, ProjectError> {
    let adjacency = self.explore(id, Direction::Upstream)?;
    check_acyclic(&adjacency)?;

    let mut out = UniqueList::new();
    post_order(id, &adjacency, &mut out);
    let mut ordered = out.into_vec();
    if !include_self {
      ordered.retain(|p| p != id);
    }
    debug!(project = %id, count = ordered.len(), "flattened dependencies");
    Ok(ordered)
  }

  /// All transitive consumers, each followed by its own consumers.
  pub fn get_flattened_consumers(
    &mut self,
    id: &ProjectId,
    include_self: bool,
  ) -> Result<Vec<ProjectId>, ProjectError> {
    let adjacency = self.explore(id, Direction::Downstream)?;
    check_acyclic(&adjacency)?;

    let mut out = UniqueList::new();
    pre_order(id, &adjacency, &mut out);
    let mut ordered = out.into_vec();
    if !include_self {
      ordered.retain(|p| p != id);
    }
    debug!(project = %id, count = ordered.len(), "flattened consumers");
    Ok(ordered)
  }

  fn direct(&mut self, id: &ProjectId, direction: Direction) -> Result<Vec<ProjectId>, ProjectError> {
    let (references, hints) = self.references(id, direction)?;

    let mut out = UniqueList::new();
    for reference in &references {
      if !reference.matches_target(self.spec.target()) {
        trace!(project = %id, reference = %reference.name, "skipped for target");
        continue;
      }
      out.push(self.cache.find_project(reference, &hints)?);
    }
    Ok(out.into_vec())
  }

  /// The reference list of `id` and the directories to search for them.
  fn references(
    &mut self,
    id: &ProjectId,
    direction: Direction,
  ) -> Result<(Vec<ProjectReference>, Vec<PathBuf>), ProjectError> {
    let project = self.cache.project_mut(id)?;
    if project.raw().is_none() {
      return Ok((Vec::new(), Vec::new()));
    }

    let sibling_dir = project.path.as_ref().and_then(|p| p.parent()).map(PathBuf::from);
    let config = project.config(self.resolver, self.spec, self.variables)?;
    let references = config
      .get_list(direction.key())
      .iter()
      .map(ProjectReference::from_value)
      .collect::<Result<Vec<_>, _>>()?;

    let mut hints = Vec::new();
    hints.extend(config.get_path("deps_dir"));
    hints.extend(sibling_dir);
    Ok((references, hints))
  }

  fn explore(&mut self, root: &ProjectId, direction: Direction) -> Result<Adjacency, ProjectError> {
    let mut adjacency = Adjacency::new();
    let mut queue = VecDeque::from([root.clone()]);

    while let Some(id) = queue.pop_front() {
      if adjacency.contains_key(&id) {
        continue;
      }
      let next = self.direct(&id, direction)?;
      queue.extend(next.iter().cloned());
      adjacency.insert(id, next);
    }
    Ok(adjacency)
  }
}

fn check_acyclic(adjacency: &Adjacency) -> Result<(), ProjectError> {
  let mut graph: DiGraph<&ProjectId, ()> = DiGraph::new();
  let mut nodes: BTreeMap<&ProjectId, NodeIndex> = BTreeMap::new();

  for id in adjacency.keys() {
    nodes.insert(id, graph.add_node(id));
  }
  for (from, targets) in adjacency {
    for to in targets {
      if let (Some(&a), Some(&b)) = (nodes.get(from), nodes.get(to)) {
        graph.add_edge(a, b, ());
      }
    }
  }

  toposort(&graph, None).map(|_| ()).map_err(|cycle| ProjectError::Cycle {
    project: graph[cycle.node_id()].to_string(),
  })
}

fn post_order(id: &ProjectId, adjacency: &Adjacency, out: &mut UniqueList<ProjectId>) {
  if out.contains(id) {
    return;
  }
  for next in adjacency.get(id).into_iter().flatten() {
    post_order(next, adjacency, out);
  }
  out.push(id.clone());
}

fn pre_order(id: &ProjectId, adjacency: &Adjacency, out: &mut UniqueList<ProjectId>) {
  if !out.push(id.clone()) {
    return;
  }
  for next in adjacency.get(id).into_iter().flatten() {
    pre_order(next, adjacency, out);
  }
}

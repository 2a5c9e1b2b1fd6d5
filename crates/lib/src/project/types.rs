//! Projects and references to them.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

use super::ProjectError;
use crate::config::{ConfigError, ConfigResolver, ConfigTable, ResolveRequest, ResolvedConfig};
use crate::spec::BuildSpec;
use crate::util::hash::ContentHash;
use crate::util::unique::UniqueKey;
use crate::vars::Variables;

/// Cache key of a project: its lowercase name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProjectId(String);

impl ProjectId {
  pub fn new(name: &str) -> Self {
    Self(name.to_ascii_lowercase())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for ProjectId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

impl UniqueKey for ProjectId {
  type Key = ProjectId;

  fn unique_key(&self) -> ProjectId {
    self.clone()
  }
}

/// A not-yet-resolved pointer to a project, as written in `upstream` and
/// `downstream` lists.
///
/// Either a bare name (`"zlib"`) or an object:
///
/// ```json
/// { "name": "zlib", "revision": "v1.3", "targets": ["linux"], "config": { "build_type": "Release" } }
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectReference {
  pub name: String,
  pub url: Option<String>,
  pub revision: Option<String>,
  /// Only include the reference when building for one of these targets.
  pub targets: Option<Vec<String>>,
  /// Overrides applied when resolving the referenced project.
  pub config: ConfigTable,
}

impl ProjectReference {
  pub fn named(name: &str) -> Self {
    Self {
      name: name.to_string(),
      ..Self::default()
    }
  }

  pub fn id(&self) -> ProjectId {
    ProjectId::new(&self.name)
  }

  pub fn from_value(value: &Value) -> Result<Self, ProjectError> {
    match value {
      Value::String(name) if !name.trim().is_empty() => Ok(Self::named(name.trim())),
      Value::Object(object) => {
        let name = object
          .get("name")
          .and_then(Value::as_str)
          .filter(|name| !name.is_empty())
          .ok_or_else(|| ProjectError::InvalidReference(value.to_string()))?;
        let text = |key: &str| object.get(key).and_then(Value::as_str).map(str::to_string);
        let targets = match object.get("targets") {
          None | Some(Value::Null) => None,
          Some(Value::Array(items)) => Some(
            items
              .iter()
              .filter_map(Value::as_str)
              .map(str::to_ascii_lowercase)
              .collect(),
          ),
          Some(_) => return Err(ProjectError::InvalidReference(value.to_string())),
        };
        let config = match object.get("config") {
          Some(config) => ConfigTable::from_json(config)?,
          None => ConfigTable::new(),
        };
        Ok(Self {
          name: name.to_string(),
          url: text("url"),
          revision: text("revision"),
          targets,
          config,
        })
      }
      _ => Err(ProjectError::InvalidReference(value.to_string())),
    }
  }

  /// Whether this reference applies when building for `target`.
  pub fn matches_target(&self, target: &str) -> bool {
    self
      .targets
      .as_ref()
      .is_none_or(|targets| targets.iter().any(|t| t == target))
  }
}

/// A project: a named source tree with a configuration.
///
/// A project is resolved when its source is on disk (`path` is set).
/// Unresolved projects are placeholders carrying a name until they are
/// fetched.
#[derive(Debug, Clone, Default)]
pub struct Project {
  pub name: String,
  pub account: Option<String>,
  pub url: Option<String>,
  pub path: Option<PathBuf>,
  pub revision: Option<String>,
  variant: Option<String>,
  overrides: ConfigTable,
  raw: Option<ConfigTable>,
  resolved: Option<(ContentHash, ResolvedConfig)>,
}

impl Project {
  /// A name-only placeholder.
  pub fn placeholder(name: &str) -> Self {
    Self {
      name: name.to_string(),
      ..Self::default()
    }
  }

  /// A project with a raw configuration but no source on disk, as produced
  /// by a registered project factory.
  pub fn with_config(name: &str, raw: ConfigTable) -> Self {
    Self {
      name: name.to_string(),
      raw: Some(raw),
      ..Self::default()
    }
  }

  pub fn id(&self) -> ProjectId {
    ProjectId::new(&self.name)
  }

  pub fn is_resolved(&self) -> bool {
    self.path.is_some()
  }

  pub fn raw(&self) -> Option<&ConfigTable> {
    self.raw.as_ref()
  }

  pub fn variant(&self) -> Option<&str> {
    self.variant.as_deref()
  }

  pub fn overrides(&self) -> &ConfigTable {
    &self.overrides
  }

  /// Bind the project to a source directory and its descriptor contents.
  pub fn bind(&mut self, path: &Path, raw: ConfigTable) {
    debug!(project = %self.name, path = %path.display(), "binding project source");
    self.path = Some(path.to_path_buf());
    self.raw = Some(raw);
    self.invalidate();
  }

  pub fn set_variant(&mut self, variant: Option<&str>) {
    let variant = variant.map(str::to_ascii_lowercase);
    if self.variant != variant {
      self.variant = variant;
      self.invalidate();
    }
  }

  pub fn set_overrides(&mut self, overrides: ConfigTable) {
    self.overrides = overrides;
    self.invalidate();
  }

  /// Drop the cached configuration.
  pub fn invalidate(&mut self) {
    self.resolved = None;
  }

  /// Fill fields this project lacks from a reference to it.
  pub fn absorb(&mut self, reference: &ProjectReference) {
    if self.revision.is_none() {
      self.revision.clone_from(&reference.revision);
    }
    if self.url.is_none() {
      self.url.clone_from(&reference.url);
    }
    if self.overrides.is_empty() && !reference.config.is_empty() {
      self.set_overrides(reference.config.clone());
    }
  }

  /// The project's resolved configuration for `spec`.
  ///
  /// Resolution happens once per spec, variant, overrides and variables;
  /// later calls with the same inputs return the cached result.
  ///
  /// # Errors
  ///
  /// Fails with [`ConfigError::UnresolvedProject`] when the project has
  /// neither source on disk nor a raw configuration.
  pub fn config(
    &mut self,
    resolver: &ConfigResolver,
    spec: &BuildSpec,
    variables: &Variables,
  ) -> Result<&ResolvedConfig, ConfigError> {
    let raw = self
      .raw
      .as_ref()
      .ok_or_else(|| ConfigError::UnresolvedProject(self.name.clone()))?;

    let fingerprint = ContentHash::of_value(&json!({
      "spec": spec.name(),
      "variant": self.variant,
      "overrides": self.overrides.to_json(),
      "variables": variables,
      "path": self.path,
    }));

    let fresh = matches!(&self.resolved, Some((cached, _)) if *cached == fingerprint);
    if !fresh {
      let source_dir = self.path.clone().unwrap_or_else(|| PathBuf::from(&self.name));
      let request = ResolveRequest::new(&self.name, &source_dir, raw)
        .overrides(&self.overrides)
        .variant(self.variant.as_deref())
        .variables(variables);
      let resolved = resolver.resolve(spec, &request)?;
      self.resolved = Some((fingerprint, resolved));
    }

    self
      .resolved
      .as_ref()
      .map(|(_, config)| config)
      .ok_or_else(|| ConfigError::UnresolvedProject(self.name.clone()))
  }

  /// The cached configuration, if one has been resolved.
  pub fn cached_config(&self) -> Option<&ResolvedConfig> {
    self.resolved.as_ref().map(|(_, config)| config)
  }
}

impl UniqueKey for Project {
  type Key = ProjectId;

  fn unique_key(&self) -> ProjectId {
    self.id()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn reference_from_bare_name() {
    let reference = ProjectReference::from_value(&json!("ZLib")).unwrap();
    assert_eq!(reference.name, "ZLib");
    assert_eq!(reference.id().as_str(), "zlib");
    assert!(reference.matches_target("windows"));
  }

  #[test]
  fn reference_from_object() {
    let reference = ProjectReference::from_value(&json!({
      "name": "openssl",
      "revision": "3.0",
      "targets": ["Linux", "macos"],
      "config": { "!cmake_args": ["-DNO_ASM=1"] },
    }))
    .unwrap();

    assert_eq!(reference.revision.as_deref(), Some("3.0"));
    assert!(reference.matches_target("linux"));
    assert!(!reference.matches_target("windows"));
    assert!(reference.config.get("cmake_args").is_some());
  }

  #[test]
  fn invalid_references() {
    assert!(ProjectReference::from_value(&json!(42)).is_err());
    assert!(ProjectReference::from_value(&json!({ "revision": "1" })).is_err());
    assert!(ProjectReference::from_value(&json!({ "name": "x", "targets": "linux" })).is_err());
  }

  #[test]
  fn placeholder_is_unresolved_and_has_no_config() {
    let mut project = Project::placeholder("missing");
    assert!(!project.is_resolved());

    let resolver = ConfigResolver::new().unwrap();
    let spec = BuildSpec::parse("ubuntu-gcc-9-linux-x64").unwrap();
    let err = project.config(&resolver, &spec, &Variables::new()).unwrap_err();
    assert!(matches!(err, ConfigError::UnresolvedProject(name) if name == "missing"));
  }

  #[test]
  fn config_is_cached_until_variant_changes() {
    let raw = ConfigTable::from_json(&json!({
      "build_type": "Debug",
      "variants": { "release": { "build_type": "Release" } },
    }))
    .unwrap();
    let mut project = Project::placeholder("demo");
    project.bind(Path::new("/src/demo"), raw);

    let resolver = ConfigResolver::new().unwrap();
    let spec = BuildSpec::parse("ubuntu-gcc-9-linux-x64").unwrap();
    let vars = Variables::new();

    let base = project.config(&resolver, &spec, &vars).unwrap().clone();
    assert_eq!(base.get_str("build_type"), Some("Debug"));
    assert!(base.variants.contains_key("release"));
    assert_eq!(project.cached_config(), Some(&base));

    project.set_variant(Some("Release"));
    assert!(project.cached_config().is_none());
    let release = project.config(&resolver, &spec, &vars).unwrap();
    assert_eq!(release.get_str("build_type"), Some("Release"));
  }

  #[test]
  fn absorb_only_fills_missing_fields() {
    let mut project = Project::placeholder("zlib");
    project.revision = Some("v1".into());

    let reference = ProjectReference {
      name: "zlib".into(),
      url: Some("https://example.com/zlib.git".into()),
      revision: Some("v2".into()),
      targets: None,
      config: ConfigTable::from_json(&json!({ "build_type": "Release" })).unwrap(),
    };
    project.absorb(&reference);

    assert_eq!(project.revision.as_deref(), Some("v1"));
    assert_eq!(project.url.as_deref(), Some("https://example.com/zlib.git"));
    assert!(!project.overrides().is_empty());
  }
}

//! Resolution of a project's configuration for one build specification.
//!
//! [`ConfigResolver::resolve`] walks the configuration hierarchy, folds every
//! registry key over it, applies caller overrides, and finally substitutes
//! variables throughout. The result is a [`ResolvedConfig`] holding exactly
//! the registry keys, the variables used, and (for the base resolution) one
//! resolved configuration per project variant.
//!
//! # Source Order
//!
//! 1. builtin defaults
//! 2. `architectures.<alias>` for each alias of the spec's arch
//! 3. `hosts.<running host>` when it differs from the spec host
//! 4. `hosts.<spec host>`
//! 5. `targets.<target>`
//! 6. `compilers.<compiler>`, then its `versions.<version>`
//! 7. the platform table for `<target>-<arch>`
//! 8. the project descriptor
//! 9. the requested variant
//!
//! Steps 2 to 6 are applied to every table as it is visited, so a project
//! descriptor can carry its own nested `hosts`/`compilers`/... sections.
//! A `versions` section is only read from inside a `compilers` section.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use super::ConfigError;
use super::keys::{self, KEYS, MergePolicy, PACKAGE_KEYS, PATH_KEYS, PKG_TOOL, VARIABLES};
use super::merge::{Candidate, Layer, empty_like, fold_key, fold_named, merge_value};
use super::table::{ConfigTable, Directive, Section};
use crate::consts::MAX_SOURCE_DEPTH;
use crate::data::{self, DEFAULT_COMPILER, DEFAULT_VERSION};
use crate::platform::current_host;
use crate::spec::BuildSpec;
use crate::util::unique::UniqueList;
use crate::vars::{self, Variables, resolve_variables, substitute_value};

/// What to resolve: one project's raw configuration plus caller additions.
#[derive(Debug, Clone, Copy)]
pub struct ResolveRequest<'a> {
  pub project: &'a str,
  pub source_dir: &'a Path,
  pub raw: &'a ConfigTable,
  pub overrides: Option<&'a ConfigTable>,
  pub variant: Option<&'a str>,
  pub variables: Option<&'a Variables>,
}

impl<'a> ResolveRequest<'a> {
  pub fn new(project: &'a str, source_dir: &'a Path, raw: &'a ConfigTable) -> Self {
    Self {
      project,
      source_dir,
      raw,
      overrides: None,
      variant: None,
      variables: None,
    }
  }

  pub fn overrides(mut self, overrides: &'a ConfigTable) -> Self {
    self.overrides = Some(overrides);
    self
  }

  pub fn variant(mut self, variant: Option<&'a str>) -> Self {
    self.variant = variant;
    self
  }

  pub fn variables(mut self, variables: &'a Variables) -> Self {
    self.variables = Some(variables);
    self
  }
}

/// A fully merged, fully substituted configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedConfig {
  pub spec: BuildSpec,
  pub project: String,
  pub variant: Option<String>,
  pub source_dir: PathBuf,
  pub values: BTreeMap<String, Value>,
  pub variables: Variables,
  pub variants: BTreeMap<String, ResolvedConfig>,
}

impl ResolvedConfig {
  pub fn get(&self, key: &str) -> Option<&Value> {
    self.values.get(key)
  }

  /// A string value, `None` when unset, null or empty.
  pub fn get_str(&self, key: &str) -> Option<&str> {
    self.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
  }

  pub fn get_bool(&self, key: &str) -> bool {
    match self.get(key) {
      Some(Value::Bool(b)) => *b,
      Some(Value::String(s)) => matches!(s.as_str(), "true" | "1" | "yes" | "on"),
      _ => false,
    }
  }

  pub fn get_list(&self, key: &str) -> &[Value] {
    self.get(key).and_then(Value::as_array).map(Vec::as_slice).unwrap_or(&[])
  }

  /// A list rendered to strings, empty items dropped.
  pub fn get_strings(&self, key: &str) -> Vec<String> {
    self
      .get_list(key)
      .iter()
      .map(vars::stringify)
      .filter(|s| !s.is_empty())
      .collect()
  }

  /// A mapping rendered to string values.
  pub fn get_env(&self, key: &str) -> BTreeMap<String, String> {
    self
      .get(key)
      .and_then(Value::as_object)
      .map(|map| map.iter().map(|(k, v)| (k.clone(), vars::stringify(v))).collect())
      .unwrap_or_default()
  }

  pub fn get_path(&self, key: &str) -> Option<PathBuf> {
    self.get_str(key).map(PathBuf::from)
  }

  /// The resolved configuration of a variant, or `self` when `name` is `None`.
  pub fn variant_config(&self, name: Option<&str>) -> Option<&ResolvedConfig> {
    match name {
      Some(name) => self.variants.get(name),
      None => Some(self),
    }
  }

  /// JSON form used by `print-config`.
  pub fn to_json(&self) -> Value {
    let mut object: Map<String, Value> = self.values.clone().into_iter().collect();
    object.insert("spec".into(), Value::String(self.spec.name()));
    object.insert("project".into(), Value::String(self.project.clone()));
    object.insert("source_dir".into(), Value::String(path_string(&self.source_dir)));
    if !self.variants.is_empty() {
      let variants = self.variants.iter().map(|(k, v)| (k.clone(), v.to_json())).collect();
      object.insert("variants".into(), Value::Object(variants));
    }
    Value::Object(object)
  }
}

/// Resolves configurations against the builtin tables.
#[derive(Debug, Clone)]
pub struct ConfigResolver {
  builtin: ConfigTable,
  current_host: String,
}

impl ConfigResolver {
  pub fn new() -> Result<Self, ConfigError> {
    Ok(Self {
      builtin: ConfigTable::from_json(&data::builtin_table())?,
      current_host: current_host(),
    })
  }

  /// Override the detected running host.
  pub fn with_current_host(mut self, host: impl Into<String>) -> Self {
    self.current_host = host.into();
    self
  }

  pub fn with_builtin(mut self, builtin: ConfigTable) -> Self {
    self.builtin = builtin;
    self
  }

  /// Resolve a configuration.
  ///
  /// When no variant is requested, every variant the project declares is
  /// resolved too and attached under [`ResolvedConfig::variants`].
  pub fn resolve(&self, spec: &BuildSpec, request: &ResolveRequest<'_>) -> Result<ResolvedConfig, ConfigError> {
    let mut resolved = self.resolve_one(spec, request, request.variant)?;

    if request.variant.is_none() {
      for (name, _) in request.raw.sections(Section::Variants) {
        let variant = self.resolve_one(spec, request, Some(name))?;
        resolved.variants.insert(name.to_string(), variant);
      }
    }

    Ok(resolved)
  }

  fn resolve_one(
    &self,
    spec: &BuildSpec,
    request: &ResolveRequest<'_>,
    variant: Option<&str>,
  ) -> Result<ResolvedConfig, ConfigError> {
    let platform = data::platform_table(spec.target(), spec.arch())
      .map(|table| ConfigTable::from_json(&table))
      .transpose()?;
    let variant_table = match variant {
      Some(name) => Some(
        request
          .raw
          .section(Section::Variants, name)
          .ok_or_else(|| ConfigError::UnknownVariant {
            project: request.project.to_string(),
            variant: name.to_string(),
          })?,
      ),
      None => None,
    };

    let candidates = self.candidates(spec, request.raw, platform.as_ref(), variant_table)?;
    debug!(
      project = request.project,
      spec = %spec,
      variant = ?variant,
      sources = candidates.len(),
      "collected configuration sources"
    );

    let mut values = BTreeMap::new();
    for def in KEYS {
      let folded = fold_key(
        def.name,
        def.default_value(),
        def.policy(),
        &candidates,
        request.raw.value(def.name),
      );
      values.insert(def.name.to_string(), folded);
    }

    apply_package_tool(&mut values, &candidates, request.raw);
    discover_toolchain(spec, &mut values);
    if let Some(overrides) = request.overrides {
      apply_overrides(&mut values, overrides);
    }

    let variables = self.variables(spec, request, variant, &mut values)?;
    for value in values.values_mut() {
      *value = substitute_value(value, &variables)?;
    }

    Ok(ResolvedConfig {
      spec: spec.clone(),
      project: request.project.to_string(),
      variant: variant.map(str::to_string),
      source_dir: request.source_dir.to_path_buf(),
      values,
      variables,
      variants: BTreeMap::new(),
    })
  }

  /// Collect the candidate tables in fold order.
  pub fn candidates<'a>(
    &'a self,
    spec: &BuildSpec,
    raw: &'a ConfigTable,
    platform: Option<&'a ConfigTable>,
    variant: Option<&'a ConfigTable>,
  ) -> Result<Vec<Candidate<'a>>, ConfigError> {
    let mut out = UniqueList::new();
    self.collect(spec, &self.builtin, Layer::Builtin, 0, &mut out)?;
    if let Some(platform) = platform {
      self.collect(spec, platform, Layer::Platform, 0, &mut out)?;
    }
    self.collect(spec, raw, Layer::Project, 0, &mut out)?;
    if let Some(variant) = variant {
      self.collect(spec, variant, Layer::Variant, 0, &mut out)?;
    }
    Ok(out.into_vec())
  }

  fn collect<'a>(
    &self,
    spec: &BuildSpec,
    table: &'a ConfigTable,
    layer: Layer,
    depth: usize,
    out: &mut UniqueList<Candidate<'a>>,
  ) -> Result<(), ConfigError> {
    if depth > MAX_SOURCE_DEPTH {
      return Err(ConfigError::NestingTooDeep(MAX_SOURCE_DEPTH));
    }
    if !out.push(Candidate { table, layer }) {
      return Ok(());
    }

    let mut nested: Vec<&'a ConfigTable> = Vec::new();
    for alias in spec.arch().aliases() {
      nested.extend(table.section(Section::Architectures, alias));
    }
    for host in self.host_keys(spec) {
      nested.extend(table.section(Section::Hosts, &host));
    }
    nested.extend(table.section(Section::Targets, spec.target()));
    if let Some(compiler) = table.section(Section::Compilers, spec.compiler()) {
      nested.push(compiler);
      nested.extend(compiler.section(Section::Versions, spec.compiler_version()));
    }

    for child in nested {
      self.collect(spec, child, layer, depth + 1, out)?;
    }
    Ok(())
  }

  /// Host section names to visit: the running host (when it is not the spec
  /// host) and then the spec host, each preceded by its OS family.
  fn host_keys(&self, spec: &BuildSpec) -> Vec<String> {
    let mut hosts = UniqueList::new();
    let mut add = |name: &str| {
      if let Some(info) = data::host(name) {
        hosts.push(info.os.as_str().to_string());
      }
      hosts.push(name.to_string());
    };
    if self.current_host != spec.host() {
      add(&self.current_host);
    }
    add(spec.host());
    hosts.into_vec()
  }

  fn variables(
    &self,
    spec: &BuildSpec,
    request: &ResolveRequest<'_>,
    variant: Option<&str>,
    values: &mut BTreeMap<String, Value>,
  ) -> Result<Variables, ConfigError> {
    let mut base = Variables::new();
    let cwd = std::env::current_dir().map(|p| path_string(&p)).unwrap_or_default();
    for (name, value) in [
      ("host", spec.host().to_string()),
      ("target", spec.target().to_string()),
      ("arch", spec.arch().to_string()),
      ("compiler", spec.compiler().to_string()),
      ("version", spec.compiler_version().to_string()),
      ("cwd", cwd),
      ("project", request.project.to_string()),
      ("source_dir", path_string(request.source_dir)),
    ] {
      base.insert(name.to_string(), Value::String(value));
    }
    if let Some(variant) = variant {
      base.insert("variant".into(), Value::String(variant.to_string()));
    }

    for (name, directive) in request.raw.entries() {
      if !keys::is_known(name) && !keys::is_metadata(name) && !keys::is_package_tool_key(name) {
        base.insert(name.to_string(), directive.value().clone());
      }
    }
    if let Some(Value::Object(declared)) = values.get(VARIABLES) {
      base.extend(declared.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    if let Some(extra) = request.variables {
      base.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
    }

    // Path keys are fixed one at a time so that each can build on the last,
    // and relative paths are anchored at the source directory.
    for key in PATH_KEYS {
      let raw = values.get(key).cloned().unwrap_or(Value::Null);
      let mut scope = resolve_variables(&base)?;
      scope.remove(key);
      let expanded = vars::stringify(&substitute_value(&raw, &scope)?);
      let path = anchor(request.source_dir, &expanded);
      let fixed = Value::String(path_string(&path));
      base.insert(key.to_string(), fixed.clone());
      values.insert(key.to_string(), fixed);
    }

    resolve_variables(&base).map_err(ConfigError::from)
  }
}

/// Derive the generic package keys from their package-tool-specific forms.
///
/// Tool-specific lists are placed before the generic entries; tool-specific
/// scalars replace the generic value.
fn apply_package_tool(values: &mut BTreeMap<String, Value>, candidates: &[Candidate<'_>], raw: &ConfigTable) {
  let Some(tool) = values.get(PKG_TOOL).and_then(Value::as_str).map(str::to_string) else {
    return;
  };

  for (generic, suffix) in PACKAGE_KEYS {
    let tool_key = format!("{tool}_{suffix}");
    let policy = keys::lookup(generic).map_or(MergePolicy::Replace, |def| def.policy());
    let Some(specific) = fold_named(&tool_key, policy, candidates, raw.value(&tool_key)) else {
      continue;
    };
    debug!(key = generic, from = %tool_key, "applying package tool value");

    let current = values.get(generic).cloned().unwrap_or(Value::Null);
    let derived = match (&specific, &current) {
      (Value::Array(_), Value::Array(_)) => merge_value(MergePolicy::Append, &specific, &current),
      _ => specific,
    };
    values.insert(generic.to_string(), derived);
  }
}

/// Fill `c`/`cxx` when no configuration layer set them.
fn discover_toolchain(spec: &BuildSpec, values: &mut BTreeMap<String, Value>) {
  let Some(info) = data::compiler(spec.compiler()) else {
    return;
  };

  let (cc, cxx) = if spec.compiler() == DEFAULT_COMPILER {
    (
      env_or("CC", info.cc),
      env_or("CXX", info.cxx),
    )
  } else if spec.compiler_version() != DEFAULT_VERSION && matches!(spec.compiler(), "gcc" | "clang") {
    let version = spec.compiler_version();
    (format!("{}-{version}", info.cc), format!("{}-{version}", info.cxx))
  } else {
    (info.cc.to_string(), info.cxx.to_string())
  };

  for (key, program) in [("c", cc), ("cxx", cxx)] {
    let slot = values.entry(key.to_string()).or_insert(Value::Null);
    if slot.is_null() {
      debug!(key, program = %program, "discovered compiler");
      *slot = Value::String(program);
    }
  }
}

fn env_or(name: &str, fallback: &str) -> String {
  std::env::var(name)
    .ok()
    .filter(|value| !value.is_empty())
    .unwrap_or_else(|| fallback.to_string())
}

/// Apply caller overrides.
///
/// `!key` resets the key to an empty value of its type and then merges the
/// override in. Keys outside the registry become variables.
fn apply_overrides(values: &mut BTreeMap<String, Value>, overrides: &ConfigTable) {
  for (name, directive) in overrides.entries() {
    let Some(def) = keys::lookup(name) else {
      let declared = values
        .entry(VARIABLES.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
      if let Value::Object(map) = declared {
        map.insert(name.to_string(), directive.value().clone());
      }
      continue;
    };

    let current = values.get(name).cloned().unwrap_or_else(|| def.default_value());
    let next = match directive {
      Directive::Replace(value) => merge_value(def.policy(), &empty_like(&current), value),
      Directive::Append(value) => merge_value(MergePolicy::Append, &current, value),
      Directive::Merge(value) => merge_value(def.policy(), &current, value),
    };
    debug!(key = name, value = %next, "applied override");
    values.insert(name.to_string(), next);
  }
}

fn anchor(source_dir: &Path, path: &str) -> PathBuf {
  let path = Path::new(path);
  if path.is_absolute() {
    path.to_path_buf()
  } else {
    source_dir.join(path)
  }
}

pub(crate) fn path_string(path: &Path) -> String {
  path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::platform::Arch;
  use serde_json::json;
  use serial_test::serial;

  fn resolver() -> ConfigResolver {
    ConfigResolver::new().unwrap().with_current_host("ubuntu")
  }

  fn spec(s: &str) -> BuildSpec {
    BuildSpec::parse(s).unwrap()
  }

  fn resolve(spec: &BuildSpec, raw: Value) -> ResolvedConfig {
    let raw = ConfigTable::from_json(&raw).unwrap();
    resolver()
      .resolve(spec, &ResolveRequest::new("demo", Path::new("/src/demo"), &raw))
      .unwrap()
  }

  #[test]
  fn every_registry_key_is_present() {
    let config = resolve(&spec("ubuntu-gcc-9-linux-x64"), json!({}));
    for def in KEYS {
      assert!(config.values.contains_key(def.name), "missing {}", def.name);
    }
    assert_eq!(config.values.len(), KEYS.len());
  }

  #[test]
  fn unset_null_key_stays_null() {
    let config = resolve(&spec("ubuntu-gcc-9-linux-x64"), json!({}));
    assert_eq!(config.get("cross_compile_platform"), Some(&Value::Null));
  }

  #[test]
  fn path_keys_chain_from_source_dir() {
    let config = resolve(&spec("ubuntu-gcc-9-linux-x64"), json!({}));
    assert_eq!(config.get_str("build_dir"), Some("/src/demo/build"));
    assert_eq!(config.get_str("deps_dir"), Some("/src/demo/build/deps"));
    assert_eq!(config.get_str("install_dir"), Some("/src/demo/build/install"));
  }

  #[test]
  fn relative_build_dir_is_anchored() {
    let config = resolve(&spec("ubuntu-gcc-9-linux-x64"), json!({ "build_dir": "out/{compiler}" }));
    assert_eq!(config.get_str("build_dir"), Some("/src/demo/out/gcc"));
    assert_eq!(config.get_str("install_dir"), Some("/src/demo/out/gcc/install"));
  }

  #[test]
  fn variables_reach_every_string() {
    let config = resolve(
      &spec("ubuntu-gcc-9-linux-x64"),
      json!({
        "variables": { "flavor": "{compiler}-{version}" },
        "cmake_args": ["-DFLAVOR={flavor}", "-DPREFIX={install_dir}"],
        "env": { "OUT": "{build_dir}" },
      }),
    );
    assert_eq!(
      config.get_strings("cmake_args"),
      vec!["-DFLAVOR=gcc-9", "-DPREFIX=/src/demo/build/install"]
    );
    assert_eq!(config.get_env("env")["OUT"], "/src/demo/build");
  }

  #[test]
  fn unknown_descriptor_keys_become_variables() {
    let config = resolve(
      &spec("ubuntu-gcc-9-linux-x64"),
      json!({ "name": "demo", "abi_tag": "v2", "build_steps": ["echo {abi_tag}"] }),
    );
    assert_eq!(config.variables["abi_tag"], json!("v2"));
    assert!(!config.variables.contains_key("name"));
    assert_eq!(config.get_strings("build_steps"), vec!["echo v2"]);
  }

  #[test]
  fn project_nested_sections_apply_for_matching_spec() {
    let raw = json!({
      "cmake_args": ["-DBASE=1"],
      "hosts": { "linux": { "cmake_args": ["-DLINUX=1"] } },
      "compilers": { "gcc": { "versions": { "9": { "cmake_args": ["-DGCC9=1"] } } } },
      "targets": { "windows": { "cmake_args": ["-DWIN=1"] } },
    });
    let config = resolve(&spec("ubuntu-gcc-9-linux-x64"), raw);
    // `hosts.linux` folds while the accumulator is still the descriptor's own
    // list, so it replaces that list; the version section then appends.
    assert_eq!(config.get_strings("cmake_args"), vec!["-DLINUX=1", "-DGCC9=1"]);
  }

  #[test]
  fn project_section_replaces_raw_list() {
    let raw = json!({
      "cmake_args": ["-DBASE=1"],
      "hosts": { "linux": { "cmake_args": ["-DLINUX=1"] } },
    });
    let config = resolve(&spec("ubuntu-gcc-9-linux-x64"), raw);
    assert_eq!(config.get_strings("cmake_args"), vec!["-DLINUX=1"]);
  }

  #[test]
  fn top_level_versions_section_is_ignored() {
    let raw = json!({
      "versions": { "9": { "cmake_args": ["-DTOPV9=1"] } },
      "compilers": { "clang": { "versions": { "9": { "cmake_args": ["-DCLANG9=1"] } } } },
    });
    let config = resolve(&spec("ubuntu-gcc-9-linux-x64"), raw);
    assert!(config.get_strings("cmake_args").is_empty());
  }

  #[test]
  fn builtin_tables_contribute() {
    let config = resolve(&spec("ubuntu-gcc-9-linux-x64"), json!({}));
    assert_eq!(config.get_str("pkg_tool"), Some("apt"));
    assert!(config.get_bool("sudo"));
    assert_eq!(config.get_strings("compiler_packages"), vec!["gcc-9", "g++-9"]);
    assert_eq!(config.get_str("c"), Some("gcc-9"));
    assert_eq!(config.get_str("cxx"), Some("g++-9"));
    assert_eq!(config.variables["bits"], json!("64"));
  }

  #[test]
  fn platform_table_contributes() {
    let spec = BuildSpec::parse("windows-msvc-16-windows-x64").unwrap();
    let config = ConfigResolver::new()
      .unwrap()
      .with_current_host("windows")
      .resolve(
        &spec,
        &ResolveRequest::new("demo", Path::new("/src/demo"), &ConfigTable::new()),
      )
      .unwrap();
    assert_eq!(
      config.get_strings("cmake_args"),
      vec!["-G", "Visual Studio 16 2019", "-A", "x64"]
    );
  }

  #[test]
  fn package_tool_keys_are_derived() {
    let config = resolve(
      &spec("ubuntu-gcc-9-linux-x64"),
      json!({
        "packages": ["cmake"],
        "apt_packages": ["libssl-dev"],
        "brew_packages": ["openssl"],
        "apt_install": "apt-get install --no-install-recommends -y",
      }),
    );
    assert_eq!(config.get_strings("packages"), vec!["libssl-dev", "cmake"]);
    assert_eq!(
      config.get_str("pkg_install"),
      Some("apt-get install --no-install-recommends -y")
    );
    assert!(!config.variables.contains_key("apt_packages"));
  }

  #[test]
  fn arch_aliases_resolve_identically() {
    let raw = json!({ "architectures": { "aarch64": { "cmake_args": ["-DARM=1"] } } });
    let a = resolve(&spec("ubuntu-clang-default-linux-aarch64"), raw.clone());
    let b = resolve(&spec("ubuntu-clang-default-linux-armv8"), raw);
    assert_eq!(a, b);
    assert_eq!(a.get_strings("cmake_args"), vec!["-DARM=1"]);
  }

  #[test]
  fn resolution_is_repeatable() {
    let s = spec("ubuntu-gcc-9-linux-x64");
    let raw = json!({ "cmake_args": ["-DA=1"], "variants": { "asan": { "cmake_args": ["-DASAN=1"] } } });
    let first = resolve(&s, raw.clone());
    let second = resolve(&s, raw);
    assert_eq!(
      serde_json::to_string(&first.to_json()).unwrap(),
      serde_json::to_string(&second.to_json()).unwrap()
    );
  }

  // ==========================================================================
  // Overrides
  // ==========================================================================

  fn resolve_with_overrides(raw: Value, overrides: Value) -> ResolvedConfig {
    let raw = ConfigTable::from_json(&raw).unwrap();
    let overrides = ConfigTable::from_json(&overrides).unwrap();
    resolver()
      .resolve(
        &spec("ubuntu-gcc-9-linux-x64"),
        &ResolveRequest::new("demo", Path::new("/src/demo"), &raw).overrides(&overrides),
      )
      .unwrap()
  }

  #[test]
  fn override_reset_then_merges() {
    let config = resolve_with_overrides(
      json!({ "cmake_args": ["-DA=1"], "env": { "A": "1" } }),
      json!({ "!cmake_args": ["-DB=1"], "!env": { "B": "2" } }),
    );
    assert_eq!(config.get_strings("cmake_args"), vec!["-DB=1"]);
    assert_eq!(
      config.get_env("env"),
      BTreeMap::from([("B".to_string(), "2".to_string())])
    );
  }

  #[test]
  fn plain_override_merges_by_policy() {
    let config = resolve_with_overrides(
      json!({ "cmake_args": ["-DA=1"], "build_type": "Debug" }),
      json!({ "cmake_args": ["-DB=1"], "build_type": "Release" }),
    );
    assert_eq!(config.get_strings("cmake_args"), vec!["-DA=1", "-DB=1"]);
    assert_eq!(config.get_str("build_type"), Some("Release"));
  }

  #[test]
  fn unknown_override_keys_become_variables() {
    let config = resolve_with_overrides(json!({ "build_steps": ["make {jobs}"] }), json!({ "jobs": "8" }));
    assert_eq!(config.get("variables").unwrap()["jobs"], json!("8"));
    assert_eq!(config.get_strings("build_steps"), vec!["make 8"]);
  }

  // ==========================================================================
  // Variants
  // ==========================================================================

  #[test]
  fn variants_resolve_alongside_base() {
    let config = resolve(
      &spec("ubuntu-gcc-9-linux-x64"),
      json!({
        "cmake_args": ["-DA=1"],
        "variants": { "asan": { "cmake_args": ["-DASAN=1"], "build_dir": "{source_dir}/build-asan" } },
      }),
    );

    let asan = &config.variants["asan"];
    assert_eq!(asan.variant.as_deref(), Some("asan"));
    assert_eq!(asan.get_str("build_dir"), Some("/src/demo/build-asan"));
    assert!(asan.variants.is_empty());
    assert_eq!(config.get_str("build_dir"), Some("/src/demo/build"));
  }

  #[test]
  fn variant_list_replaces_untouched_project_value() {
    let config = resolve(
      &spec("ubuntu-gcc-9-linux-x64"),
      json!({
        "cmake_args": ["-DA=1"],
        "variants": { "asan": { "cmake_args": ["-DASAN=1"] } },
      }),
    );
    assert_eq!(config.variants["asan"].get_strings("cmake_args"), vec!["-DASAN=1"]);
  }

  #[test]
  fn unknown_variant_is_error() {
    let raw = ConfigTable::new();
    let err = resolver()
      .resolve(
        &spec("ubuntu-gcc-9-linux-x64"),
        &ResolveRequest::new("demo", Path::new("/src/demo"), &raw).variant(Some("tsan")),
      )
      .unwrap_err();
    assert!(matches!(err, ConfigError::UnknownVariant { .. }));
  }

  // ==========================================================================
  // Toolchain discovery
  // ==========================================================================

  #[test]
  #[serial]
  fn default_compiler_reads_cc_and_cxx() {
    temp_env::with_vars([("CC", Some("/opt/cc")), ("CXX", Some("/opt/c++"))], || {
      let config = resolve(&spec("ubuntu-default-default-linux-x64"), json!({}));
      assert_eq!(config.get_str("c"), Some("/opt/cc"));
      assert_eq!(config.get_str("cxx"), Some("/opt/c++"));
    });
  }

  #[test]
  #[serial]
  fn configured_compiler_is_not_rediscovered() {
    temp_env::with_var("CC", Some("/opt/cc"), || {
      let config = resolve(&spec("ubuntu-default-default-linux-x64"), json!({ "c": "my-cc" }));
      assert_eq!(config.get_str("c"), Some("my-cc"));
    });
  }

  #[test]
  fn running_host_table_applies_before_spec_host() {
    let raw = ConfigTable::from_json(&json!({
      "hosts": {
        "ubuntu": { "build_type": "FromRunningHost" },
        "alpine": { "cmake_args": ["-DALPINE=1"] },
      },
    }))
    .unwrap();
    let spec = BuildSpec::new("alpine", "gcc", "default", "linux", Arch::X64, false).unwrap();
    let config = resolver()
      .resolve(&spec, &ResolveRequest::new("demo", Path::new("/src/demo"), &raw))
      .unwrap();
    assert_eq!(config.get_str("build_type"), Some("FromRunningHost"));
    assert_eq!(config.get_strings("cmake_args"), vec!["-DALPINE=1"]);
  }
}

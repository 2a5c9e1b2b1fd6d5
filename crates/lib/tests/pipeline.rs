//! End-to-end tests: projects on disk, resolved through the public API and
//! built with a dry-run shell.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::{Value, json};
use tempfile::TempDir;

use xbuild_lib::action::{ActionError, run_command};
use xbuild_lib::config::ConfigResolver;
use xbuild_lib::context::BuildContext;
use xbuild_lib::project::{Direction, ProjectCache, ProjectId};
use xbuild_lib::shell::Shell;
use xbuild_lib::spec::BuildSpec;

fn write_project(root: &Path, name: &str, descriptor: Value) -> PathBuf {
  let dir = root.join(name);
  std::fs::create_dir_all(&dir).unwrap();
  std::fs::write(dir.join("xbuild.json"), serde_json::to_string_pretty(&descriptor).unwrap()).unwrap();
  dir
}

/// app -> lib -> zlib, laid out as siblings.
fn workspace() -> TempDir {
  let temp = TempDir::new().unwrap();
  write_project(
    temp.path(),
    "zlib",
    json!({ "name": "zlib", "build_steps": ["echo build-zlib"], "install_steps": ["echo install-zlib"] }),
  );
  write_project(
    temp.path(),
    "lib",
    json!({
      "name": "lib",
      "upstream": ["zlib"],
      "build_steps": ["echo build-lib"],
      "install_steps": ["echo install-lib"],
    }),
  );
  write_project(
    temp.path(),
    "app",
    json!({
      "name": "app",
      "upstream": ["lib"],
      "run_tests": false,
      "build_steps": ["echo build-app {compiler}-{version} {greeting}"],
      "install_steps": ["echo install-app"],
      "variables": { "greeting": "hi" },
    }),
  );
  temp
}

fn context(temp: &TempDir, action_root: &str, spec: &str) -> BuildContext {
  let mut projects = ProjectCache::new();
  let root = projects.load_root(&temp.path().join(action_root)).unwrap();
  let resolver = ConfigResolver::new().unwrap().with_current_host("ubuntu");
  BuildContext::new(BuildSpec::parse(spec).unwrap(), projects, root)
    .unwrap()
    .with_resolver(resolver)
    .with_shell(Shell::new().with_dry_run(true).with_retry_delay(Duration::ZERO))
}

fn position(history: &[String], needle: &str) -> usize {
  history
    .iter()
    .position(|line| line.contains(needle))
    .unwrap_or_else(|| panic!("'{needle}' not run; history: {history:#?}"))
}

// =============================================================================
// Build pipeline
// =============================================================================

#[test]
fn build_runs_dependencies_first() {
  let temp = workspace();
  let mut ctx = context(&temp, "app", "ubuntu-gcc-9-linux-x64");

  run_command(&mut ctx, "build").unwrap();

  let history: Vec<String> = ctx.shell.history().iter().map(|argv| argv.join(" ")).collect();
  let zlib = position(&history, "build-zlib");
  let lib = position(&history, "build-lib");
  let app = position(&history, "build-app");
  assert!(zlib < lib && lib < app, "{history:#?}");
  assert!(position(&history, "install-zlib") < lib);
  assert!(history.contains(&"echo build-app gcc-9 hi".to_string()));

  assert!(ctx.is_built(&ProjectId::new("zlib")));
  assert!(ctx.is_built(&ProjectId::new("app")));
}

#[test]
fn dependencies_install_into_the_root_deps_dir() {
  let temp = workspace();
  let mut ctx = context(&temp, "app", "ubuntu-gcc-9-linux-x64");
  run_command(&mut ctx, "build").unwrap();

  let app = ctx.config().unwrap();
  let deps_dir = app.get_str("deps_dir").unwrap().to_string();
  for name in ["lib", "zlib"] {
    let config = ctx.config_of(&ProjectId::new(name)).unwrap();
    assert_eq!(config.get_str("install_dir"), Some(deps_dir.as_str()), "{name}");
    assert!(!config.get_bool("run_tests"), "{name}");
  }
}

#[test]
fn consumers_build_after_the_root_when_downstream() {
  let temp = TempDir::new().unwrap();
  write_project(
    temp.path(),
    "core",
    json!({ "name": "core", "downstream": ["tool"], "build_steps": ["echo build-core"] }),
  );
  write_project(
    temp.path(),
    "tool",
    json!({ "name": "tool", "upstream": ["core"], "build_steps": ["echo build-tool"], "install_steps": ["echo install-tool"] }),
  );
  let mut ctx = context(&temp, "core", "ubuntu-gcc-9-linux-x64-downstream");

  let consumers = ctx.graph().get_flattened_consumers(&ProjectId::new("core"), false).unwrap();
  assert_eq!(consumers, vec![ProjectId::new("tool")]);

  run_command(&mut ctx, "build").unwrap();
  let history: Vec<String> = ctx.shell.history().iter().map(|argv| argv.join(" ")).collect();
  assert!(position(&history, "build-core") < position(&history, "build-tool"));
  assert_eq!(history.iter().filter(|line| line.contains("build-core")).count(), 1);
}

#[test]
fn graph_walks_upstream_in_post_order() {
  let temp = workspace();
  let mut ctx = context(&temp, "app", "ubuntu-gcc-9-linux-x64");
  let root = ctx.root().clone();

  let deps = ctx.graph().get_flattened_dependencies(&root, false).unwrap();
  assert_eq!(deps, vec![ProjectId::new("zlib"), ProjectId::new("lib")]);
  assert_eq!(Direction::Upstream.key(), "upstream");
}

// =============================================================================
// Failures
// =============================================================================

#[test]
fn unknown_command_maps_to_exit_2() {
  let temp = workspace();
  let mut ctx = context(&temp, "app", "ubuntu-gcc-9-linux-x64");

  let err = run_command(&mut ctx, "frobnicate").unwrap_err();
  assert!(matches!(err, ActionError::ClassNotFound { .. }));
  assert_eq!(err.exit_code(), 2);
}

#[test]
fn print_config_reports_resolved_json() {
  let temp = workspace();
  let mut ctx = context(&temp, "app", "ubuntu-gcc-9-linux-x64");
  run_command(&mut ctx, "print-config").unwrap();

  let config: Value = serde_json::from_str(&ctx.reports()[0]).unwrap();
  assert_eq!(config["project"], "app");
  assert_eq!(config["variables"]["greeting"], "hi");
  assert_eq!(config["c"], "gcc-9");
}

//! The native build tool invoked when a project lists no steps of its own.

use std::fmt;

use crate::config::ResolvedConfig;
use crate::config::resolve::path_string;
use crate::util::unique::UniqueList;

/// Produces the commands for each build-tool phase of a project.
pub trait BuildTool: fmt::Debug {
  fn name(&self) -> &str;

  /// Commands generating the build tree and compiling.
  fn build(&self, config: &ResolvedConfig) -> Vec<Vec<String>>;

  fn test(&self, config: &ResolvedConfig) -> Vec<Vec<String>>;

  fn install(&self, config: &ResolvedConfig) -> Vec<Vec<String>>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct CMake;

impl CMake {
  /// The `cmake` configure command line.
  pub fn configure(&self, config: &ResolvedConfig) -> Vec<String> {
    let mut argv = vec![
      "cmake".to_string(),
      "-S".to_string(),
      path_string(&config.source_dir),
      "-B".to_string(),
      build_dir(config),
    ];

    if let Some(build_type) = config.get_str("build_type") {
      argv.push(format!("-DCMAKE_BUILD_TYPE={build_type}"));
    }
    if let Some(install_dir) = config.get_str("install_dir") {
      argv.push(format!("-DCMAKE_INSTALL_PREFIX={install_dir}"));
    }
    if let Some(deps_dir) = config.get_str("deps_dir") {
      argv.push(format!("-DCMAKE_PREFIX_PATH={deps_dir}"));
    }
    // Visual Studio generators pick the compiler themselves.
    if config.spec.compiler() != "msvc" {
      if let Some(c) = config.get_str("c") {
        argv.push(format!("-DCMAKE_C_COMPILER={c}"));
      }
      if let Some(cxx) = config.get_str("cxx") {
        argv.push(format!("-DCMAKE_CXX_COMPILER={cxx}"));
      }
    }
    let testing = if config.get_bool("build_tests") { "ON" } else { "OFF" };
    argv.push(format!("-DBUILD_TESTING={testing}"));

    let extra: UniqueList<String> = config.get_strings("cmake_args").into_iter().collect();
    argv.extend(extra);
    argv
  }
}

impl BuildTool for CMake {
  fn name(&self) -> &str {
    "cmake"
  }

  fn build(&self, config: &ResolvedConfig) -> Vec<Vec<String>> {
    vec![
      self.configure(config),
      with_config(vec!["cmake".into(), "--build".into(), build_dir(config)], config),
    ]
  }

  fn test(&self, config: &ResolvedConfig) -> Vec<Vec<String>> {
    vec![with_config(
      vec![
        "ctest".into(),
        "--test-dir".into(),
        build_dir(config),
        "--output-on-failure".into(),
      ],
      config,
    )]
  }

  fn install(&self, config: &ResolvedConfig) -> Vec<Vec<String>> {
    vec![with_config(
      vec!["cmake".into(), "--install".into(), build_dir(config)],
      config,
    )]
  }
}

fn build_dir(config: &ResolvedConfig) -> String {
  config.get_str("build_dir").unwrap_or("build").to_string()
}

/// Multi-config generators need the build type on every invocation.
fn with_config(mut argv: Vec<String>, config: &ResolvedConfig) -> Vec<String> {
  if let Some(build_type) = config.get_str("build_type") {
    argv.push("--config".into());
    argv.push(build_type.to_string());
  }
  argv
}

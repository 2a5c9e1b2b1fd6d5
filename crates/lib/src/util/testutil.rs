//! Test utilities for xbuild-lib.
//!
//! Cross-platform helpers for tests that run shell commands or need
//! project directories on disk.

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::consts::DESCRIPTOR_FILENAME;

/// Create `root/name` holding an `xbuild.json` with `descriptor`.
pub fn write_project(root: &Path, name: &str, descriptor: Value) -> PathBuf {
  let dir = root.join(name);
  std::fs::create_dir_all(&dir).unwrap();
  std::fs::write(dir.join(DESCRIPTOR_FILENAME), descriptor.to_string()).unwrap();
  dir
}

/// Argument vector running `script` through the platform shell.
#[cfg(unix)]
pub fn shell_cmd(script: &str) -> Vec<String> {
  vec!["/bin/sh".to_string(), "-c".to_string(), script.to_string()]
}

#[cfg(windows)]
pub fn shell_cmd(script: &str) -> Vec<String> {
  vec!["cmd.exe".to_string(), "/C".to_string(), script.to_string()]
}

/// Argument vector printing the value of an environment variable.
#[cfg(unix)]
pub fn shell_echo_env(var: &str) -> Vec<String> {
  shell_cmd(&format!("echo \"${}\"", var))
}

#[cfg(windows)]
pub fn shell_echo_env(var: &str) -> Vec<String> {
  shell_cmd(&format!("echo %{}%", var))
}

/// Argument vector printing the working directory.
#[cfg(unix)]
pub fn print_cwd() -> Vec<String> {
  shell_cmd("pwd")
}

#[cfg(windows)]
pub fn print_cwd() -> Vec<String> {
  shell_cmd("cd")
}

/// Argument vector exiting with `code`.
pub fn exit_with(code: i32) -> Vec<String> {
  shell_cmd(&format!("exit {code}"))
}

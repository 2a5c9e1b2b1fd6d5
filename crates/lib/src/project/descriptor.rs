//! Loading `xbuild.json` project descriptors.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use super::ProjectError;
use crate::config::ConfigTable;
use crate::consts::DESCRIPTOR_FILENAME;

/// The contents of a descriptor file.
#[derive(Debug, Clone)]
pub struct Descriptor {
  /// Declared name, or the directory name when the descriptor has none.
  pub name: String,
  pub account: Option<String>,
  pub url: Option<String>,
  pub revision: Option<String>,
  /// Every key of the descriptor, unrecognized ones included.
  pub raw: ConfigTable,
}

pub fn descriptor_path(dir: &Path) -> PathBuf {
  dir.join(DESCRIPTOR_FILENAME)
}

/// Whether `dir` contains a descriptor.
pub fn has_descriptor(dir: &Path) -> bool {
  descriptor_path(dir).is_file()
}

/// Load the descriptor in `dir`.
///
/// A directory without a descriptor is a project with an empty
/// configuration, named after the directory.
pub fn load(dir: &Path) -> Result<Descriptor, ProjectError> {
  let fallback_name = dir
    .file_name()
    .map(|name| name.to_string_lossy().into_owned())
    .unwrap_or_default();

  let path = descriptor_path(dir);
  if !path.is_file() {
    debug!(dir = %dir.display(), "no descriptor, using empty configuration");
    return Ok(Descriptor {
      name: fallback_name,
      account: None,
      url: None,
      revision: None,
      raw: ConfigTable::new(),
    });
  }

  let content = std::fs::read_to_string(&path).map_err(|source| ProjectError::Read {
    path: path.clone(),
    source,
  })?;
  let value: Value = serde_json::from_str(&content).map_err(|source| ProjectError::Parse {
    path: path.clone(),
    source,
  })?;
  parse(&value, &fallback_name).map_err(|err| match err {
    ProjectError::Config(source) => ProjectError::InvalidDescriptor { path, source },
    other => other,
  })
}

/// Interpret a descriptor document.
pub fn parse(value: &Value, fallback_name: &str) -> Result<Descriptor, ProjectError> {
  let raw = ConfigTable::from_json(value)?;
  let text = |key: &str| value.get(key).and_then(Value::as_str).map(str::to_string);

  Ok(Descriptor {
    name: text("name").unwrap_or_else(|| fallback_name.to_string()),
    account: text("account"),
    url: text("url"),
    revision: text("revision"),
    raw,
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;
  use tempfile::TempDir;

  #[test]
  fn loads_declared_fields() {
    let temp = TempDir::new().unwrap();
    std::fs::write(
      descriptor_path(temp.path()),
      json!({ "name": "zlib", "account": "madler", "cmake_args": ["-DZ=1"] }).to_string(),
    )
    .unwrap();

    let descriptor = load(temp.path()).unwrap();
    assert_eq!(descriptor.name, "zlib");
    assert_eq!(descriptor.account.as_deref(), Some("madler"));
    assert_eq!(descriptor.raw.value("cmake_args"), Some(&json!(["-DZ=1"])));
  }

  #[test]
  fn missing_descriptor_uses_directory_name() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("libfoo");
    std::fs::create_dir(&dir).unwrap();

    let descriptor = load(&dir).unwrap();
    assert_eq!(descriptor.name, "libfoo");
    assert!(descriptor.raw.is_empty());
  }

  #[test]
  fn malformed_json_is_parse_error() {
    let temp = TempDir::new().unwrap();
    std::fs::write(descriptor_path(temp.path()), "{ not json").unwrap();
    assert!(matches!(load(temp.path()), Err(ProjectError::Parse { .. })));
  }

  #[test]
  fn non_object_descriptor_is_invalid() {
    let temp = TempDir::new().unwrap();
    std::fs::write(descriptor_path(temp.path()), "[1, 2]").unwrap();
    assert!(matches!(
      load(temp.path()),
      Err(ProjectError::InvalidDescriptor { .. })
    ));
  }
}

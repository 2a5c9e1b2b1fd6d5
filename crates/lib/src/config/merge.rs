//! Layered merging of configuration values.
//!
//! A key is folded over an ordered list of [`Candidate`] tables, starting
//! from its registry default. Within each table the key's [`Directive`]
//! decides what happens:
//!
//! - `Replace` discards the accumulator and takes the table's value.
//! - `Append` combines using the key's own policy, but a list or mapping is
//!   always extended and a string is extended with a space separator.
//! - `Merge` combines using the key's policy: scalars replace, lists append
//!   (accumulated items first, duplicates dropped), mappings merge
//!   recursively.
//!
//! One exception is kept for compatibility: a `Merge` in any layer replaces
//! instead when the accumulator still equals the project's own raw value for
//! the key, so the project's entries are not applied twice.

use serde_json::{Map, Value};
use tracing::trace;

use super::keys::MergePolicy;
use super::table::{ConfigTable, Directive};
use crate::util::hash::ContentHash;
use crate::util::unique::{UniqueKey, UniqueList};

/// Which layer of the hierarchy a candidate table belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Layer {
  Builtin,
  Platform,
  Project,
  Variant,
}

/// One table in fold order.
///
/// Identical tables are folded once per layer.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
  pub table: &'a ConfigTable,
  pub layer: Layer,
}

impl UniqueKey for Candidate<'_> {
  type Key = (Layer, ContentHash);

  fn unique_key(&self) -> Self::Key {
    (self.layer, self.table.unique_key())
  }
}

/// Combine `incoming` into `acc` under `policy`.
pub fn merge_value(policy: MergePolicy, acc: &Value, incoming: &Value) -> Value {
  match policy {
    MergePolicy::Replace => incoming.clone(),
    MergePolicy::Append => match (acc, incoming) {
      (Value::Array(existing), Value::Array(items)) => append_unique(existing, items),
      (Value::Array(existing), item) => append_unique(existing, std::slice::from_ref(item)),
      (Value::Object(existing), Value::Object(items)) => merge_maps(existing, items),
      (Value::String(existing), Value::String(item)) if !existing.is_empty() && !item.is_empty() => {
        Value::String(format!("{existing} {item}"))
      }
      _ => incoming.clone(),
    },
    MergePolicy::Merge => match (acc, incoming) {
      (Value::Object(existing), Value::Object(items)) => merge_maps(existing, items),
      (Value::Array(existing), Value::Array(items)) => append_unique(existing, items),
      _ => incoming.clone(),
    },
  }
}

fn append_unique(existing: &[Value], items: &[Value]) -> Value {
  let list: UniqueList<Value> = existing.iter().chain(items).cloned().collect();
  Value::Array(list.into_vec())
}

fn merge_maps(existing: &Map<String, Value>, items: &Map<String, Value>) -> Value {
  let mut out = existing.clone();
  for (key, item) in items {
    let merged = match out.get(key) {
      Some(current) => merge_value(MergePolicy::of_value(current), current, item),
      None => item.clone(),
    };
    out.insert(key.clone(), merged);
  }
  Value::Object(out)
}

/// An empty value of the same shape as `value`.
pub fn empty_like(value: &Value) -> Value {
  match value {
    Value::Array(_) => Value::Array(Vec::new()),
    Value::Object(_) => Value::Object(Map::new()),
    Value::String(_) => Value::String(String::new()),
    Value::Bool(_) => Value::Bool(false),
    Value::Number(_) => Value::from(0),
    Value::Null => Value::Null,
  }
}

/// Fold one key over the candidates, starting from `default`.
///
/// `project_raw` is the project descriptor's own value for the key, if it
/// has one.
pub fn fold_key(
  key: &str,
  default: Value,
  policy: MergePolicy,
  candidates: &[Candidate<'_>],
  project_raw: Option<&Value>,
) -> Value {
  let mut acc = default;

  for candidate in candidates {
    let Some(directive) = candidate.table.get(key) else {
      continue;
    };

    acc = match directive {
      Directive::Replace(value) => value.clone(),
      Directive::Append(value) => merge_value(MergePolicy::Append, &acc, value),
      Directive::Merge(value) => {
        if project_raw == Some(&acc) {
          trace!(key, "accumulator equals project value, replacing");
          value.clone()
        } else {
          merge_value(policy, &acc, value)
        }
      }
    };
    trace!(key, layer = ?candidate.layer, value = %acc, "folded");
  }

  acc
}

/// Fold a key that is not in the registry, such as `apt_packages`.
///
/// Returns `None` when no candidate mentions the key.
pub fn fold_named(
  key: &str,
  policy: MergePolicy,
  candidates: &[Candidate<'_>],
  project_raw: Option<&Value>,
) -> Option<Value> {
  let first = candidates.iter().find_map(|c| c.table.value(key))?;
  Some(fold_key(key, empty_like(first), policy, candidates, project_raw))
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn table(value: Value) -> ConfigTable {
    ConfigTable::from_json(&value).unwrap()
  }

  fn fold(key: &str, default: Value, policy: MergePolicy, layers: &[(Layer, &ConfigTable)]) -> Value {
    let candidates: Vec<_> = layers
      .iter()
      .map(|(layer, table)| Candidate { table: *table, layer: *layer })
      .collect();
    let raw = layers
      .iter()
      .find(|(layer, _)| *layer == Layer::Project)
      .and_then(|(_, t)| t.value(key));
    fold_key(key, default, policy, &candidates, raw)
  }

  // ==========================================================================
  // merge_value
  // ==========================================================================

  #[test]
  fn scalars_replace() {
    assert_eq!(merge_value(MergePolicy::Replace, &json!("a"), &json!("b")), json!("b"));
  }

  #[test]
  fn lists_append_without_duplicates() {
    let merged = merge_value(MergePolicy::Append, &json!(["a", "b"]), &json!(["b", "c"]));
    assert_eq!(merged, json!(["a", "b", "c"]));
  }

  #[test]
  fn maps_merge_recursively() {
    let merged = merge_value(
      MergePolicy::Merge,
      &json!({ "A": "1", "nested": { "x": ["1"], "y": "old" } }),
      &json!({ "B": "2", "nested": { "x": ["2"], "y": "new" } }),
    );
    assert_eq!(
      merged,
      json!({ "A": "1", "B": "2", "nested": { "x": ["1", "2"], "y": "new" } })
    );
  }

  #[test]
  fn append_joins_strings() {
    assert_eq!(
      merge_value(MergePolicy::Append, &json!("-O2"), &json!("-g")),
      json!("-O2 -g")
    );
    assert_eq!(merge_value(MergePolicy::Append, &json!(""), &json!("-g")), json!("-g"));
  }

  // ==========================================================================
  // fold_key
  // ==========================================================================

  #[test]
  fn list_append_across_layers() {
    let defaults = table(json!({ "cmake_args": ["a"] }));
    let project = table(json!({ "cmake_args": ["b"] }));
    let result = fold(
      "cmake_args",
      json!([]),
      MergePolicy::Append,
      &[(Layer::Builtin, &defaults), (Layer::Project, &project)],
    );
    assert_eq!(result, json!(["a", "b"]));
  }

  #[test]
  fn variant_replaces_when_accumulator_is_project_value() {
    // Nothing below the project contributed, so the accumulator is exactly
    // the project's raw list and the variant's plain value replaces it.
    let project = table(json!({ "cmake_args": ["b"] }));
    let variant = table(json!({ "cmake_args": ["c"] }));
    let result = fold(
      "cmake_args",
      json!([]),
      MergePolicy::Append,
      &[(Layer::Project, &project), (Layer::Variant, &variant)],
    );
    assert_eq!(result, json!(["c"]));
  }

  #[test]
  fn variant_appends_when_accumulator_differs_from_project_value() {
    let defaults = table(json!({ "cmake_args": ["a"] }));
    let project = table(json!({ "cmake_args": ["b"] }));
    let variant = table(json!({ "cmake_args": ["c"] }));
    let result = fold(
      "cmake_args",
      json!([]),
      MergePolicy::Append,
      &[
        (Layer::Builtin, &defaults),
        (Layer::Project, &project),
        (Layer::Variant, &variant),
      ],
    );
    assert_eq!(result, json!(["a", "b", "c"]));
  }

  #[test]
  fn project_section_replaces_when_accumulator_is_project_value() {
    // A nested `hosts.linux` table folds in the project layer right after the
    // descriptor itself, while the accumulator still holds the raw list.
    let project = table(json!({ "cmake_args": ["-DBASE=1"] }));
    let linux = table(json!({ "cmake_args": ["-DLINUX=1"] }));
    let result = fold(
      "cmake_args",
      json!([]),
      MergePolicy::Append,
      &[(Layer::Project, &project), (Layer::Project, &linux)],
    );
    assert_eq!(result, json!(["-DLINUX=1"]));
  }

  #[test]
  fn builtin_value_equal_to_project_value_is_replaced() {
    let defaults = table(json!({ "cmake_args": ["b"] }));
    let host = table(json!({ "cmake_args": ["c"] }));
    let project = table(json!({ "cmake_args": ["b"] }));
    let result = fold(
      "cmake_args",
      json!([]),
      MergePolicy::Append,
      &[(Layer::Builtin, &defaults), (Layer::Builtin, &host), (Layer::Project, &project)],
    );
    // The host table replaced the builtin list, so the project list is
    // appended to the host's.
    assert_eq!(result, json!(["c", "b"]));
  }

  #[test]
  fn identical_tables_in_different_layers_stay_distinct() {
    let project = table(json!({ "build_type": "Release" }));
    let variant = table(json!({ "build_type": "Release" }));
    let mut list = UniqueList::new();
    assert!(list.push(Candidate { table: &project, layer: Layer::Project }));
    assert!(list.push(Candidate { table: &variant, layer: Layer::Variant }));
    assert!(!list.push(Candidate { table: &variant, layer: Layer::Variant }));
    assert_eq!(list.into_vec().len(), 2);
  }

  #[test]
  fn replace_discards_all_earlier_layers() {
    let defaults = table(json!({ "env": { "A": "1" } }));
    let host = table(json!({ "env": { "B": "2" } }));
    let project = table(json!({ "!env": { "C": "3" } }));
    let result = fold(
      "env",
      json!({}),
      MergePolicy::Merge,
      &[
        (Layer::Builtin, &defaults),
        (Layer::Builtin, &host),
        (Layer::Project, &project),
      ],
    );
    assert_eq!(result, json!({ "C": "3" }));
  }

  #[test]
  fn later_replace_beats_earlier_append() {
    let host = table(json!({ "+packages": ["x"] }));
    let project = table(json!({ "!packages": ["y"] }));
    let result = fold(
      "packages",
      json!(["base"]),
      MergePolicy::Append,
      &[(Layer::Builtin, &host), (Layer::Project, &project)],
    );
    assert_eq!(result, json!(["y"]));
  }

  #[test]
  fn later_append_extends_earlier_replace() {
    let host = table(json!({ "!packages": ["x"] }));
    let project = table(json!({ "+packages": ["y"] }));
    let result = fold(
      "packages",
      json!(["base"]),
      MergePolicy::Append,
      &[(Layer::Builtin, &host), (Layer::Project, &project)],
    );
    assert_eq!(result, json!(["x", "y"]));
  }

  #[test]
  fn null_default_stays_null() {
    let project = table(json!({ "build_type": "Debug" }));
    let result = fold("c", Value::Null, MergePolicy::Replace, &[(Layer::Project, &project)]);
    assert_eq!(result, Value::Null);
  }

  #[test]
  fn fold_named_is_none_when_unset() {
    let project = table(json!({ "packages": ["zlib"] }));
    let candidates = [Candidate {
      table: &project,
      layer: Layer::Project,
    }];
    assert_eq!(fold_named("apt_packages", MergePolicy::Append, &candidates, None), None);
  }
}

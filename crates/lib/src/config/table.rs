//! Configuration tables.
//!
//! A [`ConfigTable`] is one configuration source (builtin defaults, a host
//! entry, a project descriptor, a variant, ...) parsed at the loading
//! boundary. Key prefixes are decoded into [`Directive`]s here so that
//! merging never has to look at key strings again:
//!
//! - `!key` → [`Directive::Replace`]: discard everything accumulated so far
//! - `+key` → [`Directive::Append`]: append or merge regardless of other rules
//! - `key` → [`Directive::Merge`]: combine according to the key's policy
//!
//! Nested `architectures`, `hosts`, `targets`, `compilers`, `versions` and
//! `variants` objects become [`Section`]s of child tables.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use super::ConfigError;
use crate::util::hash::ContentHash;
use crate::util::unique::UniqueKey;

pub const REPLACE_MARKER: char = '!';
pub const APPEND_MARKER: char = '+';

/// A value together with how it combines with what came before.
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
  Replace(Value),
  Append(Value),
  Merge(Value),
}

impl Directive {
  /// Decode a raw key into its bare name and directive.
  pub fn decode(raw_key: &str, value: Value) -> (&str, Directive) {
    if let Some(name) = raw_key.strip_prefix(REPLACE_MARKER) {
      (name, Directive::Replace(value))
    } else if let Some(name) = raw_key.strip_prefix(APPEND_MARKER) {
      (name, Directive::Append(value))
    } else {
      (raw_key, Directive::Merge(value))
    }
  }

  pub fn value(&self) -> &Value {
    match self {
      Self::Replace(v) | Self::Append(v) | Self::Merge(v) => v,
    }
  }

  pub fn into_value(self) -> Value {
    match self {
      Self::Replace(v) | Self::Append(v) | Self::Merge(v) => v,
    }
  }

  fn rank(&self) -> u8 {
    match self {
      Self::Replace(_) => 2,
      Self::Append(_) => 1,
      Self::Merge(_) => 0,
    }
  }

  fn marked_key(&self, name: &str) -> String {
    match self {
      Self::Replace(_) => format!("{REPLACE_MARKER}{name}"),
      Self::Append(_) => format!("{APPEND_MARKER}{name}"),
      Self::Merge(_) => name.to_string(),
    }
  }
}

/// Named groups of nested tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Section {
  Architectures,
  Hosts,
  Targets,
  Compilers,
  Versions,
  Variants,
}

impl Section {
  pub const ALL: [Section; 6] = [
    Self::Architectures,
    Self::Hosts,
    Self::Targets,
    Self::Compilers,
    Self::Versions,
    Self::Variants,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Architectures => "architectures",
      Self::Hosts => "hosts",
      Self::Targets => "targets",
      Self::Compilers => "compilers",
      Self::Versions => "versions",
      Self::Variants => "variants",
    }
  }

  pub fn from_key(key: &str) -> Option<Self> {
    Self::ALL.into_iter().find(|s| s.as_str() == key)
  }
}

impl fmt::Display for Section {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

/// One configuration source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigTable {
  entries: BTreeMap<String, Directive>,
  sections: BTreeMap<Section, BTreeMap<String, ConfigTable>>,
}

impl ConfigTable {
  pub fn new() -> Self {
    Self::default()
  }

  /// Parse a JSON object into a table.
  ///
  /// When the same bare key appears with several markers in one object, the
  /// strongest wins: replace, then append, then merge.
  ///
  /// # Errors
  ///
  /// Fails if `value` is not an object, or a section holds something other
  /// than an object of objects.
  pub fn from_json(value: &Value) -> Result<Self, ConfigError> {
    let object = value.as_object().ok_or_else(|| ConfigError::NotATable {
      found: kind_of(value).to_string(),
    })?;

    let mut table = Self::new();
    for (raw_key, item) in object {
      if let (Some(section), Some(nested)) = (Section::from_key(raw_key), item.as_object()) {
        let children = table.sections.entry(section).or_default();
        for (name, child) in nested {
          let parsed = Self::from_json(child).map_err(|_| ConfigError::InvalidSection {
            section: section.as_str().to_string(),
            name: name.clone(),
          })?;
          children.insert(name.to_ascii_lowercase(), parsed);
        }
        continue;
      }

      let (name, directive) = Directive::decode(raw_key, item.clone());
      table.insert(name, directive);
    }
    Ok(table)
  }

  /// Insert a directive, keeping the stronger one on conflict.
  pub fn insert(&mut self, name: &str, directive: Directive) {
    match self.entries.get(name) {
      Some(existing) if existing.rank() > directive.rank() => {}
      _ => {
        self.entries.insert(name.to_string(), directive);
      }
    }
  }

  pub fn get(&self, name: &str) -> Option<&Directive> {
    self.entries.get(name)
  }

  /// The value of `name`, whatever its directive.
  pub fn value(&self, name: &str) -> Option<&Value> {
    self.entries.get(name).map(Directive::value)
  }

  pub fn entries(&self) -> impl Iterator<Item = (&str, &Directive)> {
    self.entries.iter().map(|(k, v)| (k.as_str(), v))
  }

  pub fn section(&self, section: Section, name: &str) -> Option<&ConfigTable> {
    self.sections.get(&section)?.get(name)
  }

  /// All `(name, table)` pairs of a section, in name order.
  pub fn sections(&self, section: Section) -> impl Iterator<Item = (&str, &ConfigTable)> {
    self
      .sections
      .get(&section)
      .into_iter()
      .flatten()
      .map(|(k, v)| (k.as_str(), v))
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty() && self.sections.values().all(BTreeMap::is_empty)
  }

  /// Layer `other` over this table: its entries replace same-named entries
  /// here, and sections are layered child by child.
  pub fn overlay(&mut self, other: &ConfigTable) {
    for (name, directive) in &other.entries {
      self.entries.insert(name.clone(), directive.clone());
    }
    for (section, children) in &other.sections {
      let mine = self.sections.entry(*section).or_default();
      for (name, child) in children {
        mine.entry(name.clone()).or_default().overlay(child);
      }
    }
  }

  /// Render back to JSON, re-encoding directives as key markers.
  pub fn to_json(&self) -> Value {
    let mut object = Map::new();
    for (name, directive) in &self.entries {
      object.insert(directive.marked_key(name), directive.value().clone());
    }
    for (section, children) in &self.sections {
      let rendered: Map<String, Value> = children.iter().map(|(k, v)| (k.clone(), v.to_json())).collect();
      object.insert(section.as_str().to_string(), Value::Object(rendered));
    }
    Value::Object(object)
  }
}

impl Serialize for ConfigTable {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    self.to_json().serialize(serializer)
  }
}

impl UniqueKey for ConfigTable {
  type Key = ContentHash;

  fn unique_key(&self) -> ContentHash {
    ContentHash::of_value(&self.to_json())
  }
}

fn kind_of(value: &Value) -> &'static str {
  match value {
    Value::Null => "null",
    Value::Bool(_) => "a boolean",
    Value::Number(_) => "a number",
    Value::String(_) => "a string",
    Value::Array(_) => "a list",
    Value::Object(_) => "an object",
  }
}

//! Variable parsing and substitution for configuration values.
//!
//! Configuration strings may reference variables that are only known once a
//! build specification has been resolved, such as the host name or the build
//! directory. This module parses those references and expands them, both in
//! plain strings and structurally through nested lists and mappings.
//!
//! # Reference Format
//!
//! `{name}` where `name` is made of ASCII letters, digits, `_`, `-` and `.`.
//!
//! # Shell Variables
//!
//! `${NAME}` is shell syntax and passes through unchanged, as does any brace
//! that does not enclose a valid name (`{ a }`, `{"k": 1}`).
//!
//! # Escaping
//!
//! `{{` and `}}` produce literal `{` and `}`.
//!
//! # Undefined Variables
//!
//! A reference to an undefined variable expands to the empty string. This
//! holds for a string that is exactly one reference token as well.
//!
//! # Example
//!
//! ```
//! use serde_json::json;
//! use xbuild_lib::vars::{substitute_str, Variables};
//!
//! let mut vars = Variables::new();
//! vars.insert("x".into(), json!("foo"));
//! vars.insert("y".into(), json!("baz"));
//! assert_eq!(substitute_str("{x}.bar.{y}", &vars).unwrap(), "foo.bar.baz");
//! ```

use std::collections::BTreeMap;

use serde_json::Value;
use thiserror::Error;

use crate::consts::MAX_VARIABLE_PASSES;

/// Substitution variables, keyed by name.
pub type Variables = BTreeMap<String, Value>;

/// A segment of parsed text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
  /// Literal text (no references)
  Literal(String),

  /// A `{name}` reference
  Variable(String),
}

/// Errors that can occur while parsing references.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubstituteError {
  #[error("unclosed variable reference at position {position} in '{input}'")]
  Unclosed { position: usize, input: String },
}

fn is_name_char(c: char) -> bool {
  c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')
}

/// Parse a string containing variable references into segments.
///
/// # Errors
///
/// Returns [`SubstituteError::Unclosed`] when the input ends inside what is
/// otherwise a well-formed reference, e.g. `prefix/{build_dir`.
pub fn parse(input: &str) -> Result<Vec<Segment>, SubstituteError> {
  let mut segments = Vec::new();
  let mut literal = String::new();
  let mut chars = input.char_indices().peekable();

  while let Some((pos, ch)) = chars.next() {
    match ch {
      '{' if matches!(chars.peek(), Some((_, '{'))) => {
        chars.next();
        literal.push('{');
      }
      '}' if matches!(chars.peek(), Some((_, '}'))) => {
        chars.next();
        literal.push('}');
      }
      '{' if literal.ends_with('$') => {
        // Shell `${NAME}`: copy through to the closing brace untouched.
        literal.push('{');
        for (_, c) in chars.by_ref() {
          literal.push(c);
          if c == '}' {
            break;
          }
        }
      }
      '{' => {
        let tail = &input[pos + 1..];
        let name_len = tail.find(|c: char| !is_name_char(c)).unwrap_or(tail.len());
        let name = &tail[..name_len];

        match tail[name_len..].chars().next() {
          Some('}') if !name.is_empty() => {
            if !literal.is_empty() {
              segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }
            segments.push(Segment::Variable(name.to_string()));
            // Name characters are ASCII, so byte length equals char count.
            for _ in 0..=name_len {
              chars.next();
            }
          }
          None if !name.is_empty() => {
            return Err(SubstituteError::Unclosed {
              position: pos,
              input: input.to_string(),
            });
          }
          _ => literal.push('{'),
        }
      }
      _ => literal.push(ch),
    }
  }

  if !literal.is_empty() {
    segments.push(Segment::Literal(literal));
  }

  Ok(segments)
}

/// Render a variable value the way it appears inside a larger string.
///
/// Lists are joined with spaces, `null` is empty, and mappings render as
/// compact JSON.
pub fn stringify(value: &Value) -> String {
  match value {
    Value::Null => String::new(),
    Value::String(s) => s.clone(),
    Value::Bool(b) => b.to_string(),
    Value::Number(n) => n.to_string(),
    Value::Array(items) => items.iter().map(stringify).collect::<Vec<_>>().join(" "),
    Value::Object(_) => value.to_string(),
  }
}

/// Substitute all references in a string.
///
/// # Errors
///
/// Returns an error if the string contains an unclosed reference.
pub fn substitute_str(input: &str, vars: &Variables) -> Result<String, SubstituteError> {
  let segments = parse(input)?;
  Ok(substitute_segments(&segments, vars))
}

/// Substitute references in pre-parsed segments.
pub fn substitute_segments(segments: &[Segment], vars: &Variables) -> String {
  let mut result = String::new();

  for segment in segments {
    match segment {
      Segment::Literal(s) => result.push_str(s),
      Segment::Variable(name) => {
        if let Some(value) = vars.get(name) {
          result.push_str(&stringify(value));
        }
      }
    }
  }

  result
}

/// Substitute references throughout a JSON value.
///
/// Strings are expanded in place, lists and mappings are walked recursively.
/// A string that is exactly one reference to a defined variable takes that
/// variable's value with its type intact, so `"{cmake_args}"` can become a
/// list. Within a list, such an item that expands to a list is spliced into
/// the surrounding list.
///
/// # Errors
///
/// Returns an error if any string contains an unclosed reference.
pub fn substitute_value(value: &Value, vars: &Variables) -> Result<Value, SubstituteError> {
  match value {
    Value::String(s) => substitute_string_value(s, vars),
    Value::Array(items) => {
      let mut out = Vec::with_capacity(items.len());
      for item in items {
        match (item, substitute_value(item, vars)?) {
          (Value::String(_), Value::Array(spliced)) => out.extend(spliced),
          (_, expanded) => out.push(expanded),
        }
      }
      Ok(Value::Array(out))
    }
    Value::Object(map) => {
      let mut out = serde_json::Map::with_capacity(map.len());
      for (key, item) in map {
        out.insert(key.clone(), substitute_value(item, vars)?);
      }
      Ok(Value::Object(out))
    }
    other => Ok(other.clone()),
  }
}

fn substitute_string_value(input: &str, vars: &Variables) -> Result<Value, SubstituteError> {
  let segments = parse(input)?;

  if let [Segment::Variable(name)] = segments.as_slice() {
    return Ok(match vars.get(name) {
      Some(Value::Null) | None => Value::String(String::new()),
      Some(value) => value.clone(),
    });
  }

  Ok(Value::String(substitute_segments(&segments, vars)))
}

/// Expand variables that reference other variables.
///
/// Runs substitution over the map itself until nothing changes, bounded so
/// that self-referencing variables cannot loop forever.
///
/// # Errors
///
/// Returns an error if any variable value contains an unclosed reference.
pub fn resolve_variables(vars: &Variables) -> Result<Variables, SubstituteError> {
  let mut current = vars.clone();

  for _ in 0..MAX_VARIABLE_PASSES {
    let mut next = Variables::new();
    for (name, value) in &current {
      next.insert(name.clone(), substitute_value(value, &current)?);
    }
    if next == current {
      break;
    }
    current = next;
  }

  Ok(current)
}

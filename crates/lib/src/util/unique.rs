//! An order-preserving, deduplicating sequence.
//!
//! [`UniqueList`] keeps items in first-insertion order and silently ignores
//! items whose identity key has already been seen. Identity is supplied by
//! the [`UniqueKey`] trait: structural content for configuration values,
//! lowercase name for projects.

use std::collections::HashSet;
use std::hash::Hash;

use serde_json::Value;

use super::hash::ContentHash;

/// Identity used for deduplication.
pub trait UniqueKey {
  type Key: Eq + Hash + Clone;

  fn unique_key(&self) -> Self::Key;
}

impl UniqueKey for Value {
  type Key = ContentHash;

  fn unique_key(&self) -> ContentHash {
    ContentHash::of_value(self)
  }
}

impl UniqueKey for String {
  type Key = String;

  fn unique_key(&self) -> String {
    self.clone()
  }
}

impl<T: UniqueKey + ?Sized> UniqueKey for &T {
  type Key = T::Key;

  fn unique_key(&self) -> T::Key {
    (**self).unique_key()
  }
}

/// A list that keeps only the first occurrence of each identity.
#[derive(Debug, Clone)]
pub struct UniqueList<T: UniqueKey> {
  items: Vec<T>,
  seen: HashSet<T::Key>,
}

impl<T: UniqueKey> Default for UniqueList<T> {
  fn default() -> Self {
    Self {
      items: Vec::new(),
      seen: HashSet::new(),
    }
  }
}

impl<T: UniqueKey> UniqueList<T> {
  pub fn new() -> Self {
    Self::default()
  }

  /// Append `item` unless an item with the same identity is present.
  ///
  /// Returns `true` if the item was added.
  pub fn push(&mut self, item: T) -> bool {
    if self.seen.insert(item.unique_key()) {
      self.items.push(item);
      true
    } else {
      false
    }
  }

  pub fn contains(&self, item: &T) -> bool {
    self.seen.contains(&item.unique_key())
  }

  /// Remove the item with the same identity as `item`.
  ///
  /// The identity is forgotten, so an equal item can be pushed again later.
  pub fn remove(&mut self, item: &T) -> Option<T> {
    let key = item.unique_key();
    if !self.seen.remove(&key) {
      return None;
    }
    let index = self.items.iter().position(|existing| existing.unique_key() == key)?;
    Some(self.items.remove(index))
  }

  pub fn iter(&self) -> std::slice::Iter<'_, T> {
    self.items.iter()
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn as_slice(&self) -> &[T] {
    &self.items
  }

  pub fn into_vec(self) -> Vec<T> {
    self.items
  }
}

impl<T: UniqueKey> Extend<T> for UniqueList<T> {
  fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
    for item in iter {
      self.push(item);
    }
  }
}

impl<T: UniqueKey> FromIterator<T> for UniqueList<T> {
  fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
    let mut list = Self::new();
    list.extend(iter);
    list
  }
}

impl<T: UniqueKey> IntoIterator for UniqueList<T> {
  type Item = T;
  type IntoIter = std::vec::IntoIter<T>;

  fn into_iter(self) -> Self::IntoIter {
    self.items.into_iter()
  }
}

impl<'a, T: UniqueKey> IntoIterator for &'a UniqueList<T> {
  type Item = &'a T;
  type IntoIter = std::slice::Iter<'a, T>;

  fn into_iter(self) -> Self::IntoIter {
    self.items.iter()
  }
}

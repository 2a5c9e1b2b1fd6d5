//! Shared utilities.
//!
//! Content hashing, the deduplicating list used by merging and graph
//! traversal, and test helpers.

pub mod hash;
pub mod unique;

#[cfg(test)]
pub mod testutil;

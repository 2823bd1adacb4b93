//! Field-level deltas
//!
//! A [`Delta`] is the minimal set of `(field, new value)` pairs describing the
//! unshipped changes of one entity. Keys are unique: writing the same field
//! twice keeps only the latest value.
//!
//! # Merge
//!
//! `merge` overlays the right-hand delta on the left-hand one. On a key
//! collision the right-hand value wins, so merge is associative but NOT
//! commutative:
//!
//! ```text
//! {a:"1", b:"2"} ⊕ {b:"3", c:"4"} = {a:"1", b:"3", c:"4"}
//! {b:"3", c:"4"} ⊕ {a:"1", b:"2"} = {a:"1", b:"2", c:"4"}
//! ```
//!
//! Callers must merge in application order.

use crate::field::FieldSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An ordered collection of field changes for a single entity.
///
/// Iteration order is ascending field id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delta<F: FieldSchema> {
    changes: BTreeMap<F, String>,
}

impl<F: FieldSchema> Delta<F> {
    /// Create an empty delta
    pub fn new() -> Self {
        Self {
            changes: BTreeMap::new(),
        }
    }

    /// Record a change; an earlier change to the same field is overwritten
    pub fn record(&mut self, field: F, value: impl Into<String>) {
        self.changes.insert(field, value.into());
    }

    /// Value recorded for a field, if any
    pub fn get(&self, field: F) -> Option<&str> {
        self.changes.get(&field).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (F, &str)> {
        self.changes.iter().map(|(f, v)| (*f, v.as_str()))
    }

    /// Fields touched by this delta, ascending by id
    pub fn fields(&self) -> impl Iterator<Item = F> + '_ {
        self.changes.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Overlay `other` onto `self`, `other` winning on collisions
    pub fn merge(&self, other: &Self) -> Self {
        let mut merged = self.clone();
        merged.merge_assign(other);
        merged
    }

    /// In-place merge: `self = self ⊕ other`
    pub fn merge_assign(&mut self, other: &Self) {
        for (field, value) in &other.changes {
            self.changes.insert(*field, value.clone());
        }
    }
}

impl<F: FieldSchema> Default for Delta<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: FieldSchema, V: Into<String>> FromIterator<(F, V)> for Delta<F> {
    fn from_iter<I: IntoIterator<Item = (F, V)>>(iter: I) -> Self {
        let mut delta = Delta::new();
        for (field, value) in iter {
            delta.record(field, value);
        }
        delta
    }
}

impl<F: FieldSchema> IntoIterator for Delta<F> {
    type Item = (F, String);
    type IntoIter = std::collections::btree_map::IntoIter<F, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.into_iter()
    }
}

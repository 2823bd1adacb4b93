//! The delta-aware capability shared by every tracked entity.
//!
//! The replication layer only talks to entities through this trait:
//! `extract_delta` on a successful commit, `discard_delta` on rollback and
//! `apply_delta` on the receiving side.

use crate::delta::Delta;
use crate::field::FieldSchema;

/// An entity whose writes are recorded into a pending delta.
///
/// Implementations are not internally synchronized; callers guarantee at most
/// one writer per entity.
pub trait DeltaAware {
    type Field: FieldSchema;

    /// Current value of a field
    fn get(&self, field: Self::Field) -> &str;

    /// Write a field and record the change into the pending delta
    fn set(&mut self, field: Self::Field, value: String);

    /// Write a field without recording anything
    ///
    /// Used when reconstructing state that arrived from elsewhere.
    fn store_field(&mut self, field: Self::Field, value: String);

    /// Take the pending delta, leaving none behind
    ///
    /// Returns an empty delta when nothing is pending.
    fn extract_delta(&mut self) -> Delta<Self::Field>;

    /// Drop the pending delta; live field values are kept
    fn discard_delta(&mut self);

    fn has_pending_delta(&self) -> bool;

    /// Apply a delta received from another replica
    ///
    /// Values go straight into field storage, so the local pending delta is
    /// left as it was.
    fn apply_delta(&mut self, delta: &Delta<Self::Field>) {
        for (field, value) in delta.iter() {
            self.store_field(field, value.to_string());
        }
    }
}

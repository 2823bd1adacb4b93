//! Field schema for tracked entities.
//!
//! Every entity declares its fields as a small `Copy` enum. The declared order
//! (`ALL`) is the order of the full-state wire format, and `id()` is the stable
//! small integer used by the compact delta format.

use std::fmt::Debug;

/// A fixed, ordered set of named fields with stable wire identifiers.
pub trait FieldSchema: Copy + Ord + Debug + Send + Sync + 'static {
    /// All fields in declared order.
    const ALL: &'static [Self];

    /// Stable identifier used on the wire.
    fn id(self) -> u16;

    /// Reverse lookup; `None` means the id is unknown to this schema.
    fn from_id(id: u16) -> Option<Self>;

    /// Human-readable field name.
    fn name(self) -> &'static str;
}

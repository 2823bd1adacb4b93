//! # pst-core
//!
//! Delta-tracking entity model for partial state transfer.
//!
//! An entity is a fixed set of named string fields. Every local write goes
//! through a setter that updates the live value *and* records the change in a
//! pending [`Delta`]. At a commit boundary the replication layer extracts the
//! pending delta and ships only that, instead of the whole entity.
//!
//! ```text
//! set(frame, "X")  ──►  live.frame = "X"
//!                  └─►  pending = pending ⊕ {frame: "X"}
//!
//! extract_delta()  ──►  returns pending, pending = None
//! discard_delta()  ──►  pending = None        (live values are kept)
//!
//! remote: apply(delta, replica)  ──►  raw field writes, nothing recorded
//! ```
//!
//! # Example
//!
//! ```rust
//! use pst_core::{Bicycle, BicycleField, DeltaAware};
//!
//! let mut bike = Bicycle::new();
//! bike.set_frame("Carbon");
//! bike.set_frame("Titanium");
//!
//! let delta = bike.extract_delta();
//! assert_eq!(delta.len(), 1);
//! assert_eq!(delta.get(BicycleField::Frame), Some("Titanium"));
//!
//! let mut replica = Bicycle::new();
//! replica.apply_delta(&delta);
//! assert_eq!(replica.frame(), "Titanium");
//! assert!(!replica.has_pending_delta());
//! ```

pub mod bicycle;
pub mod delta;
pub mod field;
pub mod tracked;

pub use bicycle::{Bicycle, BicycleDelta, BicycleField};
pub use delta::Delta;
pub use field::FieldSchema;
pub use tracked::DeltaAware;

//! Bicycle - a four-component tracked entity
//!
//! A bicycle is made of many components. Rather than replicating every
//! component each time one of them changes, writes are recorded into a pending
//! [`BicycleDelta`] and only that delta is shipped to the other replicas.

use crate::delta::Delta;
use crate::field::FieldSchema;
use crate::tracked::DeltaAware;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_FRAME: &str = "All-New Mongoose Freedrive DH Aluminum 210mm travel";
pub const DEFAULT_FORK: &str = "RockShox Boxxer RC w/200mm Travel, Maxle Lite DH 20mm thru-axle, Rebound & Low Speed Compression Adjust";
pub const DEFAULT_REAR_SHOCK: &str = "Fox Van R w/210mm Travel, Rebound Adjust";
pub const DEFAULT_CRANK: &str = "Truvativ Hussefelt 1.0 w/ E13 LG1 chainguide, 36t";

/// Components of a [`Bicycle`], in wire order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BicycleField {
    Frame,
    Fork,
    RearShock,
    Crank,
}

impl FieldSchema for BicycleField {
    const ALL: &'static [Self] = &[
        BicycleField::Frame,
        BicycleField::Fork,
        BicycleField::RearShock,
        BicycleField::Crank,
    ];

    fn id(self) -> u16 {
        match self {
            BicycleField::Frame => 0,
            BicycleField::Fork => 1,
            BicycleField::RearShock => 2,
            BicycleField::Crank => 3,
        }
    }

    fn from_id(id: u16) -> Option<Self> {
        match id {
            0 => Some(BicycleField::Frame),
            1 => Some(BicycleField::Fork),
            2 => Some(BicycleField::RearShock),
            3 => Some(BicycleField::Crank),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            BicycleField::Frame => "frame",
            BicycleField::Fork => "fork",
            BicycleField::RearShock => "rearShock",
            BicycleField::Crank => "crank",
        }
    }
}

impl fmt::Display for BicycleField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub type BicycleDelta = Delta<BicycleField>;

/// A bicycle whose component changes are tracked for partial replication.
///
/// Equality compares component values only; the pending delta is replication
/// bookkeeping and does not take part.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bicycle {
    frame: String,
    fork: String,
    rear_shock: String,
    crank: String,
    /// Changes not yet shipped or discarded
    #[serde(skip)]
    pending_delta: Option<BicycleDelta>,
}

impl Bicycle {
    /// Create a bicycle with empty components and nothing pending
    pub fn new() -> Self {
        Self::default()
    }

    /// Set every component to the built-in defaults.
    ///
    /// Goes through the setters, so all four components end up in the
    /// pending delta.
    pub fn initialize_with_defaults(&mut self) {
        self.set_frame(DEFAULT_FRAME);
        self.set_fork(DEFAULT_FORK);
        self.set_rear_shock(DEFAULT_REAR_SHOCK);
        self.set_crank(DEFAULT_CRANK);
    }

    // ========= components =========

    pub fn frame(&self) -> &str {
        &self.frame
    }

    pub fn set_frame(&mut self, frame: impl Into<String>) {
        self.set(BicycleField::Frame, frame.into());
    }

    pub fn fork(&self) -> &str {
        &self.fork
    }

    pub fn set_fork(&mut self, fork: impl Into<String>) {
        self.set(BicycleField::Fork, fork.into());
    }

    pub fn rear_shock(&self) -> &str {
        &self.rear_shock
    }

    pub fn set_rear_shock(&mut self, rear_shock: impl Into<String>) {
        self.set(BicycleField::RearShock, rear_shock.into());
    }

    pub fn crank(&self) -> &str {
        &self.crank
    }

    pub fn set_crank(&mut self, crank: impl Into<String>) {
        self.set(BicycleField::Crank, crank.into());
    }

    /// Pending changes, if any
    pub fn pending_delta(&self) -> Option<&BicycleDelta> {
        self.pending_delta.as_ref()
    }

    fn slot_mut(&mut self, field: BicycleField) -> &mut String {
        match field {
            BicycleField::Frame => &mut self.frame,
            BicycleField::Fork => &mut self.fork,
            BicycleField::RearShock => &mut self.rear_shock,
            BicycleField::Crank => &mut self.crank,
        }
    }
}

impl DeltaAware for Bicycle {
    type Field = BicycleField;

    fn get(&self, field: BicycleField) -> &str {
        match field {
            BicycleField::Frame => &self.frame,
            BicycleField::Fork => &self.fork,
            BicycleField::RearShock => &self.rear_shock,
            BicycleField::Crank => &self.crank,
        }
    }

    fn set(&mut self, field: BicycleField, value: String) {
        self.pending_delta
            .get_or_insert_with(BicycleDelta::new)
            .record(field, value.clone());
        *self.slot_mut(field) = value;
    }

    fn store_field(&mut self, field: BicycleField, value: String) {
        *self.slot_mut(field) = value;
    }

    fn extract_delta(&mut self) -> BicycleDelta {
        self.pending_delta.take().unwrap_or_default()
    }

    fn discard_delta(&mut self) {
        self.pending_delta = None;
    }

    fn has_pending_delta(&self) -> bool {
        self.pending_delta.is_some()
    }
}

impl PartialEq for Bicycle {
    fn eq(&self, other: &Self) -> bool {
        self.frame == other.frame
            && self.fork == other.fork
            && self.rear_shock == other.rear_shock
            && self.crank == other.crank
    }
}

impl Eq for Bicycle {}

impl fmt::Display for Bicycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "*** Bike components ***")?;
        write!(f, "=======================")?;
        for field in BicycleField::ALL {
            write!(f, "\n{}: {}", field.name(), self.get(*field))?;
        }
        Ok(())
    }
}

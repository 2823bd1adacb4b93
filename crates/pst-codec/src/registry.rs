//! Type-id keyed decoder registry
//!
//! Every payload on the wire is wrapped in an envelope carrying a small
//! numeric type id:
//!
//! ```text
//! type_id:u16 | body
//! ```
//!
//! The receiver looks the id up in an explicit table built at startup and hands
//! the body to the registered decode function. No runtime type inspection is
//! involved; an id missing from the table is a [`FormatError::UnknownTypeId`].

use crate::delta::{encode_delta, read_delta};
use crate::error::{FormatError, Result};
use crate::snapshot::{encode_entity, read_entity};
use crate::wire::{Reader, Writer};
use pst_core::{Bicycle, Delta, DeltaAware};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Type id of a full [`Bicycle`] payload
pub const BICYCLE_TYPE_ID: u16 = 22;
/// Type id of a bicycle delta payload
pub const BICYCLE_DELTA_TYPE_ID: u16 = 23;

/// Which of the two formats a payload uses
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PayloadKind {
    Full,
    Delta,
}

/// A decoded message body
#[derive(Clone, Debug, PartialEq)]
pub enum Payload<E: DeltaAware> {
    /// Complete entity state
    Full(E),
    /// Changed fields only
    Delta(Delta<E::Field>),
}

impl<E: DeltaAware> Payload<E> {
    pub fn kind(&self) -> PayloadKind {
        match self {
            Payload::Full(_) => PayloadKind::Full,
            Payload::Delta(_) => PayloadKind::Delta,
        }
    }
}

/// Decode routine for one registered type id.
///
/// Receives the body without the envelope header.
pub type DecodeFn<E> = fn(&mut DecodeContext<'_>) -> Result<Payload<E>>;

/// Body reader handed to decode routines
pub struct DecodeContext<'a> {
    reader: Reader<'a>,
}

impl DecodeContext<'_> {
    /// Read a full entity
    pub fn entity<E: DeltaAware + Default>(&mut self) -> Result<E> {
        read_entity(&mut self.reader)
    }

    /// Read a delta for entity type `E`
    pub fn delta<E: DeltaAware>(&mut self) -> Result<Delta<E::Field>> {
        read_delta(&mut self.reader)
    }
}

/// Decode a full entity body
pub fn decode_full_body<E: DeltaAware + Default>(
    ctx: &mut DecodeContext<'_>,
) -> Result<Payload<E>> {
    ctx.entity().map(Payload::Full)
}

/// Decode a delta body
pub fn decode_delta_body<E: DeltaAware>(ctx: &mut DecodeContext<'_>) -> Result<Payload<E>> {
    ctx.delta::<E>().map(Payload::Delta)
}

struct Registration<E: DeltaAware> {
    kind: PayloadKind,
    decode: DecodeFn<E>,
}

/// Dispatch table from type id to decode routine for entity type `E`.
pub struct CodecRegistry<E: DeltaAware> {
    entries: BTreeMap<u16, Registration<E>>,
}

impl<E: DeltaAware> CodecRegistry<E> {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Register a decode routine under `type_id`.
    ///
    /// Ids are assigned once; registering the same id twice is an error.
    pub fn register(
        &mut self,
        type_id: u16,
        kind: PayloadKind,
        decode: DecodeFn<E>,
    ) -> Result<()> {
        if self.entries.contains_key(&type_id) {
            return Err(FormatError::DuplicateTypeId(type_id));
        }
        self.entries.insert(type_id, Registration { kind, decode });
        Ok(())
    }

    /// Type id used when encoding payloads of `kind`
    pub fn type_id_for(&self, kind: PayloadKind) -> Option<u16> {
        self.entries
            .iter()
            .find(|(_, reg)| reg.kind == kind)
            .map(|(id, _)| *id)
    }

    /// All registered ids, ascending
    pub fn type_ids(&self) -> impl Iterator<Item = u16> + '_ {
        self.entries.keys().copied()
    }

    /// Wrap a payload in its envelope
    pub fn encode(&self, payload: &Payload<E>) -> Result<Vec<u8>> {
        let kind = payload.kind();
        let type_id = self
            .type_id_for(kind)
            .ok_or(FormatError::UnregisteredKind(kind))?;

        let body = match payload {
            Payload::Full(entity) => encode_entity(entity)?,
            Payload::Delta(delta) => encode_delta(delta)?,
        };

        let mut writer = Writer::with_capacity(2 + body.len());
        writer.put_u16(type_id)?;
        writer.put_bytes(&body)?;
        Ok(writer.into_bytes())
    }

    /// Read the envelope and dispatch to the registered decoder
    pub fn decode(&self, bytes: &[u8]) -> Result<Payload<E>> {
        let mut reader = Reader::new(bytes);
        let type_id = reader.read_u16()?;
        let registration = self
            .entries
            .get(&type_id)
            .ok_or(FormatError::UnknownTypeId(type_id))?;

        let mut ctx = DecodeContext {
            reader: Reader::new(reader.rest()),
        };
        let payload = (registration.decode)(&mut ctx)?;
        ctx.reader.finish()?;
        Ok(payload)
    }
}

impl<E: DeltaAware + Default> CodecRegistry<E> {
    /// Registry with the standard full and delta decoders for `E`
    pub fn with_entity_codecs(full_type_id: u16, delta_type_id: u16) -> Result<Self> {
        let mut registry = Self::new();
        registry.register(full_type_id, PayloadKind::Full, decode_full_body::<E>)?;
        registry.register(delta_type_id, PayloadKind::Delta, decode_delta_body::<E>)?;
        Ok(registry)
    }
}

impl CodecRegistry<Bicycle> {
    /// The bicycle registry: 22 for full state, 23 for deltas
    pub fn bicycles() -> Result<Self> {
        Self::with_entity_codecs(BICYCLE_TYPE_ID, BICYCLE_DELTA_TYPE_ID)
    }
}

impl<E: DeltaAware> Default for CodecRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}

//! Delta format
//!
//! ```text
//! pair_count:u32 | (field_id:u16 | value_len:u32 | value_bytes) * pair_count
//! ```
//!
//! Pairs are written in ascending field id. A field id the receiving schema
//! does not know means the replicas disagree on the schema version, so decoding
//! fails rather than silently dropping the change.

use crate::error::{FormatError, Result};
use crate::wire::{Reader, Writer};
use pst_core::{Delta, FieldSchema};

/// Encode a delta.
pub fn encode_delta<F: FieldSchema>(delta: &Delta<F>) -> Result<Vec<u8>> {
    let mut writer = Writer::new();
    writer.put_len(delta.len())?;
    for (field, value) in delta.iter() {
        writer.put_u16(field.id())?;
        writer.put_str(value)?;
    }
    Ok(writer.into_bytes())
}

/// Decode a delta.
///
/// A field named twice collapses to the later value.
pub fn decode_delta<F: FieldSchema>(bytes: &[u8]) -> Result<Delta<F>> {
    let mut reader = Reader::new(bytes);
    let delta = read_delta(&mut reader)?;
    reader.finish()?;
    Ok(delta)
}

pub(crate) fn read_delta<F: FieldSchema>(reader: &mut Reader<'_>) -> Result<Delta<F>> {
    let count = reader.read_u32()?;
    let mut delta = Delta::new();
    for _ in 0..count {
        let id = reader.read_u16()?;
        let field = F::from_id(id).ok_or(FormatError::UnknownField(id))?;
        let value = reader.read_string()?;
        delta.record(field, value);
    }
    Ok(delta)
}

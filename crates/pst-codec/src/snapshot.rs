//! Full-entity format
//!
//! ```text
//! field_1_len:u32 | field_1_bytes | ... | field_N_len:u32 | field_N_bytes
//! ```
//!
//! Fields are written in the schema's declared order. Used for the first
//! replication of a key, when the receiver has nothing to apply a delta to.

use crate::error::Result;
use crate::wire::{Reader, Writer};
use pst_core::{DeltaAware, FieldSchema};

/// Encode every field of an entity.
pub fn encode_entity<E: DeltaAware>(entity: &E) -> Result<Vec<u8>> {
    let fields = <E::Field as FieldSchema>::ALL;
    let size: usize = fields.iter().map(|f| 4 + entity.get(*f).len()).sum();

    let mut writer = Writer::with_capacity(size);
    for field in fields {
        writer.put_str(entity.get(*field))?;
    }
    Ok(writer.into_bytes())
}

/// Decode a full entity.
///
/// The result has no pending delta: received state is not re-shipped.
pub fn decode_entity<E: DeltaAware + Default>(bytes: &[u8]) -> Result<E> {
    let mut reader = Reader::new(bytes);
    let entity = read_entity(&mut reader)?;
    reader.finish()?;
    Ok(entity)
}

pub(crate) fn read_entity<E: DeltaAware + Default>(reader: &mut Reader<'_>) -> Result<E> {
    let mut entity = E::default();
    for field in <E::Field as FieldSchema>::ALL {
        let value = reader.read_string()?;
        entity.store_field(*field, value);
    }
    Ok(entity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FormatError;
    use pst_core::Bicycle;

    fn sample() -> Bicycle {
        let mut bike = Bicycle::new();
        bike.set_frame("F");
        bike.set_fork("K");
        bike.set_rear_shock("R");
        bike.set_crank("C");
        bike
    }

    #[test]
    fn test_round_trip() {
        let bike = sample();
        let bytes = encode_entity(&bike).unwrap();
        let decoded: Bicycle = decode_entity(&bytes).unwrap();

        assert_eq!(decoded, bike);
        assert!(!decoded.has_pending_delta());
    }

    #[test]
    fn test_exact_layout() {
        let bytes = encode_entity(&sample()).unwrap();

        assert_eq!(
            bytes,
            vec![
                0, 0, 0, 1, b'F', //
                0, 0, 0, 1, b'K', //
                0, 0, 0, 1, b'R', //
                0, 0, 0, 1, b'C',
            ]
        );
    }

    #[test]
    fn test_empty_entity() {
        let bytes = encode_entity(&Bicycle::new()).unwrap();
        assert_eq!(bytes, vec![0; 16]);

        let decoded: Bicycle = decode_entity(&bytes).unwrap();
        assert_eq!(decoded, Bicycle::new());
    }

    #[test]
    fn test_encoding_ignores_pending_state() {
        let mut bike = sample();
        let before = encode_entity(&bike).unwrap();
        bike.extract_delta();

        assert_eq!(encode_entity(&bike).unwrap(), before);
    }

    #[test]
    fn test_truncated_before_all_fields() {
        let bytes = encode_entity(&sample()).unwrap();

        // Drop the last field entirely
        let result: Result<Bicycle> = decode_entity(&bytes[..15]);
        assert_eq!(
            result,
            Err(FormatError::Truncated {
                needed: 4,
                remaining: 0
            })
        );
    }

    #[test]
    fn test_length_prefix_overruns_buffer() {
        let mut bytes = encode_entity(&sample()).unwrap();
        // Claim the crank is 200 bytes long
        bytes[15..19].copy_from_slice(&200u32.to_be_bytes());

        let result: Result<Bicycle> = decode_entity(&bytes);
        assert_eq!(
            result,
            Err(FormatError::LengthOverrun {
                declared: 200,
                remaining: 1
            })
        );
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut bytes = encode_entity(&sample()).unwrap();
        bytes.push(0);

        let result: Result<Bicycle> = decode_entity(&bytes);
        assert_eq!(result, Err(FormatError::TrailingBytes(1)));
    }
}

//! # pst-codec
//!
//! Binary wire formats for partial state transfer.
//!
//! Two independent formats, each tagged with a registry-assigned type id so
//! the receiver can pick the right decoder:
//!
//! | type id | format | layout |
//! |---------|--------|--------|
//! | 22 | full bicycle | `(len:u32 \| utf8)` per field, declared order |
//! | 23 | bicycle delta | `count:u32 \| (field_id:u16 \| len:u32 \| utf8) * count` |
//!
//! All integers are big-endian.
//!
//! ## Example
//!
//! ```rust
//! use pst_codec::{CodecRegistry, Payload};
//! use pst_core::{Bicycle, DeltaAware};
//!
//! let registry = CodecRegistry::bicycles().unwrap();
//!
//! let mut bike = Bicycle::new();
//! bike.set_frame("Carbon");
//! let bytes = registry.encode(&Payload::Delta(bike.extract_delta())).unwrap();
//!
//! let mut replica = Bicycle::new();
//! if let Payload::Delta(delta) = registry.decode(&bytes).unwrap() {
//!     replica.apply_delta(&delta);
//! }
//! assert_eq!(replica.frame(), "Carbon");
//! ```

pub mod delta;
pub mod error;
pub mod registry;
pub mod snapshot;
mod wire;

pub use delta::{decode_delta, encode_delta};
pub use error::{FormatError, Result};
pub use registry::{
    decode_delta_body, decode_full_body, CodecRegistry, DecodeContext, DecodeFn, Payload,
    PayloadKind, BICYCLE_DELTA_TYPE_ID, BICYCLE_TYPE_ID,
};
pub use snapshot::{decode_entity, encode_entity};

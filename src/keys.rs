//! Key Encoding
//!
//! Maps logical records onto the flat ordered key space of the engine.
//!
//! ## Layout
//! ```text
//! metadata entry:  '+' | record key                          → type tag (1 byte)
//! field entry:     '-' | key_len (u32 BE) | record key | '|' | field → value
//! ```
//!
//! The record key is length-prefixed inside field entries, so every field
//! of one record shares the exact prefix `'-' | key_len | key | '|'` and no
//! other record's entries can fall inside that range, whatever bytes the
//! keys contain. The separator is fixed for layout stability but never
//! searched for when decoding.
//!
//! These three bytes are part of the on-disk format. Changing any of them
//! breaks existing databases.

use crate::db::DataType;
use crate::error::{EmberError, Result};

/// Namespace byte for per-key type metadata
pub const META_PREFIX: u8 = b'+';

/// Namespace byte for field/value entries
pub const VALUE_PREFIX: u8 = b'-';

/// Byte between the record key and the field name
pub const SEPARATOR: u8 = b'|';

/// Size of the record-key length prefix in field entries
const KEY_LEN_SIZE: usize = 4;

/// Encode the metadata key of a record
pub fn encode_meta(key: &[u8]) -> Vec<u8> {
    let mut encoded = Vec::with_capacity(1 + key.len());
    encoded.push(META_PREFIX);
    encoded.extend_from_slice(key);
    encoded
}

/// Encode the key of one field entry.
///
/// With an empty `field` this is exactly [`field_prefix`].
pub fn encode_field(key: &[u8], field: &[u8]) -> Vec<u8> {
    let mut encoded = Vec::with_capacity(2 + KEY_LEN_SIZE + key.len() + field.len());
    encoded.push(VALUE_PREFIX);
    encoded.extend_from_slice(&(key.len() as u32).to_be_bytes());
    encoded.extend_from_slice(key);
    encoded.push(SEPARATOR);
    encoded.extend_from_slice(field);
    encoded
}

/// Prefix shared by every field entry of `key` (the scan bound)
pub fn field_prefix(key: &[u8]) -> Vec<u8> {
    encode_field(key, &[])
}

/// Recover the field name from an encoded field entry key.
///
/// Returns `None` if `encoded` is not a well-formed field entry key.
pub fn decode_field(encoded: &[u8]) -> Option<&[u8]> {
    let (&prefix, rest) = encoded.split_first()?;
    if prefix != VALUE_PREFIX || rest.len() < KEY_LEN_SIZE {
        return None;
    }

    let mut len = [0u8; KEY_LEN_SIZE];
    len.copy_from_slice(&rest[..KEY_LEN_SIZE]);
    let key_len = u32::from_be_bytes(len) as usize;

    let sep_pos = KEY_LEN_SIZE.checked_add(key_len)?;
    match rest.get(sep_pos) {
        Some(&SEPARATOR) => Some(&rest[sep_pos + 1..]),
        _ => None,
    }
}

/// Encode a metadata value
pub fn encode_metadata(data_type: DataType) -> Vec<u8> {
    vec![data_type.as_byte()]
}

/// Decode a metadata value read from the store
pub fn decode_metadata(value: &[u8]) -> Result<DataType> {
    match value {
        [tag] => DataType::from_byte(*tag).ok_or_else(|| {
            EmberError::Storage(format!("unknown type tag 0x{:02x} in metadata", tag))
        }),
        _ => Err(EmberError::Storage(format!(
            "metadata entry of {} bytes, expected 1",
            value.len()
        ))),
    }
}

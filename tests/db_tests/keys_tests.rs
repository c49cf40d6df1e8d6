//! Key Encoding Tests
//!
//! Tests verify:
//! - Metadata and field entries live in separate namespaces
//! - Field entries of one record share a prefix no other record matches
//! - Field names decode back from encoded keys

use emberkv::keys::{
    decode_field, decode_metadata, encode_field, encode_meta, encode_metadata, field_prefix,
    META_PREFIX, SEPARATOR, VALUE_PREFIX,
};
use emberkv::{DataType, EmberError};

#[test]
fn test_meta_layout() {
    assert_eq!(encode_meta(b"user"), b"+user".to_vec());
    assert_eq!(encode_meta(b"")[0], META_PREFIX);
}

#[test]
fn test_field_layout() {
    let encoded = encode_field(b"user", b"name");

    assert_eq!(encoded[0], VALUE_PREFIX);
    assert_eq!(&encoded[1..5], &4u32.to_be_bytes());
    assert_eq!(&encoded[5..9], b"user");
    assert_eq!(encoded[9], SEPARATOR);
    assert_eq!(&encoded[10..], b"name");
}

#[test]
fn test_field_prefix_is_field_with_empty_name() {
    assert_eq!(field_prefix(b"k"), encode_field(b"k", b""));
    assert!(encode_field(b"k", b"f").starts_with(&field_prefix(b"k")));
}

#[test]
fn test_prefixes_do_not_overlap_between_records() {
    // "a|b" with field "c" versus "a" with field "b|c"
    let tricky = encode_field(b"a|b", b"c");
    assert!(!tricky.starts_with(&field_prefix(b"a")));
    assert!(!encode_field(b"a", b"b|c").starts_with(&field_prefix(b"a|b")));

    // A key that extends another key
    assert!(!encode_field(b"hh", b"x").starts_with(&field_prefix(b"h")));
}

#[test]
fn test_decode_field() {
    assert_eq!(decode_field(&encode_field(b"user", b"name")), Some(&b"name"[..]));
    assert_eq!(decode_field(&encode_field(b"k|ey", b"f|d")), Some(&b"f|d"[..]));
    assert_eq!(decode_field(&encode_field(b"k", b"")), Some(&b""[..]));
}

#[test]
fn test_decode_field_rejects_malformed_keys() {
    assert_eq!(decode_field(b""), None);
    assert_eq!(decode_field(&encode_meta(b"user")), None);
    assert_eq!(decode_field(b"-\x00\x00"), None);

    // Length says 9 but the key is shorter
    let mut bad = encode_field(b"user", b"name");
    bad[1..5].copy_from_slice(&9u32.to_be_bytes());
    assert_eq!(decode_field(&bad), None);
}

#[test]
fn test_metadata_values() {
    assert_eq!(encode_metadata(DataType::Hash), vec![0x03]);
    assert_eq!(decode_metadata(&[0x03]).unwrap(), DataType::Hash);
    assert_eq!(decode_metadata(&[0x05]).unwrap(), DataType::SortedSet);

    assert!(matches!(decode_metadata(&[0x09]), Err(EmberError::Storage(_))));
    assert!(matches!(decode_metadata(&[]), Err(EmberError::Storage(_))));
    assert!(matches!(decode_metadata(&[3, 3]), Err(EmberError::Storage(_))));
}

#[test]
fn test_type_names() {
    let names: Vec<_> = (1u8..=5)
        .map(|tag| DataType::from_byte(tag).unwrap().name())
        .collect();
    assert_eq!(names, vec!["string", "list", "hash", "set", "zset"]);
    assert_eq!(DataType::from_byte(0), None);
}

//! Protocol Codec Tests
//!
//! Tests verify:
//! - Request parsing (arrays of bulk strings and inline commands)
//! - Reply encoding for every reply kind
//! - Malformed input is rejected as a protocol error
//! - Stream helpers over buffered readers

use std::io::{BufReader, Cursor};

use emberkv::protocol::{
    decode_command, decode_reply, encode_command, encode_reply, read_command, read_reply,
    write_command, write_reply, Command, Reply, ReplyError,
};
use emberkv::EmberError;

fn args(parts: &[&str]) -> Vec<Vec<u8>> {
    parts.iter().map(|p| p.as_bytes().to_vec()).collect()
}

// =============================================================================
// Request Parsing Tests
// =============================================================================

#[test]
fn test_decode_array_command() {
    let bytes = b"*4\r\n$4\r\nHSET\r\n$4\r\nuser\r\n$4\r\nname\r\n$3\r\nada\r\n";
    let command = decode_command(bytes).unwrap();

    assert_eq!(command.name, b"HSET".to_vec());
    assert_eq!(command.args, args(&["user", "name", "ada"]));
    assert_eq!(command.name_lowercase(), "hset");
}

#[test]
fn test_decode_binary_safe_arguments() {
    let mut bytes = b"*2\r\n$3\r\nGET\r\n$5\r\n".to_vec();
    bytes.extend_from_slice(b"a\r\n\0b");
    bytes.extend_from_slice(b"\r\n");

    let command = decode_command(&bytes).unwrap();
    assert_eq!(command.args, vec![b"a\r\n\0b".to_vec()]);
}

#[test]
fn test_decode_inline_command() {
    let command = decode_command(b"hget  user\tname\r\n").unwrap();
    assert_eq!(command.name, b"hget".to_vec());
    assert_eq!(command.args, args(&["user", "name"]));

    // Bare newline terminator
    let command = decode_command(b"PING\n").unwrap();
    assert_eq!(command.name, b"PING".to_vec());
    assert!(command.args.is_empty());
}

#[test]
fn test_blank_lines_and_empty_arrays_skipped() {
    let command = decode_command(b"\r\n*0\r\n\r\n*1\r\n$4\r\nPING\r\n").unwrap();
    assert_eq!(command.name, b"PING".to_vec());
}

#[test]
fn test_encode_command_round_trips_through_decoder() {
    let command = Command::new("HMSET", args(&["k", "f1", "v 1", "f2", ""]));
    let encoded = encode_command(&command);

    assert!(encoded.starts_with(b"*6\r\n$5\r\nHMSET\r\n"));
    assert_eq!(decode_command(&encoded).unwrap(), command);
}

#[test]
fn test_pipelined_commands_read_in_order() {
    let stream = b"*1\r\n$4\r\nPING\r\nECHO hi\r\n*2\r\n$4\r\nECHO\r\n$2\r\nyo\r\n".to_vec();
    let mut reader = BufReader::new(Cursor::new(stream));

    assert_eq!(read_command(&mut reader).unwrap().name, b"PING".to_vec());
    assert_eq!(read_command(&mut reader).unwrap().args, args(&["hi"]));
    assert_eq!(read_command(&mut reader).unwrap().args, args(&["yo"]));

    match read_command(&mut reader) {
        Err(EmberError::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::UnexpectedEof),
        other => panic!("Expected end of stream, got {:?}", other),
    }
}

// =============================================================================
// Malformed Request Tests
// =============================================================================

#[test]
fn test_bad_array_length_rejected() {
    assert!(matches!(
        decode_command(b"*abc\r\n"),
        Err(EmberError::Protocol(_))
    ));
}

#[test]
fn test_oversized_array_rejected() {
    assert!(matches!(
        decode_command(b"*99999999\r\n"),
        Err(EmberError::Protocol(_))
    ));
}

#[test]
fn test_missing_bulk_marker_rejected() {
    assert!(matches!(
        decode_command(b"*1\r\n:4\r\nPING\r\n"),
        Err(EmberError::Protocol(_))
    ));
}

#[test]
fn test_negative_bulk_length_in_request_rejected() {
    assert!(matches!(
        decode_command(b"*1\r\n$-1\r\n"),
        Err(EmberError::Protocol(_))
    ));
}

#[test]
fn test_bulk_without_crlf_rejected() {
    assert!(matches!(
        decode_command(b"*1\r\n$4\r\nPINGxx"),
        Err(EmberError::Protocol(_))
    ));
}

#[test]
fn test_truncated_request_is_eof() {
    match decode_command(b"*2\r\n$4\r\nHGET\r\n") {
        Err(EmberError::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::UnexpectedEof),
        other => panic!("Expected UnexpectedEof, got {:?}", other),
    }
}

// =============================================================================
// Reply Encoding Tests
// =============================================================================

#[test]
fn test_encode_scalar_replies() {
    assert_eq!(&encode_reply(&Reply::ok())[..], b"+OK\r\n");
    assert_eq!(&encode_reply(&Reply::Nil)[..], b"$-1\r\n");
    assert_eq!(&encode_reply(&Reply::Integer(-42))[..], b":-42\r\n");
    assert_eq!(&encode_reply(&Reply::Bulk(b"ada".to_vec()))[..], b"$3\r\nada\r\n");
    assert_eq!(&encode_reply(&Reply::Bulk(Vec::new()))[..], b"$0\r\n\r\n");
}

#[test]
fn test_encode_error_replies() {
    assert_eq!(
        &encode_reply(&ReplyError::WrongType.into())[..],
        &b"-WRONGTYPE Operation against a key holding the wrong kind of value\r\n"[..]
    );
    assert_eq!(
        &encode_reply(&ReplyError::WrongNumberOfArguments("hget".to_string()).into())[..],
        &b"-ERR wrong number of arguments for 'hget' command\r\n"[..]
    );
}

#[test]
fn test_encode_nested_array() {
    let reply = Reply::Array(vec![
        Reply::Bulk(b"f".to_vec()),
        Reply::Nil,
        Reply::Array(vec![Reply::Integer(1)]),
    ]);
    assert_eq!(
        &encode_reply(&reply)[..],
        &b"*3\r\n$1\r\nf\r\n$-1\r\n*1\r\n:1\r\n"[..]
    );
    assert_eq!(&encode_reply(&Reply::empty_array())[..], b"*0\r\n");
}

#[test]
fn test_status_line_breaks_are_flattened() {
    let reply = Reply::Status("two\r\nlines".to_string());
    assert_eq!(&encode_reply(&reply)[..], b"+two  lines\r\n");
}

// =============================================================================
// Reply Decoding Tests
// =============================================================================

#[test]
fn test_decode_replies() {
    assert_eq!(decode_reply(b"+PONG\r\n").unwrap(), Reply::Status("PONG".into()));
    assert_eq!(decode_reply(b":7\r\n").unwrap(), Reply::Integer(7));
    assert_eq!(decode_reply(b"$-1\r\n").unwrap(), Reply::Nil);
    assert_eq!(
        decode_reply(b"*2\r\n$1\r\na\r\n$-1\r\n").unwrap(),
        Reply::Array(vec![Reply::Bulk(b"a".to_vec()), Reply::Nil])
    );
    assert_eq!(
        decode_reply(b"-ERR boom\r\n").unwrap(),
        Reply::Error(ReplyError::Remote("ERR boom".into()))
    );
}

#[test]
fn test_decode_unknown_reply_type() {
    assert!(matches!(decode_reply(b"?x\r\n"), Err(EmberError::Protocol(_))));
}

#[test]
fn test_stream_helpers() {
    let mut wire = Vec::new();
    write_command(&mut wire, &Command::new("PING", vec![])).unwrap();
    write_reply(&mut wire, &Reply::Integer(3)).unwrap();

    let mut reader = BufReader::new(Cursor::new(wire));
    assert_eq!(read_command(&mut reader).unwrap().name, b"PING".to_vec());
    assert_eq!(read_reply(&mut reader).unwrap(), Reply::Integer(3));
}

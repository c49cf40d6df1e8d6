//! Protocol codec
//!
//! Encoding and decoding for RESP2.
//!
//! ## Wire Format
//!
//! ### Request
//! ```text
//! *<argc>\r\n
//! $<len>\r\n<arg bytes>\r\n      (repeated argc times)
//! ```
//! A line not starting with `*` is an inline command: whitespace-separated
//! words terminated by `\n` (optionally `\r\n`).
//!
//! ### Reply
//! ```text
//! +<status>\r\n     -<error>\r\n     :<integer>\r\n
//! $<len>\r\n<bytes>\r\n    $-1\r\n (nil)    *<n>\r\n<n replies>
//! ```

use std::io::{self, BufRead, Read, Write};

use bytes::{BufMut, Bytes, BytesMut};

use super::{Command, Reply, ReplyError};
use crate::error::{EmberError, Result};

const CRLF: &[u8] = b"\r\n";

/// Largest bulk string accepted (512 MB)
pub const MAX_BULK_LEN: usize = 512 * 1024 * 1024;

/// Largest number of elements in a request array
pub const MAX_ARRAY_LEN: usize = 1024 * 1024;

/// Longest header or inline line accepted (64 KB)
pub const MAX_LINE_LEN: usize = 64 * 1024;

// =============================================================================
// Encoding
// =============================================================================

/// Encode a command as an array of bulk strings
pub fn encode_command(command: &Command) -> Bytes {
    let parts: Vec<&[u8]> = command.parts().collect();

    let mut buf = BytesMut::with_capacity(16 + parts.iter().map(|p| p.len() + 16).sum::<usize>());
    put_header(&mut buf, b'*', parts.len() as i64);
    for part in parts {
        put_bulk(&mut buf, part);
    }
    buf.freeze()
}

/// Encode a reply
pub fn encode_reply(reply: &Reply) -> Bytes {
    let mut buf = BytesMut::new();
    put_reply(&mut buf, reply);
    buf.freeze()
}

fn put_reply(buf: &mut BytesMut, reply: &Reply) {
    match reply {
        Reply::Nil => buf.put_slice(b"$-1\r\n"),
        Reply::Integer(n) => put_header(buf, b':', *n),
        Reply::Bulk(data) => put_bulk(buf, data),
        Reply::Array(items) => {
            put_header(buf, b'*', items.len() as i64);
            for item in items {
                put_reply(buf, item);
            }
        }
        Reply::Status(status) => put_line(buf, b'+', status),
        Reply::Error(err) => put_line(buf, b'-', &err.to_string()),
    }
}

fn put_header(buf: &mut BytesMut, marker: u8, n: i64) {
    buf.put_u8(marker);
    buf.put_slice(n.to_string().as_bytes());
    buf.put_slice(CRLF);
}

fn put_bulk(buf: &mut BytesMut, data: &[u8]) {
    put_header(buf, b'$', data.len() as i64);
    buf.put_slice(data);
    buf.put_slice(CRLF);
}

// Simple strings cannot carry line breaks
fn put_line(buf: &mut BytesMut, marker: u8, text: &str) {
    buf.put_u8(marker);
    for byte in text.bytes() {
        buf.put_u8(if byte == b'\r' || byte == b'\n' { b' ' } else { byte });
    }
    buf.put_slice(CRLF);
}

// =============================================================================
// Decoding
// =============================================================================

/// Decode one command from the start of `bytes`
pub fn decode_command(bytes: &[u8]) -> Result<Command> {
    let mut reader = bytes;
    read_command(&mut reader)
}

/// Decode one reply from the start of `bytes`
pub fn decode_reply(bytes: &[u8]) -> Result<Reply> {
    let mut reader = bytes;
    read_reply(&mut reader)
}

// =============================================================================
// Stream-based I/O helpers
// =============================================================================

/// Read a complete command from a stream
///
/// Blocks until a complete command is received. Empty arrays and blank
/// inline lines are skipped. A stream that ends before a command starts
/// yields an `UnexpectedEof` I/O error; a malformed request yields
/// [`EmberError::Protocol`].
pub fn read_command<R: BufRead>(reader: &mut R) -> Result<Command> {
    loop {
        let line = read_line(reader)?.ok_or_else(|| {
            EmberError::Io(io::Error::new(io::ErrorKind::UnexpectedEof, "stream closed"))
        })?;

        let parts = if line.first() == Some(&b'*') {
            let count = parse_integer(&line[1..], "invalid multibulk length")?;
            if count > MAX_ARRAY_LEN as i64 {
                return Err(EmberError::Protocol("invalid multibulk length".to_string()));
            }
            let count = count.max(0) as usize;

            let mut parts = Vec::with_capacity(count);
            for _ in 0..count {
                parts.push(read_bulk_arg(reader)?);
            }
            parts
        } else {
            split_inline(&line)
        };

        if let Some(command) = Command::from_parts(parts) {
            return Ok(command);
        }
    }
}

/// Write a command to a stream
pub fn write_command<W: Write>(writer: &mut W, command: &Command) -> Result<()> {
    writer.write_all(&encode_command(command))?;
    writer.flush()?;
    Ok(())
}

/// Read a complete reply from a stream
pub fn read_reply<R: BufRead>(reader: &mut R) -> Result<Reply> {
    let line = read_line(reader)?.ok_or_else(|| {
        EmberError::Io(io::Error::new(io::ErrorKind::UnexpectedEof, "stream closed"))
    })?;

    let (&marker, rest) = line
        .split_first()
        .ok_or_else(|| EmberError::Protocol("empty reply line".to_string()))?;

    match marker {
        b'+' => Ok(Reply::Status(String::from_utf8_lossy(rest).into_owned())),
        b'-' => Ok(Reply::Error(ReplyError::Remote(
            String::from_utf8_lossy(rest).into_owned(),
        ))),
        b':' => Ok(Reply::Integer(parse_integer(rest, "invalid integer reply")?)),
        b'$' => {
            let len = parse_integer(rest, "invalid bulk length")?;
            if len < 0 {
                return Ok(Reply::Nil);
            }
            if len > MAX_BULK_LEN as i64 {
                return Err(EmberError::Protocol("invalid bulk length".to_string()));
            }
            Ok(Reply::Bulk(read_bulk_body(reader, len as usize)?))
        }
        b'*' => {
            let count = parse_integer(rest, "invalid multibulk length")?;
            if count < 0 {
                return Ok(Reply::Nil);
            }
            if count > MAX_ARRAY_LEN as i64 {
                return Err(EmberError::Protocol("invalid multibulk length".to_string()));
            }
            let mut items = Vec::with_capacity(count as usize);
            for _ in 0..count {
                items.push(read_reply(reader)?);
            }
            Ok(Reply::Array(items))
        }
        other => Err(EmberError::Protocol(format!(
            "unknown reply type '{}'",
            other as char
        ))),
    }
}

/// Write a reply to a stream
pub fn write_reply<W: Write>(writer: &mut W, reply: &Reply) -> Result<()> {
    writer.write_all(&encode_reply(reply))?;
    writer.flush()?;
    Ok(())
}

/// Read one `\n`-terminated line without its terminator.
///
/// `None` on a clean end of stream.
fn read_line<R: BufRead>(reader: &mut R) -> Result<Option<Vec<u8>>> {
    let mut line = Vec::new();
    let read = reader
        .by_ref()
        .take(MAX_LINE_LEN as u64 + 2)
        .read_until(b'\n', &mut line)?;

    if read == 0 {
        return Ok(None);
    }
    if line.last() != Some(&b'\n') {
        if line.len() > MAX_LINE_LEN {
            return Err(EmberError::Protocol("too big request line".to_string()));
        }
        return Err(EmberError::Io(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "stream closed mid-line",
        )));
    }

    line.pop();
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    Ok(Some(line))
}

fn read_bulk_arg<R: BufRead>(reader: &mut R) -> Result<Vec<u8>> {
    let header = read_line(reader)?.ok_or_else(|| {
        EmberError::Io(io::Error::new(io::ErrorKind::UnexpectedEof, "stream closed"))
    })?;

    match header.split_first() {
        Some((b'$', rest)) => {
            let len = parse_integer(rest, "invalid bulk length")?;
            if len < 0 || len > MAX_BULK_LEN as i64 {
                return Err(EmberError::Protocol("invalid bulk length".to_string()));
            }
            read_bulk_body(reader, len as usize)
        }
        Some((&other, _)) => Err(EmberError::Protocol(format!(
            "expected '$', got '{}'",
            other as char
        ))),
        None => Err(EmberError::Protocol("expected '$', got empty line".to_string())),
    }
}

fn read_bulk_body<R: Read>(reader: &mut R, len: usize) -> Result<Vec<u8>> {
    let mut data = vec![0u8; len + 2];
    reader.read_exact(&mut data)?;

    if &data[len..] != CRLF {
        return Err(EmberError::Protocol(
            "bulk string not terminated by CRLF".to_string(),
        ));
    }
    data.truncate(len);
    Ok(data)
}

fn parse_integer(digits: &[u8], what: &str) -> Result<i64> {
    std::str::from_utf8(digits)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| EmberError::Protocol(what.to_string()))
}

fn split_inline(line: &[u8]) -> Vec<Vec<u8>> {
    line.split(|b| b.is_ascii_whitespace())
        .filter(|word| !word.is_empty())
        .map(|word| word.to_vec())
        .collect()
}

//! # RESP2 Encoding and Parsing
//!
//! Purpose: Encode client commands and read server replies into
//! `ReplyValue`s without external dependencies, keeping allocations under
//! control.
//!
//! ## Design Principles
//! 1. **State-Free Parsing**: Replies are parsed top-down with minimal state.
//! 2. **Buffer Reuse**: Caller provides buffers to avoid per-call allocations.
//! 3. **Binary-Safe Framing**: Bulk lengths are honored byte-for-byte.
//! 4. **Fail Fast**: Invalid framing returns protocol errors immediately.
//! 5. **Bounded Trust**: Length headers never size an allocation up front and
//!    nesting depth is capped, so a corrupt stream fails instead of panicking.

use std::io::{self, BufRead, Read};

use crate::error::TransportError;
use crate::reply::ReplyValue;

/// Encodes a RESP2 array command into the provided buffer.
pub fn encode_command<A: AsRef<[u8]>>(args: &[A], out: &mut Vec<u8>) {
    out.push(b'*');
    push_usize(out, args.len());
    out.extend_from_slice(b"\r\n");
    for arg in args {
        let arg = arg.as_ref();
        out.push(b'$');
        push_usize(out, arg.len());
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(arg);
        out.extend_from_slice(b"\r\n");
    }
}

/// Largest bulk string accepted, matching the server's own limit.
pub const MAX_BULK_LEN: i64 = 512 * 1024 * 1024;

/// Deepest array nesting accepted in one reply.
pub const MAX_NESTING: usize = 64;

// Upper bound on slots reserved before array elements arrive.
const PREALLOC_LIMIT: usize = 1024;

/// Reads one reply from the buffered reader.
///
/// A stream that ends before the first byte of the reply yields
/// `TransportError::NoReply`.
pub fn read_reply<R: BufRead>(
    reader: &mut R,
    line_buf: &mut Vec<u8>,
) -> Result<ReplyValue, TransportError> {
    read_value(reader, line_buf, 0)
}

fn read_value<R: BufRead>(
    reader: &mut R,
    line_buf: &mut Vec<u8>,
    depth: usize,
) -> Result<ReplyValue, TransportError> {
    read_line(reader, line_buf)?;
    if line_buf.is_empty() {
        return Err(TransportError::Protocol("empty reply line".to_string()));
    }

    match line_buf[0] {
        b'+' => Ok(ReplyValue::Status(text(&line_buf[1..]))),
        b'-' => Ok(ReplyValue::Error(text(&line_buf[1..]))),
        b':' => Ok(ReplyValue::Integer(parse_i64(&line_buf[1..])?)),
        b'$' => {
            let len = parse_i64(&line_buf[1..])?;
            parse_bulk_len(reader, len, line_buf)
        }
        b'*' => {
            let len = parse_i64(&line_buf[1..])?;
            parse_array_len(reader, len, line_buf, depth)
        }
        other => Err(TransportError::Protocol(format!(
            "unexpected reply type byte 0x{:02x}",
            other
        ))),
    }
}

fn parse_bulk_len<R: BufRead>(
    reader: &mut R,
    len: i64,
    line_buf: &mut Vec<u8>,
) -> Result<ReplyValue, TransportError> {
    if len < 0 {
        return Ok(ReplyValue::Nil);
    }
    if len > MAX_BULK_LEN {
        return Err(TransportError::Protocol(format!(
            "bulk length {} exceeds limit {}",
            len, MAX_BULK_LEN
        )));
    }
    let len = len as usize;
    // Grow with the bytes actually received, not with the header.
    let mut data = Vec::with_capacity(len.min(PREALLOC_LIMIT));
    (&mut *reader).take(len as u64).read_to_end(&mut data)?;
    if data.len() < len {
        return Err(TransportError::Io(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "bulk string truncated",
        )));
    }

    let mut crlf = [0u8; 2];
    reader.read_exact(&mut crlf)?;
    if crlf != [b'\r', b'\n'] {
        return Err(TransportError::Protocol("bulk string missing CRLF".to_string()));
    }

    line_buf.clear();
    let data = match String::from_utf8(data) {
        Ok(data) => data,
        Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
    };
    Ok(ReplyValue::BulkString(data))
}

fn parse_array_len<R: BufRead>(
    reader: &mut R,
    len: i64,
    line_buf: &mut Vec<u8>,
    depth: usize,
) -> Result<ReplyValue, TransportError> {
    if len < 0 {
        return Ok(ReplyValue::Nil);
    }
    if depth >= MAX_NESTING {
        return Err(TransportError::Protocol(format!(
            "array nesting deeper than {}",
            MAX_NESTING
        )));
    }

    let mut items = Vec::with_capacity((len as usize).min(PREALLOC_LIMIT));
    for _ in 0..len {
        items.push(read_value(reader, line_buf, depth + 1)?);
    }
    Ok(ReplyValue::Array(items))
}

fn read_line<R: BufRead>(reader: &mut R, buf: &mut Vec<u8>) -> Result<(), TransportError> {
    buf.clear();
    let bytes = reader.read_until(b'\n', buf)?;
    if bytes == 0 {
        return Err(TransportError::NoReply);
    }
    if buf.len() < 2 || buf[buf.len() - 2] != b'\r' {
        return Err(TransportError::Protocol("line missing CRLF".to_string()));
    }
    buf.truncate(buf.len() - 2);
    Ok(())
}

fn text(data: &[u8]) -> String {
    String::from_utf8_lossy(data).into_owned()
}

fn parse_i64(data: &[u8]) -> Result<i64, TransportError> {
    let invalid = || TransportError::Protocol(format!("invalid integer {:?}", text(data)));
    if data.is_empty() {
        return Err(invalid());
    }
    let mut negative = false;
    let mut idx = 0;
    if data[0] == b'-' {
        negative = true;
        idx = 1;
    }
    if idx == data.len() {
        return Err(invalid());
    }

    let mut value: i64 = 0;
    while idx < data.len() {
        let b = data[idx];
        if !b.is_ascii_digit() {
            return Err(invalid());
        }
        value = value.saturating_mul(10).saturating_add((b - b'0') as i64);
        idx += 1;
    }

    if negative {
        Ok(-value)
    } else {
        Ok(value)
    }
}

fn push_usize(out: &mut Vec<u8>, mut value: usize) {
    // Write digits into a small stack buffer to avoid heap allocations.
    let mut buf = [0u8; 20];
    let mut len = 0;
    if value == 0 {
        buf[0] = b'0';
        len = 1;
    } else {
        while value > 0 {
            buf[len] = b'0' + (value % 10) as u8;
            value /= 10;
            len += 1;
        }
    }
    for idx in (0..len).rev() {
        out.push(buf[idx]);
    }
}

//! # RESP Reply Parser - Incremental Decoding
//!
//! ## Purpose
//!
//! Decodes one complete RESP2 reply from the front of a byte buffer. Sockets
//! are read through fixed-size buffers, so a reply may arrive split across any
//! number of reads: a short buffer is reported as [`DecodeStatus::NeedMoreData`]
//! and never as an error. Only bytes that cannot be the prefix of any valid
//! reply produce a [`ProtocolError`].
//!
//! ## Supported Shapes
//!
//! - `+status`, `-error`, `:integer`
//! - `$len` bulk strings, including the `$-1` nil bulk
//! - `*len` arrays of any of the above, including the `*-1` nil array
//!
//! ## Limits
//!
//! Declared lengths are checked against [`MAX_BULK_LEN`] and [`MAX_ARRAY_LEN`]
//! before any waiting for data, so a corrupted length header fails fast instead
//! of stalling the connection while it waits for gigabytes that never come.

use crate::constants::{
    ARRAY_MARKER, BULK_MARKER, CRLF, ERROR_MARKER, INTEGER_MARKER, MAX_ARRAY_LEN, MAX_BULK_LEN,
    MAX_INLINE_LEN, MAX_NESTING_DEPTH, STATUS_MARKER,
};
use crate::error::{ProtocolError, ProtocolResult};
use crate::reply::Reply;
use bytes::{Buf, Bytes, BytesMut};

/// Outcome of a decode attempt on a buffer prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeStatus {
    /// A full reply was decoded from the first `consumed` bytes
    Complete { reply: Reply, consumed: usize },
    /// The buffer holds a valid but incomplete prefix
    NeedMoreData,
}

/// Decode one reply from the start of `buffer`
pub fn decode_reply(buffer: &[u8]) -> ProtocolResult<DecodeStatus> {
    match parse_at(buffer, 0, 0)? {
        Some((reply, consumed)) => Ok(DecodeStatus::Complete { reply, consumed }),
        None => Ok(DecodeStatus::NeedMoreData),
    }
}

/// Parse the reply starting at `offset`; `None` means more bytes are needed
fn parse_at(buf: &[u8], offset: usize, depth: usize) -> ProtocolResult<Option<(Reply, usize)>> {
    let Some(&marker) = buf.get(offset) else {
        return Ok(None);
    };

    let Some((line, next)) = read_line(buf, offset + 1)? else {
        return Ok(None);
    };

    match marker {
        STATUS_MARKER => {
            let text = utf8_line(line, "status", offset)?;
            Ok(Some((Reply::Status(text), next)))
        }
        ERROR_MARKER => {
            let text = utf8_line(line, "error", offset)?;
            Ok(Some((Reply::Error(text), next)))
        }
        INTEGER_MARKER => {
            let value = parse_integer(line, offset + 1, "integer reply")?;
            Ok(Some((Reply::Integer(value), next)))
        }
        BULK_MARKER => parse_bulk(buf, line, offset, next),
        ARRAY_MARKER => parse_array(buf, line, offset, next, depth),
        other => Err(ProtocolError::unknown_reply_type(other, offset)),
    }
}

fn parse_bulk(
    buf: &[u8],
    header: &[u8],
    offset: usize,
    data_start: usize,
) -> ProtocolResult<Option<(Reply, usize)>> {
    let declared = parse_integer(header, offset + 1, "bulk length")?;
    if declared == -1 {
        return Ok(Some((Reply::Nil, data_start)));
    }
    if declared < 0 {
        return Err(ProtocolError::invalid_length("bulk", declared, offset));
    }

    let len = declared as usize;
    if len > MAX_BULK_LEN {
        return Err(ProtocolError::size_limit_exceeded("bulk", len, MAX_BULK_LEN, offset));
    }

    let data_end = data_start + len;
    let frame_end = data_end + CRLF.len();

    // Validate whatever part of the terminator has already arrived
    let available_tail = &buf[data_end.min(buf.len())..frame_end.min(buf.len())];
    if !CRLF.starts_with(available_tail) {
        return Err(ProtocolError::missing_terminator(len, offset));
    }
    if buf.len() < frame_end {
        return Ok(None);
    }

    let data = Bytes::copy_from_slice(&buf[data_start..data_end]);
    Ok(Some((Reply::Bulk(data), frame_end)))
}

fn parse_array(
    buf: &[u8],
    header: &[u8],
    offset: usize,
    mut cursor: usize,
    depth: usize,
) -> ProtocolResult<Option<(Reply, usize)>> {
    let declared = parse_integer(header, offset + 1, "array length")?;
    if declared == -1 {
        return Ok(Some((Reply::Nil, cursor)));
    }
    if declared < 0 {
        return Err(ProtocolError::invalid_length("array", declared, offset));
    }

    let len = declared as usize;
    if len > MAX_ARRAY_LEN {
        return Err(ProtocolError::size_limit_exceeded("array", len, MAX_ARRAY_LEN, offset));
    }
    if depth + 1 > MAX_NESTING_DEPTH {
        return Err(ProtocolError::nesting_too_deep(depth + 1, MAX_NESTING_DEPTH));
    }

    let mut items = Vec::with_capacity(len.min(64));
    for _ in 0..len {
        match parse_at(buf, cursor, depth + 1)? {
            Some((item, next)) => {
                items.push(item);
                cursor = next;
            }
            None => return Ok(None),
        }
    }

    Ok(Some((Reply::Array(items), cursor)))
}

/// Locate the CRLF-terminated line starting at `start`
fn read_line(buf: &[u8], start: usize) -> ProtocolResult<Option<(&[u8], usize)>> {
    let rest = buf.get(start..).unwrap_or(&[]);

    match rest.windows(CRLF.len()).position(|w| w == CRLF) {
        Some(pos) if pos > MAX_INLINE_LEN => Err(ProtocolError::line_too_long(MAX_INLINE_LEN, start)),
        Some(pos) => Ok(Some((&rest[..pos], start + pos + CRLF.len()))),
        None if rest.len() > MAX_INLINE_LEN => {
            Err(ProtocolError::line_too_long(MAX_INLINE_LEN, start))
        }
        None => Ok(None),
    }
}

fn parse_integer(line: &[u8], offset: usize, context: &str) -> ProtocolResult<i64> {
    std::str::from_utf8(line)
        .ok()
        .and_then(|text| text.parse::<i64>().ok())
        .ok_or_else(|| ProtocolError::invalid_integer(line, offset, context))
}

fn utf8_line(line: &[u8], kind: &'static str, offset: usize) -> ProtocolResult<String> {
    std::str::from_utf8(line)
        .map(str::to_owned)
        .map_err(|_| ProtocolError::invalid_utf8(kind, offset))
}

/// Stateful decoder accumulating socket reads
///
/// Each connection owns one decoder. Reads are appended with [`feed`](Self::feed)
/// and complete replies drained with [`next_reply`](Self::next_reply); leftover
/// bytes of a following reply stay buffered for the next call.
#[derive(Debug, Default)]
pub struct ReplyDecoder {
    buffer: BytesMut,
}

impl ReplyDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
        }
    }

    /// Append freshly read bytes
    pub fn feed(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Decode and remove the next complete reply, if one is buffered
    pub fn next_reply(&mut self) -> ProtocolResult<Option<Reply>> {
        if self.buffer.is_empty() {
            return Ok(None);
        }

        match decode_reply(&self.buffer)? {
            DecodeStatus::Complete { reply, consumed } => {
                self.buffer.advance(consumed);
                Ok(Some(reply))
            }
            DecodeStatus::NeedMoreData => Ok(None),
        }
    }

    /// Bytes received but not yet decoded
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Drop any partial reply, used after the connection is torn down
    pub fn reset(&mut self) {
        self.buffer.clear();
    }
}

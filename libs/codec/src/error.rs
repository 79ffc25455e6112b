//! Protocol-level errors for RESP reply decoding
//!
//! Every variant carries enough context (offset, buffer size, what was seen)
//! to diagnose a corrupted stream from a single log line. A `ProtocolError`
//! is fatal for the connection that produced the bytes: once framing is lost
//! there is no way to resynchronise on a RESP stream.

use thiserror::Error;

/// RESP decoding and encoding errors with diagnostic context
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProtocolError {
    /// First byte of a reply is not one of `+ - : $ *`
    #[error("Unknown reply type byte {byte:#04x} at offset {offset} (indicates: {diagnosis})")]
    UnknownReplyType {
        byte: u8,
        offset: usize,
        diagnosis: String,
    },

    /// A length or integer header is not a valid decimal number
    #[error("Invalid integer {raw:?} at offset {offset} (context: {context})")]
    InvalidInteger {
        raw: String,
        offset: usize,
        context: String,
    },

    /// Negative length other than the `-1` nil marker
    #[error("Invalid {kind} length {length} at offset {offset}")]
    InvalidLength {
        kind: &'static str,
        length: i64,
        offset: usize,
    },

    /// Declared bulk or array size exceeds the decoder limit
    #[error("{kind} of {size} exceeds limit {limit} at offset {offset} (likely corrupted length header)")]
    SizeLimitExceeded {
        kind: &'static str,
        size: usize,
        limit: usize,
        offset: usize,
    },

    /// Bulk payload is not terminated by CRLF where its length says it should be
    #[error("Missing CRLF terminator after {length}-byte bulk at offset {offset}")]
    MissingTerminator { length: usize, offset: usize },

    /// A header line grew past the inline limit without a CRLF
    #[error("Header line exceeds {limit} bytes without CRLF at offset {offset}")]
    LineTooLong { limit: usize, offset: usize },

    /// Arrays nested deeper than the decoder allows
    #[error("Reply nesting depth {depth} exceeds limit {limit}")]
    NestingTooDeep { depth: usize, limit: usize },

    /// Status or error line is not valid UTF-8
    #[error("Non UTF-8 {kind} line at offset {offset}")]
    InvalidUtf8 { kind: &'static str, offset: usize },

    /// Command cannot be encoded from the given arguments
    #[error("Invalid command {command}: {reason}")]
    InvalidCommand {
        command: &'static str,
        reason: String,
    },
}

impl ProtocolError {
    /// Unknown type byte with a guess at what went wrong
    pub fn unknown_reply_type(byte: u8, offset: usize) -> Self {
        let diagnosis = match byte {
            b'\r' | b'\n' => "stray line terminator, framing lost",
            b'%' | b'~' | b'>' | b'_' | b',' | b'#' | b'=' | b'(' | b'!' => {
                "RESP3 reply on a RESP2 connection"
            }
            0x20..=0x7e => "plain text where a reply was expected",
            _ => "binary garbage or wrong protocol on the socket",
        };

        Self::UnknownReplyType {
            byte,
            offset,
            diagnosis: diagnosis.to_string(),
        }
    }

    pub fn invalid_integer(raw: &[u8], offset: usize, context: impl Into<String>) -> Self {
        Self::InvalidInteger {
            raw: String::from_utf8_lossy(raw).into_owned(),
            offset,
            context: context.into(),
        }
    }

    pub fn invalid_length(kind: &'static str, length: i64, offset: usize) -> Self {
        Self::InvalidLength {
            kind,
            length,
            offset,
        }
    }

    pub fn size_limit_exceeded(kind: &'static str, size: usize, limit: usize, offset: usize) -> Self {
        Self::SizeLimitExceeded {
            kind,
            size,
            limit,
            offset,
        }
    }

    pub fn missing_terminator(length: usize, offset: usize) -> Self {
        Self::MissingTerminator { length, offset }
    }

    pub fn line_too_long(limit: usize, offset: usize) -> Self {
        Self::LineTooLong { limit, offset }
    }

    pub fn nesting_too_deep(depth: usize, limit: usize) -> Self {
        Self::NestingTooDeep { depth, limit }
    }

    pub fn invalid_utf8(kind: &'static str, offset: usize) -> Self {
        Self::InvalidUtf8 { kind, offset }
    }

    pub fn invalid_command(command: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidCommand {
            command,
            reason: reason.into(),
        }
    }
}

/// Result type for protocol operations
pub type ProtocolResult<T> = std::result::Result<T, ProtocolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_type_diagnosis() {
        let err = ProtocolError::unknown_reply_type(b'%', 0);
        assert!(err.to_string().contains("RESP3"));

        let err = ProtocolError::unknown_reply_type(b'h', 12);
        assert!(err.to_string().contains("plain text"));
        assert!(err.to_string().contains("offset 12"));
    }

    #[test]
    fn test_invalid_integer_keeps_raw_text() {
        let err = ProtocolError::invalid_integer(b"12a", 1, "bulk length");
        assert_eq!(
            err,
            ProtocolError::InvalidInteger {
                raw: "12a".to_string(),
                offset: 1,
                context: "bulk length".to_string(),
            }
        );
    }
}

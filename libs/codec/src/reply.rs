//! Decoded RESP reply model

use bytes::Bytes;
use std::fmt;

/// One complete RESP2 reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// `+OK`
    Status(String),
    /// `-ERR message`
    Error(String),
    /// `:42`
    Integer(i64),
    /// `$3\r\nfoo`
    Bulk(Bytes),
    /// `$-1` or `*-1`
    Nil,
    /// `*N` followed by N replies
    Array(Vec<Reply>),
}

impl Reply {
    /// Short name of the reply shape, used in logs and publish error reports
    pub fn kind(&self) -> &'static str {
        match self {
            Reply::Status(_) => "status",
            Reply::Error(_) => "error",
            Reply::Integer(_) => "integer",
            Reply::Bulk(_) => "bulk",
            Reply::Nil => "nil",
            Reply::Array(_) => "array",
        }
    }

    /// Bulk payload as UTF-8, if this is a bulk reply holding valid text
    pub fn as_bulk_str(&self) -> Option<&str> {
        match self {
            Reply::Bulk(data) => std::str::from_utf8(data).ok(),
            _ => None,
        }
    }

    /// Textual content of a bulk or status reply
    ///
    /// Push kinds and channel names may arrive as either shape depending on the
    /// broker, so classification code reads them through this accessor.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Reply::Bulk(data) => std::str::from_utf8(data).ok(),
            Reply::Status(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Reply::Integer(value) => Some(*value),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Reply::Error(_))
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Status(text) => write!(f, "+{}", text),
            Reply::Error(text) => write!(f, "-{}", text),
            Reply::Integer(value) => write!(f, ":{}", value),
            Reply::Bulk(data) => write!(f, "\"{}\"", String::from_utf8_lossy(data)),
            Reply::Nil => write!(f, "(nil)"),
            Reply::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

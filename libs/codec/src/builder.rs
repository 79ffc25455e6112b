//! # Command Builder - RESP Array-of-Bulk Construction
//!
//! ## Purpose
//!
//! Every command the consumer sends is a RESP array whose elements are bulk
//! strings: `*<n>\r\n` followed by `$<len>\r\n<bytes>\r\n` per argument. The
//! builder collects arguments, then writes the frame in a single allocation
//! sized up front.
//!
//! ## Commands
//!
//! - [`encode_subscribe`]: `SUBSCRIBE <channel>` (2 elements)
//! - [`encode_publish`]: `XADD <stream> * <k1> <v1> ...` (`3 + 2·n` elements)
//! - [`encode_values_publish`]: positional values named `value1..valueN`
//!
//! Field order in `XADD` is preserved exactly as given; it becomes part of the
//! stored stream entry and downstream readers index into it.

use crate::constants::{ARRAY_MARKER, AUTO_ID, BULK_MARKER, CRLF, SUBSCRIBE, XADD};
use crate::error::{ProtocolError, ProtocolResult};

/// Builder for a RESP command frame
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    args: Vec<Vec<u8>>,
}

impl CommandBuilder {
    /// Start a command with its keyword as the first element
    pub fn new(command: &str) -> Self {
        Self {
            args: vec![command.as_bytes().to_vec()],
        }
    }

    /// Append one bulk argument
    pub fn arg(mut self, value: impl AsRef<[u8]>) -> Self {
        self.args.push(value.as_ref().to_vec());
        self
    }

    /// Append one argument without consuming the builder
    pub fn push_arg(&mut self, value: impl AsRef<[u8]>) {
        self.args.push(value.as_ref().to_vec());
    }

    /// Number of array elements, keyword included
    pub fn element_count(&self) -> usize {
        self.args.len()
    }

    /// Serialise the frame
    pub fn build(&self) -> Vec<u8> {
        let payload: usize = self.args.iter().map(|a| bulk_frame_len(a.len())).sum();
        let mut frame = Vec::with_capacity(payload + 16);

        frame.push(ARRAY_MARKER);
        frame.extend_from_slice(self.args.len().to_string().as_bytes());
        frame.extend_from_slice(CRLF);

        for arg in &self.args {
            write_bulk(&mut frame, arg);
        }

        frame
    }
}

/// Bytes taken by `$<len>\r\n<data>\r\n`
#[inline]
fn bulk_frame_len(len: usize) -> usize {
    1 + decimal_digits(len) + 2 + len + 2
}

#[inline]
fn decimal_digits(mut n: usize) -> usize {
    let mut digits = 1;
    while n >= 10 {
        n /= 10;
        digits += 1;
    }
    digits
}

/// Write one length-prefixed bulk value
pub fn write_bulk(frame: &mut Vec<u8>, data: &[u8]) {
    frame.push(BULK_MARKER);
    frame.extend_from_slice(data.len().to_string().as_bytes());
    frame.extend_from_slice(CRLF);
    frame.extend_from_slice(data);
    frame.extend_from_slice(CRLF);
}

/// Encode `SUBSCRIBE <channel>`
///
/// For `"news"` this yields exactly `*2\r\n$9\r\nSUBSCRIBE\r\n$4\r\nnews\r\n`.
pub fn encode_subscribe(channel: &str) -> Vec<u8> {
    CommandBuilder::new(SUBSCRIBE).arg(channel).build()
}

/// Encode `XADD <stream> * <field> <value> ...` with fields in the given order
pub fn encode_publish<K, V>(stream: &str, fields: &[(K, V)]) -> Vec<u8>
where
    K: AsRef<[u8]>,
    V: AsRef<[u8]>,
{
    let mut builder = CommandBuilder::new(XADD).arg(stream).arg(AUTO_ID);
    for (key, value) in fields {
        builder.push_arg(key);
        builder.push_arg(value);
    }
    builder.build()
}

/// Encode an `XADD` whose fields are positional values named `value1..valueN`
///
/// Rejects an empty stream key or an empty value list, neither of which the
/// broker would accept.
pub fn encode_values_publish<S: AsRef<str>>(stream: &str, values: &[S]) -> ProtocolResult<Vec<u8>> {
    if stream.is_empty() {
        return Err(ProtocolError::invalid_command(XADD, "stream key is empty"));
    }
    if values.is_empty() {
        return Err(ProtocolError::invalid_command(
            XADD,
            format!("no values to add to stream {:?}", stream),
        ));
    }

    let fields: Vec<(String, &str)> = values
        .iter()
        .enumerate()
        .map(|(i, v)| (format!("value{}", i + 1), v.as_ref()))
        .collect();

    Ok(encode_publish(stream, &fields))
}

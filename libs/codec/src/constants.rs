//! # Protocol Constants
//!
//! Wire-level constants for the RESP subset spoken by the consumer. These values
//! are part of the contract with the broker and with downstream stream readers.

/// Line terminator used by every RESP frame
pub const CRLF: &[u8] = b"\r\n";

/// Reply type markers
pub const STATUS_MARKER: u8 = b'+';
pub const ERROR_MARKER: u8 = b'-';
pub const INTEGER_MARKER: u8 = b':';
pub const BULK_MARKER: u8 = b'$';
pub const ARRAY_MARKER: u8 = b'*';

/// Command keywords
pub const SUBSCRIBE: &str = "SUBSCRIBE";
pub const XADD: &str = "XADD";

/// Entry id argument asking the broker to generate the stream id
pub const AUTO_ID: &str = "*";

/// Push kinds reported as the first element of a subscription array
pub const PUSH_KIND_SUBSCRIBE: &str = "subscribe";
pub const PUSH_KIND_MESSAGE: &str = "message";

/// Broker-side maximum bulk length (512MB)
pub const MAX_BULK_LEN: usize = 512 * 1024 * 1024;

/// Upper bound on array element count accepted from the wire
pub const MAX_ARRAY_LEN: usize = 1024 * 1024;

/// Longest header line (type byte + number or status text) before CRLF
pub const MAX_INLINE_LEN: usize = 64 * 1024;

/// Maximum array nesting accepted by the decoder
pub const MAX_NESTING_DEPTH: usize = 32;

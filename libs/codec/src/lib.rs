//! # RESP Codec
//!
//! ## Purpose
//!
//! The "rules" layer of the consumer: how commands become bytes and how bytes
//! become replies. Nothing in here touches a socket.
//!
//! - Command construction: `SUBSCRIBE` and `XADD` frames via [`CommandBuilder`]
//! - Incremental reply decoding: [`decode_reply`] and the buffering [`ReplyDecoder`]
//! - Subscription push classification: [`classify_push`]
//!
//! ## Architecture Role
//!
//! ```text
//! libs/types → [codec] → network/ → services/consumer
//!     ↑           ↓          ↓
//! Message     RESP frames   Sockets
//! fields      Reply model   Connections
//! ```
//!
//! ## What This Crate Does NOT Contain
//! - Socket management or connection handling (belongs in network/)
//! - Publish success/failure policy (belongs in the consumer service)

pub mod builder;
pub mod constants;
pub mod error;
pub mod parser;
pub mod push;
pub mod reply;

pub use builder::{encode_publish, encode_subscribe, encode_values_publish, CommandBuilder};
pub use constants::*;
pub use error::{ProtocolError, ProtocolResult};
pub use parser::{decode_reply, DecodeStatus, ReplyDecoder};
pub use push::{classify_push, PushEvent};
pub use reply::Reply;

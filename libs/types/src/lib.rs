//! # Stream Consumer Types
//!
//! The data that flows through the consumer: a [`Message`] extracted from a
//! raw channel payload, and the [`ProcessedMessage`] it becomes once a worker
//! stamps it with identity, time and origin.
//!
//! ## Stream Entry Layout
//!
//! Every processed message is appended to the output stream as exactly four
//! field/value pairs in a fixed order. Downstream readers index into this
//! layout, so the order is part of the contract:
//!
//! | # | Field | Value |
//! |---|-------|-------|
//! | 1 | `Processor_id` | id of the worker (or single consumer) |
//! | 2 | `Processing_date_time` | local time, `YYYY-MM-DD HH:MM:SS.mmm` |
//! | 3 | `Source_channel_name` | channel the payload arrived on |
//! | 4 | `Message_id` | identifier extracted from the payload |

pub mod message;

pub use message::{
    format_timestamp, Message, ProcessedMessage, FIELD_MESSAGE_ID, FIELD_PROCESSING_DATE_TIME,
    FIELD_PROCESSOR_ID, FIELD_SOURCE_CHANNEL_NAME, STREAM_FIELD_COUNT, TIMESTAMP_FORMAT,
};

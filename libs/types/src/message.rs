//! Extracted and processed messages

use chrono::{DateTime, Local, TimeZone};
use serde::{Deserialize, Serialize};

pub const FIELD_PROCESSOR_ID: &str = "Processor_id";
pub const FIELD_PROCESSING_DATE_TIME: &str = "Processing_date_time";
pub const FIELD_SOURCE_CHANNEL_NAME: &str = "Source_channel_name";
pub const FIELD_MESSAGE_ID: &str = "Message_id";

/// Number of field/value pairs in a published stream entry
pub const STREAM_FIELD_COUNT: usize = 4;

/// Millisecond-precision local timestamp, e.g. `2024-05-01 12:00:00.042`
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Format a point in time the way it is written to the stream
pub fn format_timestamp<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Identifier pulled out of a raw payload by an extractor
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
}

impl Message {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    /// Stamp the message with the processing identity, current local time and origin channel
    pub fn enrich(self, processor_id: u64, source_channel: &str) -> ProcessedMessage {
        self.enrich_at(processor_id, source_channel, &Local::now())
    }

    /// [`enrich`](Self::enrich) with an explicit processing time
    pub fn enrich_at<Tz: TimeZone>(
        self,
        processor_id: u64,
        source_channel: &str,
        at: &DateTime<Tz>,
    ) -> ProcessedMessage
    where
        Tz::Offset: std::fmt::Display,
    {
        ProcessedMessage {
            id: self.id,
            processor_id,
            processed_at: format_timestamp(at),
            source_channel: source_channel.to_string(),
        }
    }
}

/// A message ready for publishing
///
/// Fields are fixed at enrichment and only readable afterwards. Publishing
/// consumes the value through [`into_stream_fields`](Self::into_stream_fields).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedMessage {
    id: String,
    processor_id: u64,
    processed_at: String,
    source_channel: String,
}

impl ProcessedMessage {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn processor_id(&self) -> u64 {
        self.processor_id
    }

    pub fn processed_at(&self) -> &str {
        &self.processed_at
    }

    pub fn source_channel(&self) -> &str {
        &self.source_channel
    }

    /// Stream entry field/value pairs in publish order
    pub fn into_stream_fields(self) -> [(&'static str, String); STREAM_FIELD_COUNT] {
        [
            (FIELD_PROCESSOR_ID, self.processor_id.to_string()),
            (FIELD_PROCESSING_DATE_TIME, self.processed_at),
            (FIELD_SOURCE_CHANNEL_NAME, self.source_channel),
            (FIELD_MESSAGE_ID, self.id),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, NaiveDate};

    fn fixed_time() -> DateTime<FixedOffset> {
        let naive = NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_milli_opt(9, 3, 7, 42)
            .unwrap();
        FixedOffset::east_opt(0).unwrap().from_local_datetime(&naive).unwrap()
    }

    #[test]
    fn test_timestamp_format_pads_milliseconds() {
        assert_eq!(format_timestamp(&fixed_time()), "2024-05-01 09:03:07.042");
    }

    #[test]
    fn test_stream_fields_order() {
        let processed = Message::new("abc123").enrich_at(3, "messages:published", &fixed_time());
        assert_eq!(processed.id(), "abc123");
        assert_eq!(processed.processor_id(), 3);

        let fields = processed.into_stream_fields();
        let names: Vec<&str> = fields.iter().map(|(k, _)| *k).collect();
        assert_eq!(
            names,
            vec!["Processor_id", "Processing_date_time", "Source_channel_name", "Message_id"]
        );
        assert_eq!(fields[0].1, "3");
        assert_eq!(fields[1].1, "2024-05-01 09:03:07.042");
        assert_eq!(fields[2].1, "messages:published");
        assert_eq!(fields[3].1, "abc123");
    }

    #[test]
    fn test_enrich_uses_local_clock() {
        let processed = Message::new("").enrich(1, "ch");
        // YYYY-MM-DD HH:MM:SS.mmm
        assert_eq!(processed.processed_at().len(), 23);
        assert_eq!(processed.id(), "");
        assert_eq!(processed.source_channel(), "ch");
    }

    #[test]
    fn test_message_serde() {
        let message: Message = serde_json::from_str(r#"{"id":"x1"}"#).unwrap();
        assert_eq!(message, Message::new("x1"));
    }
}

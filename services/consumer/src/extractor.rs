//! Payload to message extraction
//!
//! The engine does not care how identifiers are derived. Anything that
//! implements [`Extractor`] can be injected, closures included.

use serde_json::Value;
use types::Message;

/// Turn a raw channel payload into a [`Message`], or reject it
pub trait Extractor: Send + Sync {
    fn extract(&self, raw: &str) -> Option<Message>;
}

impl<F> Extractor for F
where
    F: Fn(&str) -> Option<Message> + Send + Sync,
{
    fn extract(&self, raw: &str) -> Option<Message> {
        self(raw)
    }
}

/// Reads the `message_id` member of a JSON object payload
///
/// String ids are taken as-is (empty included); numeric ids are stringified.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonIdExtractor;

pub const MESSAGE_ID_KEY: &str = "message_id";

impl Extractor for JsonIdExtractor {
    fn extract(&self, raw: &str) -> Option<Message> {
        let value: Value = serde_json::from_str(raw).ok()?;
        match value.get(MESSAGE_ID_KEY)? {
            Value::String(id) => Some(Message::new(id.as_str())),
            Value::Number(id) => Some(Message::new(id.to_string())),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_id() {
        let message = JsonIdExtractor.extract(r#"{"message_id": "12345"}"#).unwrap();
        assert_eq!(message.id, "12345");
    }

    #[test]
    fn test_empty_id_is_accepted() {
        let message = JsonIdExtractor.extract(r#"{"message_id": ""}"#).unwrap();
        assert_eq!(message.id, "");
    }

    #[test]
    fn test_numeric_id() {
        let message = JsonIdExtractor.extract(r#"{"message_id": 42, "body": "x"}"#).unwrap();
        assert_eq!(message.id, "42");
    }

    #[test]
    fn test_rejections() {
        assert!(JsonIdExtractor.extract(r#"{"message": this_is_not_an_id}"#).is_none());
        assert!(JsonIdExtractor.extract(r#"{"message": "no id"}"#).is_none());
        assert!(JsonIdExtractor.extract(r#"{"message_id": null}"#).is_none());
        assert!(JsonIdExtractor.extract(r#"["message_id"]"#).is_none());
        assert!(JsonIdExtractor.extract("").is_none());
    }

    #[test]
    fn test_closure_extractor() {
        let upper = |raw: &str| Some(Message::new(raw.to_uppercase()));
        assert_eq!(upper.extract("abc").unwrap().id, "ABC");
    }
}

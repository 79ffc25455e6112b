//! Subscription push classification
//!
//! A subscribed connection receives 3-element arrays `[kind, channel, x]`:
//! `x` is the subscription count for a `subscribe` acknowledgement and the
//! payload for a `message` push. Classification is done against the single
//! channel the connection subscribed to; a `message` reporting any other
//! channel is flagged as foreign and never delivered.

use crate::constants::{PUSH_KIND_MESSAGE, PUSH_KIND_SUBSCRIBE};
use crate::reply::Reply;

/// What a reply on a subscribed connection means to the consumer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushEvent {
    /// Subscription acknowledged; `count` is the connection's subscription total
    Subscribed { channel: String, count: i64 },
    /// Payload pushed on the subscribed channel
    Message { payload: String },
    /// Payload pushed for a channel this connection did not subscribe to
    ForeignMessage { channel: String },
    /// Error reply from the broker
    Error { message: String },
    /// Any other reply shape or push kind
    Other { reply: Reply },
}

/// Classify one decoded reply for a connection subscribed to `subscribed_channel`
pub fn classify_push(reply: Reply, subscribed_channel: &str) -> PushEvent {
    let items = match reply {
        Reply::Array(items) if items.len() == 3 => items,
        Reply::Error(message) => return PushEvent::Error { message },
        other => return PushEvent::Other { reply: other },
    };

    match (items[0].as_text(), items[1].as_text()) {
        (Some(PUSH_KIND_SUBSCRIBE), Some(channel)) => match items[2].as_integer() {
            Some(count) => PushEvent::Subscribed {
                channel: channel.to_string(),
                count,
            },
            None => PushEvent::Other {
                reply: Reply::Array(items),
            },
        },
        (Some(PUSH_KIND_MESSAGE), Some(channel)) if channel != subscribed_channel => {
            PushEvent::ForeignMessage {
                channel: channel.to_string(),
            }
        }
        (Some(PUSH_KIND_MESSAGE), Some(_)) => match &items[2] {
            Reply::Bulk(data) => PushEvent::Message {
                payload: String::from_utf8_lossy(data).into_owned(),
            },
            _ => PushEvent::Other {
                reply: Reply::Array(items),
            },
        },
        _ => PushEvent::Other {
            reply: Reply::Array(items),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn bulk(text: &'static str) -> Reply {
        Reply::Bulk(Bytes::from_static(text.as_bytes()))
    }

    #[test]
    fn test_subscribe_ack() {
        let reply = Reply::Array(vec![bulk("subscribe"), bulk("news"), Reply::Integer(1)]);
        assert_eq!(
            classify_push(reply, "news"),
            PushEvent::Subscribed {
                channel: "news".to_string(),
                count: 1
            }
        );
    }

    #[test]
    fn test_message_on_own_channel() {
        let reply = Reply::Array(vec![bulk("message"), bulk("news"), bulk("{\"message_id\":\"1\"}")]);
        assert_eq!(
            classify_push(reply, "news"),
            PushEvent::Message {
                payload: "{\"message_id\":\"1\"}".to_string()
            }
        );
    }

    #[test]
    fn test_message_on_foreign_channel_is_flagged() {
        let reply = Reply::Array(vec![bulk("message"), bulk("sports"), bulk("x")]);
        assert_eq!(
            classify_push(reply, "news"),
            PushEvent::ForeignMessage {
                channel: "sports".to_string()
            }
        );
    }

    #[test]
    fn test_other_shapes() {
        assert!(matches!(
            classify_push(Reply::Integer(1), "news"),
            PushEvent::Other { .. }
        ));
        assert!(matches!(
            classify_push(Reply::Array(vec![bulk("unsubscribe"), bulk("news"), Reply::Integer(0)]), "news"),
            PushEvent::Other { .. }
        ));
        assert_eq!(
            classify_push(Reply::Error("ERR only (P)SUBSCRIBE allowed".into()), "news"),
            PushEvent::Error {
                message: "ERR only (P)SUBSCRIBE allowed".to_string()
            }
        );
    }
}

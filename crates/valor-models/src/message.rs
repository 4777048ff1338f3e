//! Inbound chat message representation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One inbound chat event, normalized away from any transport library.
///
/// `message_id` is platform-assigned and monotonically increasing per
/// chat, which the dedup store relies on for eviction order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Chat identifier.
    pub chat_id: i64,

    /// Message identifier, monotonic per chat.
    pub message_id: i64,

    /// Sender identifier.
    pub sender_id: i64,

    /// Sender display name.
    pub sender_name: String,

    /// Raw message text.
    pub text: String,

    /// When the message was sent.
    pub timestamp: DateTime<Utc>,

    /// True for direct messages, false for group chats.
    pub is_dm: bool,

    /// True if this is one of our own prior replies. Always ignored by
    /// the router; used by catch-up to recognize answered messages.
    pub is_outgoing: bool,

    /// Message id this one replies to, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<i64>,
}

impl InboundMessage {
    /// Creates an incoming group message with the given ids and text.
    pub fn group(chat_id: i64, message_id: i64, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            message_id,
            sender_id: 0,
            sender_name: String::new(),
            text: text.into(),
            timestamp: Utc::now(),
            is_dm: false,
            is_outgoing: false,
            reply_to: None,
        }
    }

    /// Creates an incoming direct message.
    pub fn dm(chat_id: i64, message_id: i64, text: impl Into<String>) -> Self {
        Self {
            is_dm: true,
            ..Self::group(chat_id, message_id, text)
        }
    }

    /// Sets the sender identity.
    pub fn from_sender(mut self, sender_id: i64, sender_name: impl Into<String>) -> Self {
        self.sender_id = sender_id;
        self.sender_name = sender_name.into();
        self
    }

    /// Marks the message as one of our own outgoing replies.
    pub fn outgoing(mut self) -> Self {
        self.is_outgoing = true;
        self
    }

    /// Sets the reply target.
    pub fn replying_to(mut self, message_id: i64) -> Self {
        self.reply_to = Some(message_id);
        self
    }

    /// Sets the message timestamp.
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_group_message_defaults() {
        let msg = InboundMessage::group(100, 1, "hello");
        assert_eq!(msg.chat_id, 100);
        assert_eq!(msg.message_id, 1);
        assert!(!msg.is_dm);
        assert!(!msg.is_outgoing);
        assert!(msg.reply_to.is_none());
    }

    #[test]
    fn test_dm_flag() {
        let msg = InboundMessage::dm(7, 2, "hi");
        assert!(msg.is_dm);
    }

    #[test]
    fn test_builder_chain() {
        let ts = Utc::now() - Duration::minutes(5);
        let msg = InboundMessage::group(1, 10, "done")
            .from_sender(42, "valor")
            .outgoing()
            .replying_to(9)
            .at(ts);

        assert_eq!(msg.sender_id, 42);
        assert_eq!(msg.sender_name, "valor");
        assert!(msg.is_outgoing);
        assert_eq!(msg.reply_to, Some(9));
        assert_eq!(msg.timestamp, ts);
    }

    #[test]
    fn test_serialization_skips_absent_reply_target() {
        let msg = InboundMessage::group(1, 1, "x");
        let json = serde_json::to_string(&msg).unwrap();
        assert!(!json.contains("reply_to"));

        let replied = msg.replying_to(5);
        let json = serde_json::to_string(&replied).unwrap();
        assert!(json.contains("\"reply_to\":5"));
    }
}

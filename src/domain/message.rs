use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::conversation::ConversationId;

/// A delivered chat message. Immutable once created: the backend offers no
/// edit or delete operation, so the client never mutates an existing one.
///
/// Field names follow the hosted store's camelCase wire shape; `chatId` is
/// the canonical sorted-pair conversation identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub text: String,
    pub sender_id: String,
    pub receiver_id: String,
    #[serde(rename = "chatId")]
    pub conversation_id: String,
    #[serde(rename = "timestamp")]
    pub sent_at_unix_ms: i64,
}

impl Message {
    pub fn is_from(&self, user_id: &str) -> bool {
        self.sender_id == user_id
    }
}

/// Payload for a single append write. The backend assigns the document id
/// and the timestamp; the client never picks either.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageDraft {
    pub text: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub conversation_id: ConversationId,
}

pub fn now_unix_ms() -> i64 {
    Utc::now().timestamp_millis()
}

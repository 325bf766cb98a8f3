//! Classification of inbox diffs: which added messages activate a chat,
//! and which count as unread and notify the user.

use crate::domain::{message::Message, notification::Notification};

/// Notification sink for newly arrived messages. The shell prints these;
/// tests record them.
pub trait Notifier {
    fn notify(&self, notification: &Notification);
}

/// Default freshness window: messages older than this at observation time
/// are treated as backfill replay rather than "just sent".
pub const DEFAULT_FRESHNESS_WINDOW_MS: i64 = 1_000;

/// Whether an added inbox message activates its sender's chat. Activation is
/// how a conversation appears for the recipient without an invite step, so
/// it applies to backfill and live changes alike.
pub fn needs_activation(active_chats: &[String], sender_id: &str) -> bool {
    !active_chats.iter().any(|id| id == sender_id)
}

/// Whether an added inbox message counts as unread and produces a
/// notification. Requires all of:
///
/// - the sender is not the current identity,
/// - the sender's conversation is not currently selected,
/// - the batch is not the initial backfill snapshot,
/// - the send timestamp falls within the freshness window of observation
///   time (a tunable guard against replayed history).
pub fn should_count_unread(
    message: &Message,
    batch_initial: bool,
    self_id: &str,
    selected_chat: Option<&str>,
    now_unix_ms: i64,
    freshness_window_ms: i64,
) -> bool {
    if batch_initial {
        return false;
    }
    if message.sender_id == self_id {
        return false;
    }
    if selected_chat == Some(message.sender_id.as_str()) {
        return false;
    }
    message.sent_at_unix_ms > now_unix_ms - freshness_window_ms
}

/// Builds the user-visible notice for one counted message. `None` when the
/// sender is not in the roster yet; the unread counter still moves.
pub fn notification_for(message: &Message, sender_name: Option<&str>) -> Option<Notification> {
    sender_name.map(|name| Notification {
        sender_id: message.sender_id.clone(),
        sender_name: name.to_owned(),
        text: message.text.clone(),
    })
}

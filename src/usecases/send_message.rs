//! Use case for sending a message to a conversation partner.

use crate::{
    backend::contracts::{BackendError, MessageStore},
    domain::{conversation::ConversationId, message::MessageDraft},
};

/// Command to send a text message to one partner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendMessageCommand {
    pub self_id: String,
    pub partner_id: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendMessageError {
    /// Message text is empty after trimming whitespace; rejected locally
    /// without a backend round trip.
    EmptyMessage,
    /// Backend rejected or could not take the append write.
    TemporarilyUnavailable,
}

/// Validates the text (must not be empty after trimming), derives the
/// canonical conversation id, and performs the single append write. The
/// backend assigns the timestamp and the document id.
pub fn send_message(
    store: &dyn MessageStore,
    command: SendMessageCommand,
) -> Result<(), SendMessageError> {
    let text = command.text.trim();
    if text.is_empty() {
        return Err(SendMessageError::EmptyMessage);
    }

    let conversation_id = ConversationId::for_pair(&command.self_id, &command.partner_id);
    store
        .append_message(MessageDraft {
            text: text.to_owned(),
            sender_id: command.self_id,
            receiver_id: command.partner_id,
            conversation_id,
        })
        .map_err(map_source_error)
}

fn map_source_error(error: BackendError) -> SendMessageError {
    match error {
        BackendError::Unavailable | BackendError::NotFound => {
            SendMessageError::TemporarilyUnavailable
        }
    }
}

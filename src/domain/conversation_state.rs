use super::{conversation::ConversationId, message::Message};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationUiState {
    Empty,
    Loading,
    Ready,
    Error,
}

/// State of the single currently open conversation.
///
/// Every snapshot from the message subscription fully replaces the list;
/// there is no incremental append, which trades efficiency for eliminating
/// ordering bugs from partial updates. On deselection the subscription is
/// closed but already-received messages stay visible until a different
/// conversation replaces them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationState {
    conversation_id: Option<ConversationId>,
    partner_id: Option<String>,
    messages: Vec<Message>,
    ui_state: ConversationUiState,
}

impl Default for ConversationState {
    fn default() -> Self {
        Self {
            conversation_id: None,
            partner_id: None,
            messages: Vec::new(),
            ui_state: ConversationUiState::Empty,
        }
    }
}

impl ConversationState {
    pub fn conversation_id(&self) -> Option<&ConversationId> {
        self.conversation_id.as_ref()
    }

    pub fn partner_id(&self) -> Option<&str> {
        self.partner_id.as_deref()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn ui_state(&self) -> ConversationUiState {
        self.ui_state.clone()
    }

    pub fn is_open(&self) -> bool {
        self.conversation_id.is_some()
    }

    pub fn set_loading(&mut self, conversation_id: ConversationId, partner_id: String) {
        self.conversation_id = Some(conversation_id);
        self.partner_id = Some(partner_id);
        self.messages.clear();
        self.ui_state = ConversationUiState::Loading;
    }

    /// Applies a full snapshot. Snapshots for a conversation other than the
    /// open one are discarded: they belong to a subscription that was closed
    /// after a reselect but had a snapshot already in flight.
    pub fn apply_snapshot(&mut self, conversation_id: &ConversationId, messages: Vec<Message>) {
        if self.conversation_id.as_ref() != Some(conversation_id) {
            return;
        }

        self.messages = messages;
        self.ui_state = ConversationUiState::Ready;
    }

    pub fn set_error(&mut self) {
        self.ui_state = ConversationUiState::Error;
    }

    pub fn close(&mut self) {
        self.conversation_id = None;
        self.partner_id = None;
    }
}

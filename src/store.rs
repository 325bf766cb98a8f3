//! Single consistent read model for rendering, fed by multiple independent
//! asynchronous producers (subscription callbacks and command
//! acknowledgments). Mutations go through typed entry points; every
//! mutation fans the new snapshot out to subscribed observers.

use std::sync::{mpsc, Arc, Mutex};

use crate::{
    backend::contracts::MembershipSnapshot,
    domain::{
        chat_set_state::ChatSetState,
        conversation::ConversationId,
        conversation_state::ConversationState,
        identity::Identity,
        message::Message,
        roster_state::RosterState,
        unread_state::UnreadCounters,
    },
};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionState {
    pub user: Option<Identity>,
    pub loading: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatState {
    pub session: SessionState,
    pub roster: RosterState,
    pub chat_set: ChatSetState,
    pub selected_chat: Option<String>,
    pub unread: UnreadCounters,
    pub conversation: ConversationState,
}

impl Default for ChatState {
    fn default() -> Self {
        Self {
            session: SessionState {
                user: None,
                loading: true,
                error: None,
            },
            roster: RosterState::default(),
            chat_set: ChatSetState::default(),
            selected_chat: None,
            unread: UnreadCounters::default(),
            conversation: ConversationState::default(),
        }
    }
}

impl ChatState {
    pub fn current_user_id(&self) -> Option<&str> {
        self.session.user.as_ref().map(|user| user.id.as_str())
    }
}

#[derive(Clone, Default)]
pub struct ChatStore {
    inner: Arc<Mutex<StoreState>>,
}

#[derive(Default)]
struct StoreState {
    state: ChatState,
    subscribers: Vec<mpsc::Sender<ChatState>>,
}

impl ChatStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> ChatState {
        self.inner
            .lock()
            .map(|store| store.state.clone())
            .unwrap_or_default()
    }

    /// Registers an observer; the current snapshot is delivered immediately,
    /// then one snapshot per mutation.
    pub fn subscribe(&self) -> mpsc::Receiver<ChatState> {
        let (tx, rx) = mpsc::channel();
        if let Ok(mut store) = self.inner.lock() {
            let _ = tx.send(store.state.clone());
            store.subscribers.push(tx);
        }
        rx
    }

    pub fn begin_auth_attempt(&self) {
        self.mutate(|state| {
            state.session.error = None;
        });
    }

    /// Records one human-readable failure, replacing any prior one.
    pub fn fail_auth_attempt(&self, message: &str) {
        self.mutate(|state| {
            state.session.error = Some(message.to_owned());
        });
    }

    pub fn set_session(&self, user: Option<Identity>) {
        self.mutate(|state| {
            state.session.user = user;
            state.session.loading = false;
        });
    }

    pub fn set_roster(&self, entries: Vec<Identity>) {
        self.mutate(|state| state.roster.set_ready(entries));
    }

    pub fn set_roster_error(&self) {
        self.mutate(|state| state.roster.set_error());
    }

    pub fn apply_membership(&self, snapshot: MembershipSnapshot) {
        self.mutate(|state| {
            state
                .chat_set
                .replace(snapshot.active_chats, snapshot.pinned_chats);
        });
    }

    pub fn set_active_chats(&self, active: Vec<String>) {
        self.mutate(|state| state.chat_set.set_active(active));
    }

    pub fn set_pinned_chats(&self, pinned: Vec<String>) {
        self.mutate(|state| state.chat_set.set_pinned(pinned));
    }

    /// Local effects of an acknowledged chat removal: both sets shrink, the
    /// unread entry disappears, and a removed selected chat is deselected.
    pub fn apply_chat_removal(&self, chat_id: &str, active: Vec<String>, pinned: Vec<String>) {
        self.mutate(|state| {
            state.chat_set.replace(active, pinned);
            state.unread.remove(chat_id);
            if state.selected_chat.as_deref() == Some(chat_id) {
                state.selected_chat = None;
                state.conversation.close();
            }
        });
    }

    /// Changes the selection. Selecting a conversation marks it read,
    /// resetting its unread counter to zero whatever it was.
    pub fn select_chat(&self, partner_id: Option<&str>) {
        self.mutate(|state| {
            state.selected_chat = partner_id.map(str::to_owned);
            if let Some(partner_id) = partner_id {
                state.unread.reset(partner_id);
            }
        });
    }

    pub fn increment_unread(&self, partner_id: &str) {
        self.mutate(|state| state.unread.increment(partner_id));
    }

    pub fn open_conversation(&self, conversation_id: ConversationId, partner_id: &str) {
        self.mutate(|state| {
            state
                .conversation
                .set_loading(conversation_id, partner_id.to_owned());
        });
    }

    pub fn apply_conversation_snapshot(
        &self,
        conversation_id: &ConversationId,
        messages: Vec<Message>,
    ) {
        self.mutate(|state| state.conversation.apply_snapshot(conversation_id, messages));
    }

    pub fn set_conversation_error(&self) {
        self.mutate(|state| state.conversation.set_error());
    }

    pub fn close_conversation(&self) {
        self.mutate(|state| state.conversation.close());
    }

    fn mutate<F>(&self, mutator: F)
    where
        F: FnOnce(&mut ChatState),
    {
        if let Ok(mut store) = self.inner.lock() {
            mutator(&mut store.state);
            let payload = store.state.clone();
            store
                .subscribers
                .retain(|subscriber| subscriber.send(payload.clone()).is_ok());
        }
    }
}

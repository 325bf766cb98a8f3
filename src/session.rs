//! Client session: the seam between backend subscriptions and the store.
//!
//! One session owns every live subscription and processes all backend
//! events on the caller's thread, interleaved with user commands; nothing
//! here runs in parallel with anything else. Commands that write await the
//! backend acknowledgment before touching local state: no optimistic
//! mutation is applied, and the parallel subscriptions reconverge the view
//! regardless of which writer won.

use std::sync::mpsc::{self, Receiver, Sender};

use crate::{
    backend::{
        contracts::{AuthGateway, BackendEvent, DataBackend, DocChangeKind, InboxBatch},
        subscription::Subscription,
    },
    domain::{conversation::ConversationId, message::now_unix_ms},
    store::ChatStore,
    usecases::{
        authenticate,
        chat_set::{self, AddChatOutcome},
        inbox::{self, Notifier},
        send_message::{self, SendMessageCommand, SendMessageError},
    },
};

const PRESENCE_WRITE_FAILED: &str = "PRESENCE_WRITE_FAILED";
const MEMBERSHIP_WRITE_FAILED: &str = "MEMBERSHIP_WRITE_FAILED";
const SUBSCRIPTION_OPEN_FAILED: &str = "SUBSCRIPTION_OPEN_FAILED";
const AUTH_SIGN_OUT_FAILED: &str = "AUTH_SIGN_OUT_FAILED";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendError {
    NotSignedIn,
    NoChatSelected,
    Message(SendMessageError),
}

pub struct ClientSession<B, A, N>
where
    B: DataBackend,
    A: AuthGateway,
    N: Notifier,
{
    backend: B,
    auth: A,
    notifier: N,
    store: ChatStore,
    freshness_window_ms: i64,
    events_tx: Sender<BackendEvent>,
    events_rx: Receiver<BackendEvent>,
    session_sub: Option<Subscription>,
    roster_sub: Option<Subscription>,
    membership_sub: Option<Subscription>,
    inbox_sub: Option<Subscription>,
    conversation_sub: Option<Subscription>,
}

impl<B, A, N> ClientSession<B, A, N>
where
    B: DataBackend,
    A: AuthGateway,
    N: Notifier,
{
    pub fn new(backend: B, auth: A, notifier: N, freshness_window_ms: i64) -> Self {
        let (events_tx, events_rx) = mpsc::channel();
        Self {
            backend,
            auth,
            notifier,
            store: ChatStore::new(),
            freshness_window_ms,
            events_tx,
            events_rx,
            session_sub: None,
            roster_sub: None,
            membership_sub: None,
            inbox_sub: None,
            conversation_sub: None,
        }
    }

    pub fn store(&self) -> &ChatStore {
        &self.store
    }

    /// Opens the continuous session watch. The provider answers with the
    /// present session state, which clears the loading flag.
    pub fn start(&mut self) {
        match self.auth.watch_session(self.events_tx.clone()) {
            Ok(subscription) => self.session_sub = Some(subscription),
            Err(error) => {
                tracing::error!(code = SUBSCRIPTION_OPEN_FAILED, error = %error, "session watch failed to open");
                self.store.set_session(None);
            }
        }
    }

    /// Drains and applies every pending backend event. Events produced by
    /// the handling itself (acknowledged writes echoing back through a
    /// subscription) are drained in the same call.
    pub fn pump(&mut self) {
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle_event(event);
        }
    }

    pub fn sign_in(&mut self, email: &str, password: &str) {
        self.store.begin_auth_attempt();
        if let Err(message) = authenticate::sign_in_with_password(&self.auth, email, password) {
            self.store.fail_auth_attempt(message);
        }
    }

    pub fn sign_up(&mut self, email: &str, password: &str) {
        self.store.begin_auth_attempt();
        if let Err(message) = authenticate::sign_up_with_password(&self.auth, email, password) {
            self.store.fail_auth_attempt(message);
        }
    }

    pub fn sign_in_federated(&mut self) {
        self.store.begin_auth_attempt();
        if let Err(message) = authenticate::sign_in_federated(&self.auth) {
            self.store.fail_auth_attempt(message);
        }
    }

    /// Ends the session. Both steps are best-effort: a failed presence
    /// write never blocks the provider sign-out.
    pub fn sign_out(&mut self) {
        if let Some(user_id) = self.store.snapshot().current_user_id().map(str::to_owned) {
            if let Err(error) = self.backend.set_presence(&user_id, false) {
                tracing::warn!(code = PRESENCE_WRITE_FAILED, error = %error, "offline presence write failed");
            }
        }

        if let Err(error) = self.auth.sign_out() {
            tracing::warn!(code = AUTH_SIGN_OUT_FAILED, error = %error, "provider sign-out failed");
        }
    }

    /// Changes the selected conversation, swapping the message subscription
    /// and resetting the new selection's unread counter.
    pub fn select_chat(&mut self, partner_id: Option<&str>) {
        self.store.select_chat(partner_id);
        if let Some(mut subscription) = self.conversation_sub.take() {
            subscription.close();
        }

        let Some(partner_id) = partner_id else {
            self.store.close_conversation();
            return;
        };
        let Some(self_id) = self.store.snapshot().current_user_id().map(str::to_owned) else {
            return;
        };

        let conversation_id = ConversationId::for_pair(&self_id, partner_id);
        self.store
            .open_conversation(conversation_id.clone(), partner_id);
        match self
            .backend
            .watch_conversation(&conversation_id, self.events_tx.clone())
        {
            Ok(subscription) => self.conversation_sub = Some(subscription),
            Err(error) => {
                tracing::warn!(code = SUBSCRIPTION_OPEN_FAILED, error = %error, "conversation watch failed to open");
                self.store.set_conversation_error();
            }
        }
    }

    /// Sends to the selected conversation. Empty text is rejected locally.
    pub fn send(&mut self, text: &str) -> Result<(), SendError> {
        let snapshot = self.store.snapshot();
        let Some(self_id) = snapshot.current_user_id() else {
            return Err(SendError::NotSignedIn);
        };
        let Some(partner_id) = snapshot.selected_chat.as_deref() else {
            return Err(SendError::NoChatSelected);
        };

        send_message::send_message(
            &self.backend,
            SendMessageCommand {
                self_id: self_id.to_owned(),
                partner_id: partner_id.to_owned(),
                text: text.to_owned(),
            },
        )
        .map_err(SendError::Message)
    }

    /// Adds a chat to the active set. Failures are logged, never surfaced:
    /// the membership subscription reconciles whatever the backend holds.
    pub fn add_active_chat(&mut self, chat_id: &str) {
        let snapshot = self.store.snapshot();
        let Some(self_id) = snapshot.current_user_id() else {
            return;
        };

        match chat_set::add_active_chat(
            &self.backend,
            self_id,
            snapshot.chat_set.active(),
            chat_id,
        ) {
            Ok(AddChatOutcome::Added(active)) => self.store.set_active_chats(active),
            Ok(AddChatOutcome::AlreadyActive) => {}
            Err(error) => {
                tracing::warn!(code = MEMBERSHIP_WRITE_FAILED, error = %error, chat_id, "active chat add failed");
            }
        }
    }

    pub fn toggle_pinned_chat(&mut self, chat_id: &str) {
        let snapshot = self.store.snapshot();
        let Some(self_id) = snapshot.current_user_id() else {
            return;
        };

        match chat_set::toggle_pinned_chat(
            &self.backend,
            self_id,
            snapshot.chat_set.pinned(),
            chat_id,
        ) {
            Ok(outcome) => self.store.set_pinned_chats(outcome.pinned_chats),
            Err(error) => {
                tracing::warn!(code = MEMBERSHIP_WRITE_FAILED, error = %error, chat_id, "pin toggle failed");
            }
        }
    }

    pub fn remove_chat(&mut self, chat_id: &str) {
        let snapshot = self.store.snapshot();
        let Some(self_id) = snapshot.current_user_id() else {
            return;
        };
        let was_selected = snapshot.selected_chat.as_deref() == Some(chat_id);

        match chat_set::remove_chat(
            &self.backend,
            self_id,
            snapshot.chat_set.active(),
            snapshot.chat_set.pinned(),
            chat_id,
        ) {
            Ok(outcome) => {
                self.store
                    .apply_chat_removal(chat_id, outcome.active_chats, outcome.pinned_chats);
                if was_selected {
                    if let Some(mut subscription) = self.conversation_sub.take() {
                        subscription.close();
                    }
                }
            }
            Err(error) => {
                tracing::warn!(code = MEMBERSHIP_WRITE_FAILED, error = %error, chat_id, "chat removal failed");
            }
        }
    }

    fn handle_event(&mut self, event: BackendEvent) {
        match event {
            BackendEvent::Session(Some(user)) => {
                let user_id = user.id.clone();
                self.store.set_session(Some(user));
                if let Err(error) = self.backend.set_presence(&user_id, true) {
                    tracing::warn!(code = PRESENCE_WRITE_FAILED, error = %error, "online presence write failed");
                }
                self.open_session_subscriptions(&user_id);
            }
            BackendEvent::Session(None) => {
                self.close_session_subscriptions();
                self.store.set_session(None);
            }
            BackendEvent::Roster(entries) => self.store.set_roster(entries),
            BackendEvent::Membership(snapshot) => self.store.apply_membership(snapshot),
            BackendEvent::Conversation(snapshot) => self
                .store
                .apply_conversation_snapshot(&snapshot.conversation_id, snapshot.messages),
            BackendEvent::Inbox(batch) => self.handle_inbox(batch),
        }
    }

    fn open_session_subscriptions(&mut self, user_id: &str) {
        self.close_session_subscriptions();

        match self.backend.watch_roster(user_id, self.events_tx.clone()) {
            Ok(subscription) => self.roster_sub = Some(subscription),
            Err(error) => {
                tracing::warn!(code = SUBSCRIPTION_OPEN_FAILED, error = %error, "roster watch failed to open");
                self.store.set_roster_error();
            }
        }

        match self
            .backend
            .watch_membership(user_id, self.events_tx.clone())
        {
            Ok(subscription) => self.membership_sub = Some(subscription),
            Err(error) => {
                tracing::warn!(code = SUBSCRIPTION_OPEN_FAILED, error = %error, "membership watch failed to open");
            }
        }

        match self.backend.watch_inbox(user_id, self.events_tx.clone()) {
            Ok(subscription) => self.inbox_sub = Some(subscription),
            Err(error) => {
                tracing::warn!(code = SUBSCRIPTION_OPEN_FAILED, error = %error, "inbox watch failed to open");
            }
        }
    }

    fn close_session_subscriptions(&mut self) {
        for slot in [
            &mut self.roster_sub,
            &mut self.membership_sub,
            &mut self.inbox_sub,
            &mut self.conversation_sub,
        ] {
            if let Some(mut subscription) = slot.take() {
                subscription.close();
            }
        }
    }

    fn handle_inbox(&mut self, batch: InboxBatch) {
        let snapshot = self.store.snapshot();
        let Some(self_id) = snapshot.current_user_id().map(str::to_owned) else {
            return;
        };
        let selected = snapshot.selected_chat.clone();
        let mut active = snapshot.chat_set.active().to_vec();
        let now = now_unix_ms();

        for change in &batch.changes {
            if change.kind != DocChangeKind::Added {
                continue;
            }
            let message = &change.message;
            let sender_id = message.sender_id.as_str();

            if inbox::needs_activation(&active, sender_id) {
                match chat_set::add_active_chat(&self.backend, &self_id, &active, sender_id) {
                    Ok(AddChatOutcome::Added(next)) => {
                        self.store.set_active_chats(next.clone());
                        active = next;
                    }
                    Ok(AddChatOutcome::AlreadyActive) => {}
                    Err(error) => {
                        tracing::warn!(
                            code = MEMBERSHIP_WRITE_FAILED,
                            error = %error,
                            sender_id,
                            "inbox-driven chat activation failed"
                        );
                    }
                }
            }

            if inbox::should_count_unread(
                message,
                batch.initial,
                &self_id,
                selected.as_deref(),
                now,
                self.freshness_window_ms,
            ) {
                self.store.increment_unread(sender_id);
                let sender_name = snapshot
                    .roster
                    .find(sender_id)
                    .map(|entry| entry.name.clone());
                if let Some(notification) =
                    inbox::notification_for(message, sender_name.as_deref())
                {
                    self.notifier.notify(&notification);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::{
        backend::memory::MemoryBackend,
        domain::notification::Notification,
        usecases::{authenticate::INVALID_CREDENTIALS, inbox::DEFAULT_FRESHNESS_WINDOW_MS},
    };

    #[derive(Clone, Default)]
    struct RecordingNotifier {
        delivered: Arc<Mutex<Vec<Notification>>>,
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, notification: &Notification) {
            self.delivered
                .lock()
                .expect("notifier lock")
                .push(notification.clone());
        }
    }

    fn session_over(
        backend: &MemoryBackend,
    ) -> (
        ClientSession<MemoryBackend, crate::backend::memory::MemoryAuthGateway, RecordingNotifier>,
        RecordingNotifier,
    ) {
        let notifier = RecordingNotifier::default();
        let mut session = ClientSession::new(
            backend.clone(),
            backend.auth_gateway(),
            notifier.clone(),
            DEFAULT_FRESHNESS_WINDOW_MS,
        );
        session.start();
        session.pump();
        (session, notifier)
    }

    fn seeded_backend() -> MemoryBackend {
        let backend = MemoryBackend::new();
        backend
            .register_user("Alice", "alice@example.com", "secret-1")
            .expect("alice registers");
        backend
            .register_user("Bob", "bob@example.com", "secret-2")
            .expect("bob registers");
        backend
    }

    #[test]
    fn start_clears_session_loading() {
        let backend = seeded_backend();
        let (session, _) = session_over(&backend);

        let snapshot = session.store().snapshot();
        assert!(!snapshot.session.loading);
        assert!(snapshot.session.user.is_none());
    }

    #[test]
    fn sign_in_populates_session_roster_and_presence() {
        let backend = seeded_backend();
        let (mut session, _) = session_over(&backend);

        session.sign_in("alice@example.com", "secret-1");
        session.pump();

        let snapshot = session.store().snapshot();
        assert_eq!(
            snapshot.session.user.as_ref().map(|u| u.name.as_str()),
            Some("Alice")
        );
        assert_eq!(snapshot.roster.entries().len(), 1);
        assert_eq!(snapshot.roster.entries()[0].name, "Bob");
        assert!(snapshot.session.error.is_none());
    }

    #[test]
    fn failed_sign_in_surfaces_one_fixed_message() {
        let backend = seeded_backend();
        let (mut session, _) = session_over(&backend);

        session.sign_in("alice@example.com", "wrong");
        session.pump();

        let snapshot = session.store().snapshot();
        assert!(snapshot.session.user.is_none());
        assert_eq!(snapshot.session.error.as_deref(), Some(INVALID_CREDENTIALS));
    }

    #[test]
    fn successful_attempt_clears_previous_error() {
        let backend = seeded_backend();
        let (mut session, _) = session_over(&backend);
        session.sign_in("alice@example.com", "wrong");
        session.pump();

        session.sign_in("alice@example.com", "secret-1");
        session.pump();

        assert!(session.store().snapshot().session.error.is_none());
    }

    #[test]
    fn sign_out_freezes_roster_and_clears_user() {
        let backend = seeded_backend();
        let (mut session, _) = session_over(&backend);
        session.sign_in("alice@example.com", "secret-1");
        session.pump();

        session.sign_out();
        session.pump();

        let snapshot = session.store().snapshot();
        assert!(snapshot.session.user.is_none());
        assert_eq!(snapshot.roster.entries().len(), 1);
    }

    #[test]
    fn sending_without_selection_is_rejected_locally() {
        let backend = seeded_backend();
        let (mut session, _) = session_over(&backend);
        session.sign_in("alice@example.com", "secret-1");
        session.pump();

        assert_eq!(session.send("hello"), Err(SendError::NoChatSelected));
    }

    #[test]
    fn whitespace_only_send_never_reaches_the_backend() {
        let backend = seeded_backend();
        let (mut session, _) = session_over(&backend);
        session.sign_in("alice@example.com", "secret-1");
        session.pump();
        let bob_id = session.store().snapshot().roster.entries()[0].id.clone();
        session.select_chat(Some(&bob_id));
        session.pump();

        let result = session.send("   ");

        assert_eq!(
            result,
            Err(SendError::Message(SendMessageError::EmptyMessage))
        );
        assert!(session
            .store()
            .snapshot()
            .conversation
            .messages()
            .is_empty());
    }

    #[test]
    fn selecting_a_chat_opens_its_message_stream() {
        let backend = seeded_backend();
        let (mut session, _) = session_over(&backend);
        session.sign_in("alice@example.com", "secret-1");
        session.pump();
        let bob_id = session.store().snapshot().roster.entries()[0].id.clone();

        session.select_chat(Some(&bob_id));
        session.add_active_chat(&bob_id);
        session.send("hello").expect("send succeeds");
        session.pump();

        let snapshot = session.store().snapshot();
        let messages = snapshot.conversation.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].text, "hello");
        assert!(messages[0].is_from(snapshot.current_user_id().expect("signed in")));
    }

    #[test]
    fn incoming_message_from_selected_partner_neither_counts_nor_notifies() {
        let backend = seeded_backend();
        let (mut alice, notifier) = session_over(&backend);
        alice.sign_in("alice@example.com", "secret-1");
        alice.pump();
        let bob_id = alice.store().snapshot().roster.entries()[0].id.clone();
        alice.select_chat(Some(&bob_id));
        alice.pump();

        let (mut bob, _) = session_over(&backend);
        bob.sign_in("bob@example.com", "secret-2");
        bob.pump();
        let alice_id = bob.store().snapshot().roster.entries()[0].id.clone();
        bob.select_chat(Some(&alice_id));
        bob.send("hi alice").expect("send succeeds");
        alice.pump();

        let snapshot = alice.store().snapshot();
        assert_eq!(snapshot.unread.count(&bob_id), 0);
        assert!(notifier.delivered.lock().expect("notifier lock").is_empty());
        assert_eq!(snapshot.conversation.messages().len(), 1);
    }

    #[test]
    fn incoming_message_from_unselected_partner_counts_and_notifies_once() {
        let backend = seeded_backend();
        let (mut alice, notifier) = session_over(&backend);
        alice.sign_in("alice@example.com", "secret-1");
        alice.pump();
        let bob_id = alice.store().snapshot().roster.entries()[0].id.clone();

        let (mut bob, _) = session_over(&backend);
        bob.sign_in("bob@example.com", "secret-2");
        bob.pump();
        let alice_id = bob.store().snapshot().roster.entries()[0].id.clone();
        bob.select_chat(Some(&alice_id));
        bob.send("ping").expect("send succeeds");
        alice.pump();

        let snapshot = alice.store().snapshot();
        assert_eq!(snapshot.unread.count(&bob_id), 1);
        assert!(snapshot.chat_set.is_active(&bob_id));
        let delivered = notifier.delivered.lock().expect("notifier lock");
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].headline(), "New message from Bob");
        assert_eq!(delivered[0].text, "ping");
    }

    #[test]
    fn backfilled_history_activates_chats_but_never_notifies() {
        let backend = seeded_backend();
        let (mut bob_probe, _) = session_over(&backend);
        bob_probe.sign_in("bob@example.com", "secret-2");
        bob_probe.pump();
        let alice_id = bob_probe.store().snapshot().roster.entries()[0].id.clone();
        let bob_id = bob_probe
            .store()
            .snapshot()
            .current_user_id()
            .expect("signed in")
            .to_owned();
        bob_probe.sign_out();
        bob_probe.pump();

        backend
            .seed_message(
                crate::domain::message::MessageDraft {
                    text: "from before".to_owned(),
                    sender_id: alice_id.clone(),
                    receiver_id: bob_id.clone(),
                    conversation_id: ConversationId::for_pair(&alice_id, &bob_id),
                },
                now_unix_ms(),
            )
            .expect("seed");

        let (mut bob, notifier) = session_over(&backend);
        bob.sign_in("bob@example.com", "secret-2");
        bob.pump();

        let snapshot = bob.store().snapshot();
        assert!(snapshot.chat_set.is_active(&alice_id));
        assert_eq!(snapshot.unread.count(&alice_id), 0);
        assert!(notifier.delivered.lock().expect("notifier lock").is_empty());
    }

    #[test]
    fn remove_chat_clears_selection_and_counter() {
        let backend = seeded_backend();
        let (mut session, _) = session_over(&backend);
        session.sign_in("alice@example.com", "secret-1");
        session.pump();
        let bob_id = session.store().snapshot().roster.entries()[0].id.clone();
        session.add_active_chat(&bob_id);
        session.toggle_pinned_chat(&bob_id);
        session.select_chat(Some(&bob_id));
        session.pump();

        session.remove_chat(&bob_id);
        session.pump();

        let snapshot = session.store().snapshot();
        assert!(!snapshot.chat_set.is_active(&bob_id));
        assert!(!snapshot.chat_set.is_pinned(&bob_id));
        assert_eq!(snapshot.unread.count(&bob_id), 0);
        assert_eq!(snapshot.selected_chat, None);
    }

    #[test]
    fn pin_toggle_round_trips_through_the_membership_subscription() {
        let backend = seeded_backend();
        let (mut session, _) = session_over(&backend);
        session.sign_in("alice@example.com", "secret-1");
        session.pump();
        let bob_id = session.store().snapshot().roster.entries()[0].id.clone();
        session.add_active_chat(&bob_id);

        session.toggle_pinned_chat(&bob_id);
        session.pump();
        assert!(session.store().snapshot().chat_set.is_pinned(&bob_id));

        session.toggle_pinned_chat(&bob_id);
        session.pump();
        assert!(!session.store().snapshot().chat_set.is_pinned(&bob_id));
    }
}

//! Two-session flows over one shared in-process backend: the full path
//! from sign-in through live delivery, unread accounting, and membership
//! convergence.

use std::sync::{Arc, Mutex};

use backchat::{
    backend::memory::{MemoryAuthGateway, MemoryBackend},
    domain::notification::Notification,
    session::ClientSession,
    usecases::inbox::{Notifier, DEFAULT_FRESHNESS_WINDOW_MS},
};

#[derive(Clone, Default)]
struct RecordingNotifier {
    delivered: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingNotifier {
    fn notifications(&self) -> Vec<Notification> {
        self.delivered.lock().expect("notifier lock").clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: &Notification) {
        self.delivered
            .lock()
            .expect("notifier lock")
            .push(notification.clone());
    }
}

type TestSession = ClientSession<MemoryBackend, MemoryAuthGateway, RecordingNotifier>;

fn start_session(backend: &MemoryBackend) -> (TestSession, RecordingNotifier) {
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

fn signed_in(
    backend: &MemoryBackend,
    email: &str,
    password: &str,
) -> (TestSession, RecordingNotifier) {
    let (mut session, notifier) = start_session(backend);
    session.sign_in(email, password);
    session.pump();
    assert!(
        session.store().snapshot().session.user.is_some(),
        "sign-in must succeed for {email}"
    );
    (session, notifier)
}

fn partner_id(session: &TestSession, name: &str) -> String {
    session
        .store()
        .snapshot()
        .roster
        .entries()
        .iter()
        .find(|entry| entry.name == name)
        .map(|entry| entry.id.clone())
        .expect("partner must be in the roster")
}

#[test]
fn hello_reaches_the_recipient_and_activates_the_chat() {
    let backend = seeded_backend();
    let (mut alice, _) = signed_in(&backend, "alice@example.com", "secret-1");
    let (mut bob, bob_notifier) = signed_in(&backend, "bob@example.com", "secret-2");

    let bob_id = partner_id(&alice, "Bob");
    let alice_id = partner_id(&bob, "Alice");

    // B is not an active chat for A yet; selecting starts the conversation.
    alice.add_active_chat(&bob_id);
    alice.select_chat(Some(&bob_id));
    alice.pump();
    alice.send("hello").expect("send succeeds");
    alice.pump();
    bob.pump();

    // A's open stream shows exactly the one message, attributed to A.
    let alice_view = alice.store().snapshot();
    let messages = alice_view.conversation.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].text, "hello");
    assert_eq!(
        Some(messages[0].sender_id.as_str()),
        alice_view.current_user_id()
    );

    // B's inbox watcher added A to B's active chats and counted the unread.
    let bob_view = bob.store().snapshot();
    assert!(bob_view.chat_set.is_active(&alice_id));
    assert_eq!(bob_view.unread.count(&alice_id), 1);
    let notifications = bob_notifier.notifications();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].headline(), "New message from Alice");
    assert_eq!(notifications[0].text, "hello");
}

#[test]
fn both_participants_observe_the_same_conversation_stream() {
    let backend = seeded_backend();
    let (mut alice, _) = signed_in(&backend, "alice@example.com", "secret-1");
    let (mut bob, _) = signed_in(&backend, "bob@example.com", "secret-2");

    let bob_id = partner_id(&alice, "Bob");
    let alice_id = partner_id(&bob, "Alice");

    alice.select_chat(Some(&bob_id));
    bob.select_chat(Some(&alice_id));
    alice.pump();
    bob.pump();

    alice.send("first").expect("send succeeds");
    bob.pump();
    bob.send("second").expect("send succeeds");
    alice.pump();
    bob.pump();

    let alice_texts: Vec<String> = alice
        .store()
        .snapshot()
        .conversation
        .messages()
        .iter()
        .map(|m| m.text.clone())
        .collect();
    let bob_texts: Vec<String> = bob
        .store()
        .snapshot()
        .conversation
        .messages()
        .iter()
        .map(|m| m.text.clone())
        .collect();

    assert_eq!(alice_texts, vec!["first".to_owned(), "second".to_owned()]);
    assert_eq!(alice_texts, bob_texts);
}

#[test]
fn selecting_the_conversation_resets_its_unread_counter() {
    let backend = seeded_backend();
    let (mut alice, _) = signed_in(&backend, "alice@example.com", "secret-1");
    let (mut bob, _) = signed_in(&backend, "bob@example.com", "secret-2");

    let alice_id = partner_id(&bob, "Alice");
    let bob_id = partner_id(&alice, "Bob");

    alice.select_chat(Some(&bob_id));
    alice.pump();
    alice.send("one").expect("send succeeds");
    alice.send("two").expect("send succeeds");
    bob.pump();
    assert_eq!(bob.store().snapshot().unread.count(&alice_id), 2);

    bob.select_chat(Some(&alice_id));
    bob.pump();

    assert_eq!(bob.store().snapshot().unread.count(&alice_id), 0);
}

#[test]
fn membership_writes_converge_across_sessions_on_the_same_account() {
    let backend = seeded_backend();
    let (mut first, _) = signed_in(&backend, "alice@example.com", "secret-1");
    let (mut second, _) = signed_in(&backend, "alice@example.com", "secret-1");

    let bob_id = partner_id(&first, "Bob");
    first.add_active_chat(&bob_id);
    first.toggle_pinned_chat(&bob_id);
    first.pump();
    second.pump();

    let converged = second.store().snapshot();
    assert!(converged.chat_set.is_active(&bob_id));
    assert!(converged.chat_set.is_pinned(&bob_id));

    second.remove_chat(&bob_id);
    second.pump();
    first.pump();

    let view = first.store().snapshot();
    assert!(!view.chat_set.is_active(&bob_id));
    assert!(!view.chat_set.is_pinned(&bob_id));
}

#[test]
fn signed_out_session_stops_observing_the_backend() {
    let backend = seeded_backend();
    let (mut alice, _) = signed_in(&backend, "alice@example.com", "secret-1");
    let (mut bob, bob_notifier) = signed_in(&backend, "bob@example.com", "secret-2");
    let alice_id = partner_id(&bob, "Alice");

    let bob_id = partner_id(&alice, "Bob");
    bob.sign_out();
    bob.pump();

    let frozen = bob.store().snapshot();
    assert!(frozen.session.user.is_none());
    assert_eq!(frozen.roster.entries().len(), 1);

    alice.select_chat(Some(&bob_id));
    alice.pump();
    alice.send("anyone home?").expect("send succeeds");
    bob.pump();

    let after = bob.store().snapshot();
    assert_eq!(after.unread.count(&alice_id), 0);
    assert!(!after.chat_set.is_active(&alice_id));
    assert!(bob_notifier.notifications().is_empty());
}

#[test]
fn presence_flag_follows_session_lifecycle() {
    let backend = seeded_backend();
    let (mut alice, _) = signed_in(&backend, "alice@example.com", "secret-1");
    let (mut bob, _) = signed_in(&backend, "bob@example.com", "secret-2");

    alice.pump();
    let bob_id = partner_id(&alice, "Bob");
    let before = alice.store().snapshot();
    let entry = before.roster.find(&bob_id).expect("bob visible");
    assert!(entry.is_online);

    bob.sign_out();
    bob.pump();
    alice.pump();

    let after = alice.store().snapshot();
    let entry = after.roster.find(&bob_id).expect("bob still visible");
    assert!(!entry.is_online);
}

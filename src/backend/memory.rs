//! In-process implementation of the backend contracts.
//!
//! Documents live under one mutex; every write synchronously fans out
//! snapshots or diffs to the registered watchers, so local runs and tests
//! observe the same subscription behavior the hosted store provides:
//! initial backfill on registration, then one push per matching write.

use std::{
    collections::BTreeMap,
    sync::{mpsc::Sender, Arc, Mutex},
};

use uuid::Uuid;

use crate::domain::{
    conversation::ConversationId,
    identity::Identity,
    message::{now_unix_ms, Message, MessageDraft},
};

use super::{
    contracts::{
        AuthGateway, AuthGatewayError, BackendError, BackendEvent, ConversationSnapshot,
        DocChangeKind, FederatedFlow, InboxBatch, MembershipPatch, MembershipSnapshot,
        MembershipStore, MessageChange, MessageStore, PresenceWriter, RosterSource,
    },
    subscription::Subscription,
};

#[derive(Debug, Clone)]
struct StoredUser {
    identity: Identity,
    active_chats: Vec<String>,
    pinned_chats: Vec<String>,
    password: Option<String>,
}

struct RosterWatcher {
    id: u64,
    excluding: String,
    tx: Sender<BackendEvent>,
}

struct MembershipWatcher {
    id: u64,
    user_id: String,
    tx: Sender<BackendEvent>,
}

struct ConversationWatcher {
    id: u64,
    conversation_id: ConversationId,
    tx: Sender<BackendEvent>,
}

struct InboxWatcher {
    id: u64,
    receiver_id: String,
    tx: Sender<BackendEvent>,
}

#[derive(Default)]
struct Watchers {
    roster: Vec<RosterWatcher>,
    membership: Vec<MembershipWatcher>,
    conversation: Vec<ConversationWatcher>,
    inbox: Vec<InboxWatcher>,
}

#[derive(Default)]
struct MemoryState {
    users: BTreeMap<String, StoredUser>,
    messages: Vec<Message>,
    watchers: Watchers,
    next_watcher_id: u64,
}

impl MemoryState {
    fn roster_for(&self, excluding: &str) -> Vec<Identity> {
        self.users
            .values()
            .filter(|user| user.identity.id != excluding)
            .map(|user| user.identity.clone())
            .collect()
    }

    fn membership_for(&self, user_id: &str) -> MembershipSnapshot {
        self.users
            .get(user_id)
            .map(|user| MembershipSnapshot {
                active_chats: user.active_chats.clone(),
                pinned_chats: user.pinned_chats.clone(),
            })
            .unwrap_or_default()
    }

    fn conversation_messages(&self, conversation_id: &ConversationId) -> Vec<Message> {
        let mut messages: Vec<Message> = self
            .messages
            .iter()
            .filter(|message| message.conversation_id == conversation_id.as_str())
            .cloned()
            .collect();
        messages.sort_by(|a, b| {
            a.sent_at_unix_ms
                .cmp(&b.sent_at_unix_ms)
                .then_with(|| a.id.cmp(&b.id))
        });
        messages
    }

    fn inbox_messages(&self, receiver_id: &str) -> Vec<Message> {
        let mut messages: Vec<Message> = self
            .messages
            .iter()
            .filter(|message| message.receiver_id == receiver_id)
            .cloned()
            .collect();
        messages.sort_by(|a, b| {
            b.sent_at_unix_ms
                .cmp(&a.sent_at_unix_ms)
                .then_with(|| b.id.cmp(&a.id))
        });
        messages
    }

    fn notify_roster(&mut self) {
        let snapshots: Vec<(usize, Vec<Identity>)> = self
            .watchers
            .roster
            .iter()
            .enumerate()
            .map(|(index, watcher)| (index, self.roster_for(&watcher.excluding)))
            .collect();

        let mut dead = Vec::new();
        for (index, roster) in snapshots {
            let watcher = &self.watchers.roster[index];
            if watcher.tx.send(BackendEvent::Roster(roster)).is_err() {
                dead.push(watcher.id);
            }
        }
        self.watchers.roster.retain(|w| !dead.contains(&w.id));
    }

    fn notify_membership(&mut self, user_id: &str) {
        let snapshot = self.membership_for(user_id);
        let watchers = &mut self.watchers.membership;
        watchers.retain(|watcher| {
            watcher.user_id != user_id
                || watcher
                    .tx
                    .send(BackendEvent::Membership(snapshot.clone()))
                    .is_ok()
        });
    }

    fn notify_conversation(&mut self, conversation_id: &ConversationId) {
        let messages = self.conversation_messages(conversation_id);
        let watchers = &mut self.watchers.conversation;
        watchers.retain(|watcher| {
            watcher.conversation_id != *conversation_id
                || watcher
                    .tx
                    .send(BackendEvent::Conversation(ConversationSnapshot {
                        conversation_id: conversation_id.clone(),
                        messages: messages.clone(),
                    }))
                    .is_ok()
        });
    }

    fn notify_inbox(&mut self, receiver_id: &str, message: &Message) {
        let batch = InboxBatch {
            initial: false,
            changes: vec![MessageChange {
                kind: DocChangeKind::Added,
                message: message.clone(),
            }],
        };
        let watchers = &mut self.watchers.inbox;
        watchers.retain(|watcher| {
            watcher.receiver_id != receiver_id
                || watcher.tx.send(BackendEvent::Inbox(batch.clone())).is_ok()
        });
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_watcher_id;
        self.next_watcher_id += 1;
        id
    }
}

/// Shared in-process backend: document store plus live fan-out. Clones share
/// the same documents, as every client of one hosted project would.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    inner: Arc<Mutex<MemoryState>>,
}

impl std::fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBackend").finish_non_exhaustive()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Per-client identity-provider handle over this backend's documents.
    pub fn auth_gateway(&self) -> MemoryAuthGateway {
        MemoryAuthGateway {
            docs: Arc::clone(&self.inner),
            session: Arc::new(Mutex::new(AuthSessionState::default())),
            federated: Arc::new(Mutex::new(FederatedConfig::default())),
        }
    }

    /// Provisions an account the way the hosted project would outside this
    /// client (sandbox seeding). Returns the assigned id.
    pub fn register_user(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<String, BackendError> {
        let mut state = self.lock()?;
        let id = format!("u-{}", Uuid::new_v4());
        state.users.insert(
            id.clone(),
            StoredUser {
                identity: Identity {
                    id: id.clone(),
                    name: name.to_owned(),
                    email: email.to_owned(),
                    avatar_url: None,
                    is_online: false,
                    last_seen_unix_ms: now_unix_ms(),
                },
                active_chats: Vec::new(),
                pinned_chats: Vec::new(),
                password: Some(password.to_owned()),
            },
        );
        state.notify_roster();
        Ok(id)
    }

    /// Appends a message with an explicit timestamp. Lets tests and sandbox
    /// seeding create history that predates any live subscription.
    pub fn seed_message(
        &self,
        draft: MessageDraft,
        sent_at_unix_ms: i64,
    ) -> Result<Message, BackendError> {
        let mut state = self.lock()?;
        Ok(append_locked(&mut state, draft, sent_at_unix_ms))
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryState>, BackendError> {
        self.inner.lock().map_err(|_| BackendError::Unavailable)
    }

    fn remove_watcher(inner: &Arc<Mutex<MemoryState>>, kind: WatcherKind, id: u64) {
        if let Ok(mut state) = inner.lock() {
            match kind {
                WatcherKind::Roster => state.watchers.roster.retain(|w| w.id != id),
                WatcherKind::Membership => state.watchers.membership.retain(|w| w.id != id),
                WatcherKind::Conversation => state.watchers.conversation.retain(|w| w.id != id),
                WatcherKind::Inbox => state.watchers.inbox.retain(|w| w.id != id),
            }
        }
    }

    fn subscription(&self, kind: WatcherKind, id: u64) -> Subscription {
        let inner = Arc::clone(&self.inner);
        Subscription::new(move || Self::remove_watcher(&inner, kind, id))
    }
}

#[derive(Debug, Clone, Copy)]
enum WatcherKind {
    Roster,
    Membership,
    Conversation,
    Inbox,
}

fn append_locked(state: &mut MemoryState, draft: MessageDraft, sent_at_unix_ms: i64) -> Message {
    let message = Message {
        id: Uuid::new_v4().to_string(),
        text: draft.text,
        sender_id: draft.sender_id,
        receiver_id: draft.receiver_id,
        conversation_id: draft.conversation_id.as_str().to_owned(),
        sent_at_unix_ms,
    };
    state.messages.push(message.clone());

    let conversation_id = ConversationId::for_pair(&message.sender_id, &message.receiver_id);
    state.notify_conversation(&conversation_id);
    let receiver_id = message.receiver_id.clone();
    state.notify_inbox(&receiver_id, &message);
    message
}

impl RosterSource for MemoryBackend {
    fn watch_roster(
        &self,
        excluding: &str,
        events: Sender<BackendEvent>,
    ) -> Result<Subscription, BackendError> {
        let mut state = self.lock()?;
        let id = state.next_id();
        let initial = state.roster_for(excluding);
        let _ = events.send(BackendEvent::Roster(initial));
        state.watchers.roster.push(RosterWatcher {
            id,
            excluding: excluding.to_owned(),
            tx: events,
        });
        drop(state);
        Ok(self.subscription(WatcherKind::Roster, id))
    }
}

impl MembershipStore for MemoryBackend {
    fn watch_membership(
        &self,
        user_id: &str,
        events: Sender<BackendEvent>,
    ) -> Result<Subscription, BackendError> {
        let mut state = self.lock()?;
        let id = state.next_id();
        let initial = state.membership_for(user_id);
        let _ = events.send(BackendEvent::Membership(initial));
        state.watchers.membership.push(MembershipWatcher {
            id,
            user_id: user_id.to_owned(),
            tx: events,
        });
        drop(state);
        Ok(self.subscription(WatcherKind::Membership, id))
    }

    fn merge_membership(&self, user_id: &str, patch: MembershipPatch) -> Result<(), BackendError> {
        let mut state = self.lock()?;
        let user = state.users.get_mut(user_id).ok_or(BackendError::NotFound)?;
        if let Some(active) = patch.active_chats {
            user.active_chats = active;
        }
        if let Some(pinned) = patch.pinned_chats {
            user.pinned_chats = pinned;
        }
        state.notify_membership(user_id);
        Ok(())
    }
}

impl MessageStore for MemoryBackend {
    fn watch_conversation(
        &self,
        conversation_id: &ConversationId,
        events: Sender<BackendEvent>,
    ) -> Result<Subscription, BackendError> {
        let mut state = self.lock()?;
        let id = state.next_id();
        let initial = ConversationSnapshot {
            conversation_id: conversation_id.clone(),
            messages: state.conversation_messages(conversation_id),
        };
        let _ = events.send(BackendEvent::Conversation(initial));
        state.watchers.conversation.push(ConversationWatcher {
            id,
            conversation_id: conversation_id.clone(),
            tx: events,
        });
        drop(state);
        Ok(self.subscription(WatcherKind::Conversation, id))
    }

    fn watch_inbox(
        &self,
        receiver_id: &str,
        events: Sender<BackendEvent>,
    ) -> Result<Subscription, BackendError> {
        let mut state = self.lock()?;
        let id = state.next_id();
        let backfill = InboxBatch {
            initial: true,
            changes: state
                .inbox_messages(receiver_id)
                .into_iter()
                .map(|message| MessageChange {
                    kind: DocChangeKind::Added,
                    message,
                })
                .collect(),
        };
        let _ = events.send(BackendEvent::Inbox(backfill));
        state.watchers.inbox.push(InboxWatcher {
            id,
            receiver_id: receiver_id.to_owned(),
            tx: events,
        });
        drop(state);
        Ok(self.subscription(WatcherKind::Inbox, id))
    }

    fn append_message(&self, draft: MessageDraft) -> Result<(), BackendError> {
        let mut state = self.lock()?;
        let sent_at = now_unix_ms();
        append_locked(&mut state, draft, sent_at);
        Ok(())
    }
}

impl PresenceWriter for MemoryBackend {
    fn set_presence(&self, user_id: &str, online: bool) -> Result<(), BackendError> {
        let mut state = self.lock()?;
        let user = state.users.get_mut(user_id).ok_or(BackendError::NotFound)?;
        user.identity.is_online = online;
        user.identity.last_seen_unix_ms = now_unix_ms();
        state.notify_roster();
        Ok(())
    }
}

/// Identity a federated provider would hand back for this client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FederatedProfile {
    pub name: String,
    pub email: String,
    pub avatar_url: Option<String>,
}

#[derive(Default)]
struct FederatedConfig {
    profile: Option<FederatedProfile>,
    popup_blocked: bool,
}

struct SessionWatcher {
    id: u64,
    tx: Sender<BackendEvent>,
}

#[derive(Default)]
struct AuthSessionState {
    current_user_id: Option<String>,
    watchers: Vec<SessionWatcher>,
    next_watcher_id: u64,
}

const MIN_PASSWORD_LEN: usize = 6;

/// Per-client identity provider over a [`MemoryBackend`]'s documents.
///
/// Sessions are client-local (two gateways over the same documents hold
/// independent sessions), mirroring how each app instance of the hosted
/// provider tracks its own signed-in user.
#[derive(Clone)]
pub struct MemoryAuthGateway {
    docs: Arc<Mutex<MemoryState>>,
    session: Arc<Mutex<AuthSessionState>>,
    federated: Arc<Mutex<FederatedConfig>>,
}

impl std::fmt::Debug for MemoryAuthGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryAuthGateway").finish_non_exhaustive()
    }
}

impl MemoryAuthGateway {
    pub fn configure_federated(&self, profile: FederatedProfile) {
        if let Ok(mut config) = self.federated.lock() {
            config.profile = Some(profile);
        }
    }

    pub fn set_popup_blocked(&self, blocked: bool) {
        if let Ok(mut config) = self.federated.lock() {
            config.popup_blocked = blocked;
        }
    }

    fn establish_session(&self, identity: Identity) -> Result<Identity, AuthGatewayError> {
        let mut session = self
            .session
            .lock()
            .map_err(|_| AuthGatewayError::Other("session state unavailable".to_owned()))?;
        session.current_user_id = Some(identity.id.clone());
        emit_session(&mut session, Some(identity.clone()));
        Ok(identity)
    }

    fn lock_docs(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, MemoryState>, AuthGatewayError> {
        self.docs
            .lock()
            .map_err(|_| AuthGatewayError::Other("backend unavailable".to_owned()))
    }

    fn provision_federated(&self, profile: FederatedProfile) -> Result<Identity, AuthGatewayError> {
        let mut docs = self.lock_docs()?;
        if let Some(user) = docs
            .users
            .values()
            .find(|user| user.identity.email == profile.email)
        {
            return Ok(user.identity.clone());
        }

        let id = format!("u-{}", Uuid::new_v4());
        let identity = Identity {
            id: id.clone(),
            name: profile.name,
            email: profile.email,
            avatar_url: profile.avatar_url,
            is_online: false,
            last_seen_unix_ms: now_unix_ms(),
        };
        docs.users.insert(
            id,
            StoredUser {
                identity: identity.clone(),
                active_chats: Vec::new(),
                pinned_chats: Vec::new(),
                password: None,
            },
        );
        docs.notify_roster();
        Ok(identity)
    }
}

fn emit_session(session: &mut AuthSessionState, identity: Option<Identity>) {
    session
        .watchers
        .retain(|watcher| watcher.tx.send(BackendEvent::Session(identity.clone())).is_ok());
}

impl AuthGateway for MemoryAuthGateway {
    fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Identity, AuthGatewayError> {
        let identity = {
            let docs = self.lock_docs()?;
            docs.users
                .values()
                .find(|user| {
                    user.identity.email == email && user.password.as_deref() == Some(password)
                })
                .map(|user| user.identity.clone())
                .ok_or(AuthGatewayError::InvalidCredential)?
        };
        self.establish_session(identity)
    }

    fn sign_up_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Identity, AuthGatewayError> {
        if password.len() < MIN_PASSWORD_LEN {
            return Err(AuthGatewayError::WeakPassword);
        }

        let identity = {
            let mut docs = self.lock_docs()?;
            if docs.users.values().any(|user| user.identity.email == email) {
                return Err(AuthGatewayError::EmailInUse);
            }

            let id = format!("u-{}", Uuid::new_v4());
            let name = email.split('@').next().unwrap_or(email).to_owned();
            let identity = Identity {
                id: id.clone(),
                name,
                email: email.to_owned(),
                avatar_url: None,
                is_online: false,
                last_seen_unix_ms: now_unix_ms(),
            };
            docs.users.insert(
                id,
                StoredUser {
                    identity: identity.clone(),
                    active_chats: Vec::new(),
                    pinned_chats: Vec::new(),
                    password: Some(password.to_owned()),
                },
            );
            docs.notify_roster();
            identity
        };
        self.establish_session(identity)
    }

    fn sign_in_federated(&self, flow: FederatedFlow) -> Result<Identity, AuthGatewayError> {
        let (profile, popup_blocked) = {
            let config = self
                .federated
                .lock()
                .map_err(|_| AuthGatewayError::Other("federated config unavailable".to_owned()))?;
            (config.profile.clone(), config.popup_blocked)
        };

        if matches!(flow, FederatedFlow::Popup) && popup_blocked {
            return Err(AuthGatewayError::PopupBlocked);
        }

        let profile = profile
            .ok_or_else(|| AuthGatewayError::Other("federated provider not configured".to_owned()))?;
        let identity = self.provision_federated(profile)?;
        self.establish_session(identity)
    }

    fn sign_out(&self) -> Result<(), AuthGatewayError> {
        let mut session = self
            .session
            .lock()
            .map_err(|_| AuthGatewayError::Other("session state unavailable".to_owned()))?;
        session.current_user_id = None;
        emit_session(&mut session, None);
        Ok(())
    }

    fn watch_session(&self, events: Sender<BackendEvent>) -> Result<Subscription, BackendError> {
        let current = {
            let session = self.session.lock().map_err(|_| BackendError::Unavailable)?;
            session.current_user_id.clone()
        };
        let identity = match current {
            Some(user_id) => {
                let docs = self.docs.lock().map_err(|_| BackendError::Unavailable)?;
                docs.users.get(&user_id).map(|user| user.identity.clone())
            }
            None => None,
        };

        let mut session = self.session.lock().map_err(|_| BackendError::Unavailable)?;
        let id = session.next_watcher_id;
        session.next_watcher_id += 1;
        let _ = events.send(BackendEvent::Session(identity));
        session.watchers.push(SessionWatcher { id, tx: events });
        drop(session);

        let handle = Arc::clone(&self.session);
        Ok(Subscription::new(move || {
            if let Ok(mut session) = handle.lock() {
                session.watchers.retain(|watcher| watcher.id != id);
            }
        }))
    }
}

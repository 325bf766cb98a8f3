//! Contracts required from the hosted backend: query-with-filter,
//! live-subscribe with incremental diffs, single-document merge writes, and
//! append-with-server-assigned-timestamp, plus the identity provider.
//!
//! Subscriptions push [`BackendEvent`]s into the channel the caller hands
//! over; within one subscription events arrive in the order the backend
//! emits them, with no ordering guarantee across distinct subscriptions.

use std::sync::mpsc::Sender;

use thiserror::Error;

use crate::domain::{
    conversation::ConversationId,
    identity::Identity,
    message::{Message, MessageDraft},
};

use super::subscription::Subscription;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("backend temporarily unavailable")]
    Unavailable,
    #[error("document not found")]
    NotFound,
}

/// Provider-reported authentication failures, one variant per error code the
/// client translates for the user. Anything unrecognized lands in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthGatewayError {
    #[error("invalid credential")]
    InvalidCredential,
    #[error("email already registered")]
    EmailInUse,
    #[error("password too weak")]
    WeakPassword,
    #[error("interactive popup blocked")]
    PopupBlocked,
    #[error("provider error: {0}")]
    Other(String),
}

/// How a federated sign-in is attempted. A blocked popup is reported as
/// [`AuthGatewayError::PopupBlocked`]; the caller falls back to `Redirect`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FederatedFlow {
    Popup,
    Redirect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocChangeKind {
    Added,
    Modified,
    Removed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageChange {
    pub kind: DocChangeKind,
    pub message: Message,
}

/// Incremental diff from the inbox subscription. `initial` marks the
/// backfill snapshot delivered at registration time, as opposed to changes
/// caused by writes observed live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboxBatch {
    pub initial: bool,
    pub changes: Vec<MessageChange>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationSnapshot {
    pub conversation_id: ConversationId,
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MembershipSnapshot {
    pub active_chats: Vec<String>,
    pub pinned_chats: Vec<String>,
}

/// Merge-write patch for the identity's own record: absent fields are left
/// untouched by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MembershipPatch {
    pub active_chats: Option<Vec<String>>,
    pub pinned_chats: Option<Vec<String>>,
}

/// Everything a subscription can push at the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendEvent {
    Session(Option<Identity>),
    Roster(Vec<Identity>),
    Membership(MembershipSnapshot),
    Conversation(ConversationSnapshot),
    Inbox(InboxBatch),
}

pub trait RosterSource {
    /// Live query over all identities except `excluding`; pushes a full
    /// replacement list per change.
    fn watch_roster(
        &self,
        excluding: &str,
        events: Sender<BackendEvent>,
    ) -> Result<Subscription, BackendError>;
}

pub trait MembershipStore {
    /// Live subscription on one identity's own record, republished as
    /// active/pinned snapshots.
    fn watch_membership(
        &self,
        user_id: &str,
        events: Sender<BackendEvent>,
    ) -> Result<Subscription, BackendError>;

    fn merge_membership(&self, user_id: &str, patch: MembershipPatch) -> Result<(), BackendError>;
}

pub trait MessageStore {
    /// Live query for one conversation, ordered by send time ascending;
    /// pushes a full replacement snapshot per change.
    fn watch_conversation(
        &self,
        conversation_id: &ConversationId,
        events: Sender<BackendEvent>,
    ) -> Result<Subscription, BackendError>;

    /// Live query over all messages addressed to `receiver_id`, ordered by
    /// send time descending; pushes incremental diffs.
    fn watch_inbox(
        &self,
        receiver_id: &str,
        events: Sender<BackendEvent>,
    ) -> Result<Subscription, BackendError>;

    /// Single append write; the backend assigns id and timestamp.
    fn append_message(&self, draft: MessageDraft) -> Result<(), BackendError>;
}

pub trait PresenceWriter {
    /// Writes the presence flag and refreshes the last-seen timestamp on the
    /// identity's record.
    fn set_presence(&self, user_id: &str, online: bool) -> Result<(), BackendError>;
}

pub trait AuthGateway {
    fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Identity, AuthGatewayError>;

    fn sign_up_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Identity, AuthGatewayError>;

    fn sign_in_federated(&self, flow: FederatedFlow) -> Result<Identity, AuthGatewayError>;

    fn sign_out(&self) -> Result<(), AuthGatewayError>;

    /// Continuous "current session" notification; emits the present state on
    /// registration and again on every sign-in or sign-out.
    fn watch_session(&self, events: Sender<BackendEvent>) -> Result<Subscription, BackendError>;
}

/// Convenience bound for the document-store half of the backend.
pub trait DataBackend: RosterSource + MembershipStore + MessageStore + PresenceWriter {}

impl<T> DataBackend for T where T: RosterSource + MembershipStore + MessageStore + PresenceWriter {}

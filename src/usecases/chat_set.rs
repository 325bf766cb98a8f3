//! Use cases mutating the active and pinned chat sets.
//!
//! All three operations read-modify-write the current identity's own record
//! through a merge write. No transactional guard exists against concurrent
//! writers: only the owning identity's sessions ever write the record, and
//! the membership subscription reconverges every session afterwards.

use crate::backend::contracts::{BackendError, MembershipPatch, MembershipStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddChatOutcome {
    /// The id was already active; no write was performed.
    AlreadyActive,
    /// The id was appended; carries the acknowledged active list.
    Added(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoveChatOutcome {
    pub active_chats: Vec<String>,
    pub pinned_chats: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TogglePinOutcome {
    pub pinned_chats: Vec<String>,
    pub now_pinned: bool,
}

/// Adds a chat to the active set. Idempotent: an id that is already present
/// causes no backend write at all.
pub fn add_active_chat(
    store: &dyn MembershipStore,
    self_id: &str,
    active_chats: &[String],
    chat_id: &str,
) -> Result<AddChatOutcome, BackendError> {
    if active_chats.iter().any(|id| id == chat_id) {
        return Ok(AddChatOutcome::AlreadyActive);
    }

    let mut next = active_chats.to_vec();
    next.push(chat_id.to_owned());
    store.merge_membership(
        self_id,
        MembershipPatch {
            active_chats: Some(next.clone()),
            pinned_chats: None,
        },
    )?;
    Ok(AddChatOutcome::Added(next))
}

/// Removes a chat from both the active and pinned sets in one combined
/// write, so a pinned chat never outlives its active entry.
pub fn remove_chat(
    store: &dyn MembershipStore,
    self_id: &str,
    active_chats: &[String],
    pinned_chats: &[String],
    chat_id: &str,
) -> Result<RemoveChatOutcome, BackendError> {
    let next_active: Vec<String> = active_chats
        .iter()
        .filter(|id| id.as_str() != chat_id)
        .cloned()
        .collect();
    let next_pinned: Vec<String> = pinned_chats
        .iter()
        .filter(|id| id.as_str() != chat_id)
        .cloned()
        .collect();

    store.merge_membership(
        self_id,
        MembershipPatch {
            active_chats: Some(next_active.clone()),
            pinned_chats: Some(next_pinned.clone()),
        },
    )?;
    Ok(RemoveChatOutcome {
        active_chats: next_active,
        pinned_chats: next_pinned,
    })
}

/// Flips pinned membership for one chat; the active set is untouched.
pub fn toggle_pinned_chat(
    store: &dyn MembershipStore,
    self_id: &str,
    pinned_chats: &[String],
    chat_id: &str,
) -> Result<TogglePinOutcome, BackendError> {
    let was_pinned = pinned_chats.iter().any(|id| id == chat_id);
    let next: Vec<String> = if was_pinned {
        pinned_chats
            .iter()
            .filter(|id| id.as_str() != chat_id)
            .cloned()
            .collect()
    } else {
        let mut next = pinned_chats.to_vec();
        next.push(chat_id.to_owned());
        next
    };

    store.merge_membership(
        self_id,
        MembershipPatch {
            active_chats: None,
            pinned_chats: Some(next.clone()),
        },
    )?;
    Ok(TogglePinOutcome {
        pinned_chats: next,
        now_pinned: !was_pinned,
    })
}

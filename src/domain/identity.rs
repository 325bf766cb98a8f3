use serde::{Deserialize, Serialize};

/// A user account as the hosted store holds it.
///
/// The client keeps a read-only cached copy per identity; the only fields it
/// ever writes are its own presence flag and last-seen timestamp, on session
/// start and end. Field names follow the hosted store's camelCase wire shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(rename = "photoURL", default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    pub is_online: bool,
    #[serde(rename = "lastSeen")]
    pub last_seen_unix_ms: i64,
}

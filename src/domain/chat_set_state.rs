/// Local mirror of the active and pinned chat sets persisted on the current
/// identity's own record.
///
/// Mutated in two ways that must converge to the same view: acknowledged
/// merge writes from this session, and snapshots from the live subscription
/// on the record (which also carries writes from other sessions on the same
/// account). Order is preserved as the backend stores it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChatSetState {
    active: Vec<String>,
    pinned: Vec<String>,
}

impl ChatSetState {
    pub fn active(&self) -> &[String] {
        &self.active
    }

    pub fn pinned(&self) -> &[String] {
        &self.pinned
    }

    pub fn is_active(&self, chat_id: &str) -> bool {
        self.active.iter().any(|id| id == chat_id)
    }

    pub fn is_pinned(&self, chat_id: &str) -> bool {
        self.pinned.iter().any(|id| id == chat_id)
    }

    pub fn replace(&mut self, active: Vec<String>, pinned: Vec<String>) {
        self.active = active;
        self.pinned = pinned;
    }

    pub fn set_active(&mut self, active: Vec<String>) {
        self.active = active;
    }

    pub fn set_pinned(&mut self, pinned: Vec<String>) {
        self.pinned = pinned;
    }
}

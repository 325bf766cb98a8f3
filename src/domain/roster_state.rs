use super::identity::Identity;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RosterUiState {
    Loading,
    Ready,
    Empty,
    Error,
}

/// Live view of every other known identity.
///
/// Each snapshot from the roster subscription replaces the whole list; no
/// incremental diffing is attempted. When the subscription closes on
/// sign-out the state is frozen, not cleared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterState {
    ui_state: RosterUiState,
    entries: Vec<Identity>,
}

impl Default for RosterState {
    fn default() -> Self {
        Self {
            ui_state: RosterUiState::Loading,
            entries: Vec::new(),
        }
    }
}

impl RosterState {
    pub fn ui_state(&self) -> RosterUiState {
        self.ui_state.clone()
    }

    pub fn entries(&self) -> &[Identity] {
        &self.entries
    }

    pub fn find(&self, user_id: &str) -> Option<&Identity> {
        self.entries.iter().find(|entry| entry.id == user_id)
    }

    pub fn set_ready(&mut self, entries: Vec<Identity>) {
        if entries.is_empty() {
            self.set_empty();
            return;
        }

        self.ui_state = RosterUiState::Ready;
        self.entries = entries;
    }

    pub fn set_empty(&mut self) {
        self.ui_state = RosterUiState::Empty;
        self.entries.clear();
    }

    pub fn set_error(&mut self) {
        self.ui_state = RosterUiState::Error;
        self.entries.clear();
    }
}

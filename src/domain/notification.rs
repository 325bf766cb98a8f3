/// User-visible notice about a newly arrived message in a conversation that
/// is not currently open. Selecting `sender_id` is the associated action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub sender_id: String,
    pub sender_name: String,
    pub text: String,
}

impl Notification {
    pub fn headline(&self) -> String {
        format!("New message from {}", self.sender_name)
    }
}

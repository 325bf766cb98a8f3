/// Canonical identifier for a two-party conversation.
///
/// Derived from the participant ids, never stored on its own: the ids are
/// sorted lexicographically and joined with `_`, so both participants compute
/// the same identifier and subscribe to the same message stream without a
/// separate "create conversation" step.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConversationId(String);

const SEPARATOR: char = '_';

impl ConversationId {
    pub fn for_pair(a: &str, b: &str) -> Self {
        let (first, second) = if a <= b { (a, b) } else { (b, a) };
        Self(format!("{first}{SEPARATOR}{second}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_identical_for_both_participant_orders() {
        let from_a = ConversationId::for_pair("alice", "bob");
        let from_b = ConversationId::for_pair("bob", "alice");

        assert_eq!(from_a, from_b);
    }

    #[test]
    fn joins_sorted_ids_with_underscore() {
        let id = ConversationId::for_pair("u2", "u1");

        assert_eq!(id.as_str(), "u1_u2");
    }

    #[test]
    fn handles_equal_ids() {
        let id = ConversationId::for_pair("self", "self");

        assert_eq!(id.as_str(), "self_self");
    }

    #[test]
    fn sorts_lexicographically_not_numerically() {
        let id = ConversationId::for_pair("10", "9");

        assert_eq!(id.as_str(), "10_9");
    }
}

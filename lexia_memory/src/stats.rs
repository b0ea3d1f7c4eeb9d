use lexia_core::{Role, estimate_tokens};

use crate::turn::ConversationTurn;

/// Statistics about conversation history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistoryStats {
    pub total_turns: usize,
    pub user_turns: usize,
    pub assistant_turns: usize,
    pub system_turns: usize,
    pub total_characters: usize,
    pub estimated_tokens: usize,
}

impl HistoryStats {
    pub fn from_turns<'a>(turns: impl IntoIterator<Item = &'a ConversationTurn>) -> Self {
        let mut stats = Self::default();
        for turn in turns {
            stats.total_turns += 1;
            match turn.role() {
                Role::User => stats.user_turns += 1,
                Role::Assistant | Role::Tool => stats.assistant_turns += 1,
                Role::System => stats.system_turns += 1,
            }
            stats.total_characters += turn.content().chars().count();
            stats.estimated_tokens += estimate_tokens(turn.content());
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_stats() {
        let turns: Vec<ConversationTurn> = (0..10)
            .map(|i| {
                if i % 2 == 0 {
                    ConversationTurn::user(format!("Message {i}: {}", "x".repeat(100)))
                } else {
                    ConversationTurn::assistant(format!("Message {i}: {}", "x".repeat(100)))
                }
            })
            .collect();

        let stats = HistoryStats::from_turns(&turns);

        assert_eq!(stats.total_turns, 10);
        assert_eq!(stats.user_turns, 5);
        assert_eq!(stats.assistant_turns, 5);
        assert_eq!(stats.system_turns, 0);
        assert!(stats.estimated_tokens > 0);
    }
}

//! Bounded turn history of one conversation thread.

use std::collections::VecDeque;

use crate::stats::HistoryStats;
use crate::turn::ConversationTurn;

/// A conversation thread with a fixed maximum length.
///
/// Turns keep their insertion order. Pushing past `max_turns` evicts from
/// the front until the length is back at the bound.
#[derive(Debug, Clone)]
pub struct ConversationThread {
    turns: VecDeque<ConversationTurn>,
    max_turns: usize,
}

impl ConversationThread {
    #[must_use]
    pub fn new(max_turns: usize) -> Self {
        Self {
            turns: VecDeque::with_capacity(max_turns.min(64)),
            max_turns,
        }
    }

    /// Append a turn, returning how many old turns were evicted.
    pub fn push(&mut self, turn: ConversationTurn) -> usize {
        self.turns.push_back(turn);

        let mut evicted = 0;
        while self.turns.len() > self.max_turns {
            self.turns.pop_front();
            evicted += 1;
        }
        evicted
    }

    /// Ordered copy of the current turns.
    #[must_use]
    pub fn turns(&self) -> Vec<ConversationTurn> {
        self.turns.iter().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    #[must_use]
    pub fn stats(&self) -> HistoryStats {
        HistoryStats::from_turns(self.turns.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversation_thread() {
        let mut thread = ConversationThread::new(10);

        assert!(thread.is_empty());

        thread.push(ConversationTurn::user("Hello"));
        thread.push(ConversationTurn::assistant("Hi there!"));

        assert_eq!(thread.len(), 2);
        assert!(!thread.is_empty());

        let stats = thread.stats();
        assert_eq!(stats.user_turns, 1);
        assert_eq!(stats.assistant_turns, 1);
    }

    #[test]
    fn push_evicts_from_front() {
        let mut thread = ConversationThread::new(2);

        assert_eq!(thread.push(ConversationTurn::user("1")), 0);
        assert_eq!(thread.push(ConversationTurn::user("2")), 0);
        assert_eq!(thread.push(ConversationTurn::user("3")), 1);

        let contents: Vec<_> = thread.turns().iter().map(|t| t.content().to_string()).collect();
        assert_eq!(contents, vec!["2", "3"]);
    }

    #[test]
    fn zero_bound_keeps_nothing() {
        let mut thread = ConversationThread::new(0);
        assert_eq!(thread.push(ConversationTurn::user("x")), 1);
        assert!(thread.is_empty());
    }

    #[test]
    fn clear_empties_thread() {
        let mut thread = ConversationThread::new(5);
        thread.push(ConversationTurn::user("x"));
        thread.clear();
        assert!(thread.is_empty());
        assert_eq!(thread.stats().total_turns, 0);
    }
}

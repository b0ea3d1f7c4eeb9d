//! Thread-keyed conversation store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tracing::debug;

use crate::stats::HistoryStats;
use crate::thread::ConversationThread;
use crate::turn::ConversationTurn;

/// Turns kept per thread unless configured otherwise.
pub const DEFAULT_MAX_HISTORY: usize = 10;

/// Bounded per-thread history.
///
/// All operations are total: unknown thread ids read as empty and clearing
/// an unknown id does nothing.
pub trait ConversationMemory: Send + Sync {
    /// Append a turn, evicting the oldest turns while the thread is over
    /// its bound. Creates the thread when absent.
    fn append(&self, thread_id: &str, turn: ConversationTurn);

    /// Ordered history of the thread, oldest first.
    fn get_history(&self, thread_id: &str) -> Vec<ConversationTurn>;

    /// Drop every turn of the thread.
    fn clear(&self, thread_id: &str);

    /// Ids of threads currently holding turns.
    fn thread_ids(&self) -> Vec<String>;

    fn thread_count(&self) -> usize {
        self.thread_ids().len()
    }

    fn max_history(&self) -> usize;

    /// Load `turns` into the thread only if it is currently empty.
    /// Returns whether anything was loaded.
    fn seed(&self, thread_id: &str, turns: Vec<ConversationTurn>) -> bool;

    fn stats(&self, thread_id: &str) -> HistoryStats {
        HistoryStats::from_turns(&self.get_history(thread_id))
    }
}

type SharedThread = Arc<Mutex<ConversationThread>>;

/// In-process store; lives as long as the value itself.
///
/// The map is guarded by a read-write lock and each thread by its own mutex,
/// so appends to one thread are serialized while different threads proceed
/// independently.
pub struct InMemoryConversationStore {
    max_history: usize,
    threads: RwLock<HashMap<String, SharedThread>>,
}

impl InMemoryConversationStore {
    #[must_use]
    pub fn new(max_history: usize) -> Self {
        Self {
            max_history,
            threads: RwLock::new(HashMap::new()),
        }
    }

    fn existing(&self, thread_id: &str) -> Option<SharedThread> {
        self.threads
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(thread_id)
            .cloned()
    }

    fn get_or_create(&self, thread_id: &str) -> SharedThread {
        if let Some(thread) = self.existing(thread_id) {
            return thread;
        }
        let mut threads = self.threads.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(threads.entry(thread_id.to_string()).or_insert_with(|| {
            debug!("Creating conversation thread: {thread_id}");
            Arc::new(Mutex::new(ConversationThread::new(self.max_history)))
        }))
    }
}

impl Default for InMemoryConversationStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HISTORY)
    }
}

impl ConversationMemory for InMemoryConversationStore {
    fn append(&self, thread_id: &str, turn: ConversationTurn) {
        let thread = self.get_or_create(thread_id);
        let mut thread = thread.lock().unwrap_or_else(PoisonError::into_inner);
        let evicted = thread.push(turn);
        if evicted > 0 {
            debug!(
                "Thread {thread_id}: evicted {evicted} turn(s), keeping {}",
                thread.len()
            );
        }
    }

    fn get_history(&self, thread_id: &str) -> Vec<ConversationTurn> {
        self.existing(thread_id).map_or_else(Vec::new, |thread| {
            thread
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .turns()
        })
    }

    fn clear(&self, thread_id: &str) {
        let removed = self
            .threads
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(thread_id);
        if let Some(thread) = removed {
            // Handlers still holding the thread see it empty.
            thread.lock().unwrap_or_else(PoisonError::into_inner).clear();
            debug!("Cleared conversation thread: {thread_id}");
        }
    }

    fn thread_ids(&self) -> Vec<String> {
        let threads: Vec<(String, SharedThread)> = self
            .threads
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(id, t)| (id.clone(), Arc::clone(t)))
            .collect();

        let mut ids: Vec<String> = threads
            .into_iter()
            .filter(|(_, t)| !t.lock().unwrap_or_else(PoisonError::into_inner).is_empty())
            .map(|(id, _)| id)
            .collect();
        ids.sort();
        ids
    }

    fn max_history(&self) -> usize {
        self.max_history
    }

    fn stats(&self, thread_id: &str) -> HistoryStats {
        self.existing(thread_id).map_or_else(HistoryStats::default, |thread| {
            thread.lock().unwrap_or_else(PoisonError::into_inner).stats()
        })
    }

    fn seed(&self, thread_id: &str, turns: Vec<ConversationTurn>) -> bool {
        if turns.is_empty() {
            return false;
        }
        let thread = self.get_or_create(thread_id);
        let mut thread = thread.lock().unwrap_or_else(PoisonError::into_inner);
        if !thread.is_empty() {
            return false;
        }
        let count = turns.len();
        for turn in turns {
            thread.push(turn);
        }
        debug!(
            "Seeded thread {thread_id} with {count} snapshot turn(s), keeping {}",
            thread.len()
        );
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lexia_core::Role;

    fn contents(turns: &[ConversationTurn]) -> Vec<&str> {
        turns.iter().map(ConversationTurn::content).collect()
    }

    #[test]
    fn append_then_read_in_order() {
        let store = InMemoryConversationStore::new(10);
        store.append("t1", ConversationTurn::user("a"));
        store.append("t1", ConversationTurn::assistant("b"));
        store.append("t1", ConversationTurn::user("c"));

        let history = store.get_history("t1");
        assert_eq!(contents(&history), vec!["a", "b", "c"]);
        assert_eq!(history[1].role(), Role::Assistant);
    }

    #[test]
    fn three_turns_with_bound_two() {
        let store = InMemoryConversationStore::new(2);
        store.append("t1", ConversationTurn::user("turn1"));
        store.append("t1", ConversationTurn::assistant("turn2"));
        store.append("t1", ConversationTurn::user("turn3"));

        assert_eq!(contents(&store.get_history("t1")), vec!["turn2", "turn3"]);
    }

    #[test]
    fn unknown_thread_is_empty() {
        let store = InMemoryConversationStore::default();
        assert!(store.get_history("unknown").is_empty());
        assert_eq!(store.thread_count(), 0);
    }

    #[test]
    fn clear_is_idempotent() {
        let store = InMemoryConversationStore::default();
        store.append("t1", ConversationTurn::user("a"));
        store.clear("t1");
        store.clear("t1");
        store.clear("never-seen");
        assert!(store.get_history("t1").is_empty());
        assert!(store.thread_ids().is_empty());
    }

    #[test]
    fn threads_are_independent() {
        let store = InMemoryConversationStore::new(1);
        store.append("a", ConversationTurn::user("a1"));
        store.append("b", ConversationTurn::user("b1"));
        store.append("a", ConversationTurn::user("a2"));

        assert_eq!(contents(&store.get_history("a")), vec!["a2"]);
        assert_eq!(contents(&store.get_history("b")), vec!["b1"]);
        assert_eq!(store.thread_ids(), vec!["a", "b"]);
        assert_eq!(store.thread_count(), 2);
    }

    #[test]
    fn seed_only_fills_empty_threads() {
        let store = InMemoryConversationStore::new(2);
        let snapshot = vec![
            ConversationTurn::untimed(Role::User, "s1"),
            ConversationTurn::untimed(Role::Assistant, "s2"),
            ConversationTurn::untimed(Role::User, "s3"),
        ];

        assert!(store.seed("t1", snapshot.clone()));
        assert_eq!(contents(&store.get_history("t1")), vec!["s2", "s3"]);

        assert!(!store.seed("t1", snapshot));
        assert!(!store.seed("t2", Vec::new()));
        assert!(store.get_history("t2").is_empty());
    }

    #[test]
    fn stats_follow_history() {
        let store = InMemoryConversationStore::default();
        store.append("t1", ConversationTurn::user("abcd"));
        store.append("t1", ConversationTurn::assistant("efgh"));

        let stats = store.stats("t1");
        assert_eq!(stats.total_turns, 2);
        assert_eq!(stats.total_characters, 8);
        assert_eq!(stats.estimated_tokens, 2);
        assert_eq!(store.stats("unknown"), HistoryStats::default());
    }
}

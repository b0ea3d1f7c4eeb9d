use std::sync::Arc;

use lexia_core::Role;
use lexia_memory::{ConversationMemory, ConversationTurn, InMemoryConversationStore};

fn contents(turns: &[ConversationTurn]) -> Vec<String> {
    turns.iter().map(|t| t.content().to_string()).collect()
}

#[test]
fn history_keeps_last_n_in_append_order() {
    for bound in [1_usize, 2, 3, 7] {
        for appended in [0_usize, 1, bound, bound + 1, bound * 3 + 2] {
            let store = InMemoryConversationStore::new(bound);
            let expected_all: Vec<String> = (0..appended).map(|i| format!("turn-{i}")).collect();

            for (i, content) in expected_all.iter().enumerate() {
                let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
                store.append("thread", ConversationTurn::new(role, content.clone()));
            }

            let history = store.get_history("thread");
            let keep = appended.min(bound);
            assert_eq!(history.len(), keep, "bound={bound} appended={appended}");
            assert_eq!(
                contents(&history),
                expected_all[appended - keep..].to_vec(),
                "bound={bound} appended={appended}"
            );
        }
    }
}

#[test]
fn clear_then_read_is_empty() {
    let store = InMemoryConversationStore::new(4);
    store.append("t1", ConversationTurn::user("hello"));
    store.append("t1", ConversationTurn::assistant("hi"));

    store.clear("t1");

    assert!(store.get_history("t1").is_empty());
    store.append("t1", ConversationTurn::user("again"));
    assert_eq!(contents(&store.get_history("t1")), vec!["again"]);
}

#[test]
fn trait_object_usage() {
    let store: Arc<dyn ConversationMemory> = Arc::new(InMemoryConversationStore::new(2));
    store.append("t1", ConversationTurn::user("a"));
    assert_eq!(store.max_history(), 2);
    assert_eq!(store.thread_count(), 1);
    assert!(store.get_history("unknown").is_empty());
}

#[test]
fn concurrent_appends_to_one_thread_lose_nothing() {
    let store = Arc::new(InMemoryConversationStore::new(1_000));
    let workers = 8;
    let per_worker = 100;

    std::thread::scope(|scope| {
        for w in 0..workers {
            let store = Arc::clone(&store);
            scope.spawn(move || {
                for i in 0..per_worker {
                    store.append("shared", ConversationTurn::user(format!("{w}-{i}")));
                }
            });
        }
    });

    let history = store.get_history("shared");
    assert_eq!(history.len(), workers * per_worker);

    // Each worker's own turns stay in the order it appended them.
    for w in 0..workers {
        let prefix = format!("{w}-");
        let mine: Vec<usize> = history
            .iter()
            .filter_map(|t| t.content().strip_prefix(&prefix))
            .filter_map(|i| i.parse().ok())
            .collect();
        assert_eq!(mine, (0..per_worker).collect::<Vec<_>>());
    }
}

#[test]
fn concurrent_appends_respect_bound() {
    let store = Arc::new(InMemoryConversationStore::new(5));

    std::thread::scope(|scope| {
        for w in 0..4 {
            let store = Arc::clone(&store);
            scope.spawn(move || {
                for i in 0..50 {
                    store.append(&format!("t{}", w % 2), ConversationTurn::user(i.to_string()));
                    assert!(store.get_history(&format!("t{}", w % 2)).len() <= 5);
                }
            });
        }
    });

    assert_eq!(store.get_history("t0").len(), 5);
    assert_eq!(store.get_history("t1").len(), 5);
}

#[test]
fn turns_round_trip_through_json() -> anyhow::Result<()> {
    let turn = ConversationTurn::user("persist me");
    let json = serde_json::to_string(&turn)?;
    let back: ConversationTurn = serde_json::from_str(&json)?;
    assert_eq!(back, turn);
    Ok(())
}

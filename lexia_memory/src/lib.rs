#![warn(
    clippy::all,
    clippy::nursery,
    clippy::pedantic,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::correctness,
    clippy::suspicious,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(
    clippy::similar_names,
    clippy::missing_safety_doc,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc
)]

//! Per-thread conversation memory.
//!
//! Each thread keeps a bounded, ordered list of turns. Appending past the
//! bound drops the oldest turns first, so the store always holds the most
//! recent `max_history` turns of every thread.
//!
//! # Key Features
//! - Strict FIFO truncation, no scoring or expiry
//! - Unknown thread ids read as empty history
//! - Per-thread locking for concurrent request handlers

mod stats;
mod store;
mod thread;
mod turn;

pub use stats::HistoryStats;
pub use store::{ConversationMemory, DEFAULT_MAX_HISTORY, InMemoryConversationStore};
pub use thread::ConversationThread;
pub use turn::ConversationTurn;

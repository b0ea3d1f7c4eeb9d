//! A single message within a thread.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use lexia_core::{ChatMessage, Role};

/// One message of a conversation. Immutable once created.
///
/// A turn's role is user, assistant or system. Tool output given to the
/// constructors is kept as assistant text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    role: Role,
    content: String,
    timestamp: Option<DateTime<Utc>>,
}

const fn stored_role(role: Role) -> Role {
    match role {
        Role::Tool => Role::Assistant,
        other => other,
    }
}

impl ConversationTurn {
    /// Create a turn stamped with the current time.
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role: stored_role(role),
            content: content.into(),
            timestamp: Some(Utc::now()),
        }
    }

    /// Create a turn without a timestamp, e.g. when replaying a snapshot.
    #[must_use]
    pub fn untimed(role: Role, content: impl Into<String>) -> Self {
        Self {
            role: stored_role(role),
            content: content.into(),
            timestamp: None,
        }
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    #[must_use]
    pub const fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }

    /// Provider message for this turn; the timestamp is not sent.
    #[must_use]
    pub fn to_chat_message(&self) -> ChatMessage {
        ChatMessage::new(self.role, self.content.as_str())
    }
}

impl From<&ConversationTurn> for ChatMessage {
    fn from(turn: &ConversationTurn) -> Self {
        turn.to_chat_message()
    }
}

//! System prompt and provider message assembly.

use crate::{ChatMessage, Role};

/// Default system prompt used when the request carries none.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant.";

fn non_blank(text: Option<&str>) -> Option<&str> {
    text.filter(|s| !s.trim().is_empty())
}

/// Combine the agent's system message with optional project context.
///
/// Blank values count as absent; anything else is used verbatim.
#[must_use]
pub fn format_system_prompt(system_message: Option<&str>, project_context: Option<&str>) -> String {
    let mut prompt = non_blank(system_message)
        .unwrap_or(DEFAULT_SYSTEM_PROMPT)
        .to_string();

    if let Some(project) = non_blank(project_context) {
        prompt.push_str("\n\nProject Context: ");
        prompt.push_str(project);
    }

    prompt
}

/// Build the provider message list: system prompt, prior turns, then the
/// current user message.
#[must_use]
pub fn format_messages(
    system_prompt: &str,
    history: &[ChatMessage],
    current_message: &str,
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage::system(system_prompt));
    messages.extend(history.iter().cloned());
    messages.push(ChatMessage::new(Role::User, current_message));
    messages
}

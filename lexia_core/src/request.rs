//! Inbound chat request as delivered by the Lexia platform.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{ChatMessage, Role};

/// Name of the variable carrying the provider key.
pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Variable {
    pub name: String,
    pub value: String,
}

/// Ordered name/value list sent along with each request.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Variables(Vec<Variable>);

impl Variables {
    #[must_use]
    pub const fn new(items: Vec<Variable>) -> Self {
        Self(items)
    }

    /// First non-empty value bound to `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|v| v.name == name && !v.value.trim().is_empty())
            .map(|v| v.value.as_str())
    }

    #[must_use]
    pub fn openai_api_key(&self) -> Option<&str> {
        self.get(OPENAI_API_KEY)
    }

    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.push(Variable {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.0.iter().map(|v| v.name.as_str()).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    Pdf,
    Image,
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub url: String,
    pub kind: AttachmentKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRequest {
    pub thread_id: String,
    pub message: String,
    #[serde(default = "Uuid::now_v7")]
    pub response_uuid: Uuid,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub system_message: Option<String>,
    #[serde(default)]
    pub project_system_message: Option<String>,
    #[serde(default)]
    pub variables: Variables,
    #[serde(default)]
    pub attachment: Option<Attachment>,
    #[serde(default)]
    pub force_tools: Vec<String>,
    /// Prior turns held by the platform, used to warm an empty thread.
    #[serde(default)]
    pub memory: Option<Vec<ChatMessage>>,
    #[serde(default)]
    pub stream_url: Option<String>,
    #[serde(default)]
    pub stream_token: Option<String>,
}

impl AgentRequest {
    #[must_use]
    pub fn new(thread_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
            message: message.into(),
            response_uuid: Uuid::now_v7(),
            model: None,
            system_message: None,
            project_system_message: None,
            variables: Variables::default(),
            attachment: None,
            force_tools: Vec::new(),
            memory: None,
            stream_url: None,
            stream_token: None,
        }
    }

    #[must_use]
    pub fn with_variables(mut self, variables: Variables) -> Self {
        self.variables = variables;
        self
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    #[must_use]
    pub fn with_system_message(mut self, system: impl Into<String>) -> Self {
        self.system_message = Some(system.into());
        self
    }

    #[must_use]
    pub fn with_attachment(mut self, url: impl Into<String>, kind: AttachmentKind) -> Self {
        self.attachment = Some(Attachment {
            url: url.into(),
            kind,
        });
        self
    }

    #[must_use]
    pub fn with_forced_tools(mut self, tools: Vec<String>) -> Self {
        self.force_tools = tools;
        self
    }

    #[must_use]
    pub fn with_memory(mut self, memory: Vec<ChatMessage>) -> Self {
        self.memory = Some(memory);
        self
    }

    /// Memory snapshot reduced to plain-text user/assistant/system turns.
    #[must_use]
    pub fn memory_turns(&self) -> Vec<(Role, String)> {
        self.memory
            .iter()
            .flatten()
            .filter(|m| m.role != Role::Tool)
            .map(|m| (m.role, m.content.text()))
            .collect()
    }

    /// Short preview of the message for log lines.
    #[must_use]
    pub fn preview(&self, max_chars: usize) -> String {
        let mut preview: String = self.message.chars().take(max_chars).collect();
        if self.message.chars().count() > max_chars {
            preview.push_str("...");
        }
        preview
    }
}

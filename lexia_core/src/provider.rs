//! AI provider contract.
//!
//! The provider is an opaque external service. The agent only needs the
//! streamed text deltas, tool-call fragments, usage, and for image
//! generation the resulting URL.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::request::Variables;
use crate::tools::ToolDefinition;
use crate::{ChatMessage, LLMResponse, Usage};

/// How the model may pick tools.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ToolChoice {
    #[default]
    Auto,
    None,
    Required,
    Function(String),
}

#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<ToolDefinition>,
    pub tool_choice: ToolChoice,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl ChatRequest {
    #[must_use]
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            tools: Vec::new(),
            tool_choice: ToolChoice::Auto,
            max_tokens: 1000,
            temperature: 0.7,
        }
    }

    #[must_use]
    pub fn with_tools(mut self, tools: Vec<ToolDefinition>, choice: ToolChoice) -> Self {
        self.tools = tools;
        self.tool_choice = choice;
        self
    }

    #[must_use]
    pub const fn with_sampling(mut self, max_tokens: u32, temperature: f32) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }
}

/// One event of a streamed chat completion.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    TextDelta(String),
    /// Fragment of a tool call; fragments sharing `index` belong together.
    ToolCallDelta {
        index: usize,
        id: Option<String>,
        name: Option<String>,
        arguments: String,
    },
    Usage(Usage),
}

pub type ChatStream = BoxStream<'static, anyhow::Result<StreamEvent>>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageSize {
    #[default]
    #[serde(rename = "1024x1024")]
    Square,
    #[serde(rename = "1792x1024")]
    Landscape,
    #[serde(rename = "1024x1792")]
    Portrait,
}

impl ImageSize {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Square => "1024x1024",
            Self::Landscape => "1792x1024",
            Self::Portrait => "1024x1792",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageQuality {
    #[default]
    Standard,
    Hd,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageStyle {
    #[default]
    Vivid,
    Natural,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRequest {
    pub prompt: String,
    #[serde(default)]
    pub size: ImageSize,
    #[serde(default)]
    pub quality: ImageQuality,
    #[serde(default)]
    pub style: ImageStyle,
}

#[async_trait]
pub trait LLMProvider: Send + Sync {
    async fn chat(&self, request: &ChatRequest) -> anyhow::Result<LLMResponse>;

    async fn chat_stream(&self, request: &ChatRequest) -> anyhow::Result<ChatStream>;

    /// Generate one image and return its URL.
    async fn generate_image(&self, request: &ImageRequest) -> anyhow::Result<String>;

    fn default_model(&self) -> &str;
}

/// A required credential was not supplied by the request or configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0} not found in variables")]
pub struct MissingCredential(pub String);

/// Produces the provider for one request.
///
/// Requests may carry their own credentials, so the provider is resolved per
/// request rather than held as a process-wide client.
pub trait ProviderResolver: Send + Sync {
    fn resolve(&self, variables: &Variables) -> anyhow::Result<Arc<dyn LLMProvider>>;
}

/// Resolver that always hands out the same provider.
pub struct StaticProviderResolver {
    provider: Arc<dyn LLMProvider>,
}

impl StaticProviderResolver {
    #[must_use]
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self { provider }
    }
}

impl ProviderResolver for StaticProviderResolver {
    fn resolve(&self, _variables: &Variables) -> anyhow::Result<Arc<dyn LLMProvider>> {
        Ok(Arc::clone(&self.provider))
    }
}

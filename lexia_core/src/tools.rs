//! Tool calling contract and registry.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::markers::LoadingKind;
use crate::provider::LLMProvider;

/// Tool definition advertised to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

impl ToolDefinition {
    /// OpenAI `tools` array entry.
    #[must_use]
    pub fn to_function_json(&self) -> serde_json::Value {
        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters,
            }
        })
    }
}

/// Result of tool execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolResult {
    pub content: String,
    pub is_error: bool,
    /// File produced by the tool, such as a generated image.
    pub file_url: Option<String>,
    pub duration_ms: Option<u128>,
}

impl ToolResult {
    pub fn success(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
            file_url: None,
            duration_ms: None,
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: true,
            file_url: None,
            duration_ms: None,
        }
    }

    #[must_use]
    pub fn with_file_url(mut self, url: impl Into<String>) -> Self {
        self.file_url = Some(url.into());
        self
    }
}

/// Per-request collaborators available to a tool.
#[derive(Clone)]
pub struct ToolContext {
    pub thread_id: String,
    pub provider: Arc<dyn LLMProvider>,
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn definition(&self) -> ToolDefinition;

    /// Loading indicator shown while the tool runs.
    fn loading_kind(&self) -> Option<LoadingKind> {
        None
    }

    async fn execute(&self, ctx: &ToolContext, input: serde_json::Value) -> ToolResult;
}

/// Tool registry
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Register a tool, replacing any earlier tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        info!("Registering tool: {}", tool.name());
        self.tools.retain(|t| t.name() != tool.name());
        self.tools.push(tool);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    #[must_use]
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    #[must_use]
    pub fn list(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name().to_string()).collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub async fn execute(
        &self,
        ctx: &ToolContext,
        name: &str,
        input: serde_json::Value,
    ) -> ToolResult {
        let Some(tool) = self.get(name) else {
            return ToolResult::error(format!("Unknown function: {name}"));
        };
        let started = Instant::now();
        let mut result = tool.execute(ctx, input).await;
        result.duration_ms = Some(started.elapsed().as_millis());
        result
    }
}

/// Helper to build JSON schema
#[must_use]
#[allow(clippy::needless_pass_by_value)]
pub fn schema_object(properties: serde_json::Value, required: &[&str]) -> serde_json::Value {
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ChatRequest, ChatStream, ImageRequest, LLMResponse};

    struct NoopProvider;

    #[async_trait]
    impl LLMProvider for NoopProvider {
        async fn chat(&self, _request: &ChatRequest) -> anyhow::Result<LLMResponse> {
            anyhow::bail!("unused")
        }

        async fn chat_stream(&self, _request: &ChatRequest) -> anyhow::Result<ChatStream> {
            anyhow::bail!("unused")
        }

        async fn generate_image(&self, _request: &ImageRequest) -> anyhow::Result<String> {
            anyhow::bail!("unused")
        }

        fn default_model(&self) -> &'static str {
            "noop"
        }
    }

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &'static str {
            "echo"
        }

        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: "echo".to_string(),
                description: "Echo the text argument".to_string(),
                parameters: schema_object(json!({"text": {"type": "string"}}), &["text"]),
            }
        }

        async fn execute(&self, _ctx: &ToolContext, input: serde_json::Value) -> ToolResult {
            input["text"].as_str().map_or_else(
                || ToolResult::error("Missing required parameter: text"),
                ToolResult::success,
            )
        }
    }

    fn ctx() -> ToolContext {
        ToolContext {
            thread_id: "t1".to_string(),
            provider: Arc::new(NoopProvider),
        }
    }

    #[tokio::test]
    async fn executes_registered_tool() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));

        let result = registry.execute(&ctx(), "echo", json!({"text": "hi"})).await;
        assert_eq!(result.content, "hi");
        assert!(!result.is_error);
        assert!(result.duration_ms.is_some());
    }

    #[tokio::test]
    async fn unknown_tool_is_an_error_result() {
        let registry = ToolRegistry::new();
        let result = registry.execute(&ctx(), "nope", json!({})).await;
        assert!(result.is_error);
        assert_eq!(result.content, "Unknown function: nope");
    }

    #[test]
    fn register_replaces_same_name() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        registry.register(Arc::new(EchoTool));
        assert_eq!(registry.list(), vec!["echo"]);
    }

    #[test]
    fn function_json_shape() {
        let def = EchoTool.definition();
        let value = def.to_function_json();
        assert_eq!(value["type"], "function");
        assert_eq!(value["function"]["name"], "echo");
        assert_eq!(value["function"]["parameters"]["required"][0], "text");
    }
}

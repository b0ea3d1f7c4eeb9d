//! Request handler: memory, prompt assembly, streaming and tool execution.

use std::sync::Arc;

use futures::StreamExt;
use lexia_config::AgentDefaults;
use lexia_core::markers::{loading_end, loading_start, strip_loading_markers};
use lexia_core::prompt::{format_messages, format_system_prompt};
use lexia_core::{
    AgentRequest, ChatMessage, ChatRequest, Completion, LLMProvider, MessageContent,
    MissingCredential, ProviderResolver, ResponseSink, StreamEvent, ToolCall, ToolChoice,
    ToolContext, ToolDefinition, ToolRegistry, Usage,
};
use lexia_memory::{ConversationMemory, ConversationTurn};
use lexia_tools::AttachmentLoader;
use tracing::{debug, error, info, warn};

use crate::accumulator::ToolCallAccumulator;
use crate::error::AgentError;

/// Defaults applied when a request leaves a setting out.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentConfig {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub system_prompt: Option<String>,
    pub project_system_message: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self::from_defaults(&AgentDefaults::default())
    }
}

impl AgentConfig {
    #[must_use]
    pub fn from_defaults(defaults: &AgentDefaults) -> Self {
        Self {
            model: defaults.model.clone(),
            max_tokens: defaults.max_tokens,
            temperature: defaults.temperature,
            system_prompt: defaults.system_prompt.clone(),
            project_system_message: defaults.project_system_message.clone(),
        }
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

/// What a successful request produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    /// Full streamed response, markers included.
    pub text: String,
    pub usage: Option<Usage>,
    pub file_url: Option<String>,
    pub tool_calls: usize,
}

/// Output of one executed tool call.
struct ToolOutput {
    streamed: String,
    file_url: Option<String>,
}

pub struct Agent {
    resolver: Arc<dyn ProviderResolver>,
    memory: Arc<dyn ConversationMemory>,
    tools: Arc<ToolRegistry>,
    attachments: Option<Arc<AttachmentLoader>>,
    config: AgentConfig,
}

impl Agent {
    pub fn new(
        resolver: Arc<dyn ProviderResolver>,
        memory: Arc<dyn ConversationMemory>,
        tools: Arc<ToolRegistry>,
        config: AgentConfig,
    ) -> Self {
        info!(
            "Creating agent: model={}, tools={:?}, history={}",
            config.model,
            tools.list(),
            memory.max_history()
        );
        Self {
            resolver,
            memory,
            tools,
            attachments: None,
            config,
        }
    }

    #[must_use]
    pub fn with_attachments(mut self, loader: Arc<AttachmentLoader>) -> Self {
        self.attachments = Some(loader);
        self
    }

    #[must_use]
    pub fn memory(&self) -> &Arc<dyn ConversationMemory> {
        &self.memory
    }

    #[must_use]
    pub const fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Answer one request, streaming to `sink`.
    ///
    /// Never fails: errors are logged and reported through
    /// [`ResponseSink::send_error`], and `None` is returned.
    pub async fn process_message(
        &self,
        request: &AgentRequest,
        sink: &dyn ResponseSink,
    ) -> Option<TurnOutcome> {
        info!(
            "Processing message for thread {} (response {}): {}",
            request.thread_id,
            request.response_uuid,
            request.preview(100)
        );

        match self.handle(request, sink).await {
            Ok(outcome) => {
                info!(
                    "Message processing completed for thread {}",
                    request.thread_id
                );
                Some(outcome)
            }
            Err(e) => {
                error!("Failed to process message for thread {}: {e}", request.thread_id);
                if let Err(sink_err) = sink.send_error(&e.client_message()).await {
                    warn!("Could not report error to client: {sink_err}");
                }
                None
            }
        }
    }

    /// The request pipeline, with errors surfaced to the caller.
    pub async fn handle(
        &self,
        request: &AgentRequest,
        sink: &dyn ResponseSink,
    ) -> Result<TurnOutcome, AgentError> {
        let provider = self.resolve_provider(request)?;
        let thread_id = request.thread_id.as_str();

        self.seed_memory(request);
        let history: Vec<ChatMessage> = self
            .memory
            .get_history(thread_id)
            .iter()
            .map(ConversationTurn::to_chat_message)
            .collect();
        self.memory
            .append(thread_id, ConversationTurn::user(request.message.as_str()));
        debug!("Thread {thread_id}: {} prior turn(s) in context", history.len());

        let system_prompt = format_system_prompt(
            request
                .system_message
                .as_deref()
                .or(self.config.system_prompt.as_deref()),
            request
                .project_system_message
                .as_deref()
                .or(self.config.project_system_message.as_deref()),
        );
        let mut messages = format_messages(&system_prompt, &history, &request.message);
        if let Some(content) = self.attachment_content(request).await {
            if let Some(last) = messages.last_mut() {
                last.content = content;
            }
        }

        let (tools, tool_choice) = self.select_tools(request);
        let model = request
            .model
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(self.config.model.as_str())
            .to_string();
        info!(
            "Sending to model {model}: {} message(s), tool choice {tool_choice:?}",
            messages.len()
        );

        let chat = ChatRequest::new(model, messages)
            .with_tools(tools, tool_choice)
            .with_sampling(self.config.max_tokens, self.config.temperature);

        let mut stream = provider.chat_stream(&chat).await?;
        let mut text = String::new();
        let mut calls = ToolCallAccumulator::new();
        let mut usage = None;

        while let Some(event) = stream.next().await {
            match event? {
                StreamEvent::TextDelta(delta) => {
                    sink.send(&delta).await.map_err(AgentError::Sink)?;
                    text.push_str(&delta);
                }
                StreamEvent::ToolCallDelta {
                    index,
                    id,
                    name,
                    arguments,
                } => calls.push(index, id, name, &arguments),
                StreamEvent::Usage(u) => {
                    debug!("Usage info captured: {u:?}");
                    usage = Some(u);
                }
            }
        }
        info!("Model response complete. Length: {} characters", text.len());

        let tool_calls = calls.finish();
        let mut file_url: Option<String> = None;
        if !tool_calls.is_empty() {
            info!("Processing {} function call(s)", tool_calls.len());
            let ctx = ToolContext {
                thread_id: thread_id.to_string(),
                provider: Arc::clone(&provider),
            };
            for call in &tool_calls {
                let output = self.run_tool(&ctx, call, sink).await?;
                text.push_str(&output.streamed);
                if file_url.is_none() {
                    file_url = output.file_url;
                }
            }
        }

        if text.trim().is_empty() {
            warn!("Empty response for thread {thread_id}");
        }

        self.memory.append(
            thread_id,
            ConversationTurn::assistant(strip_loading_markers(&text)),
        );

        sink.close(Completion {
            text: text.clone(),
            usage,
            file_url: file_url.clone(),
        })
        .await
        .map_err(AgentError::Sink)?;

        Ok(TurnOutcome {
            text,
            usage,
            file_url,
            tool_calls: tool_calls.len(),
        })
    }

    fn resolve_provider(&self, request: &AgentRequest) -> Result<Arc<dyn LLMProvider>, AgentError> {
        self.resolver
            .resolve(&request.variables)
            .map_err(|e| match e.downcast::<MissingCredential>() {
                Ok(_) => AgentError::ConfigurationMissing("OpenAI API key".to_string()),
                Err(e) => AgentError::Upstream(e),
            })
    }

    /// Load the request's memory snapshot into an empty thread.
    fn seed_memory(&self, request: &AgentRequest) {
        let turns: Vec<ConversationTurn> = request
            .memory_turns()
            .into_iter()
            .map(|(role, content)| ConversationTurn::untimed(role, content))
            .collect();
        if turns.is_empty() {
            return;
        }
        if self.memory.seed(&request.thread_id, turns) {
            debug!("Seeded thread {} from request memory", request.thread_id);
        }
    }

    /// Content replacing the current user message, if an attachment applies.
    /// Failures are logged and the plain message is kept.
    async fn attachment_content(&self, request: &AgentRequest) -> Option<MessageContent> {
        let attachment = request.attachment.as_ref()?;
        let Some(loader) = &self.attachments else {
            warn!(
                "Ignoring {:?} attachment: no attachment loader configured",
                attachment.kind
            );
            return None;
        };

        match loader.apply(attachment, &request.message).await {
            Ok(content) => Some(content),
            Err(e) => {
                warn!("Error processing {:?} attachment: {e:#}", attachment.kind);
                None
            }
        }
    }

    /// Tool definitions and choice mode for this request.
    fn select_tools(&self, request: &AgentRequest) -> (Vec<ToolDefinition>, ToolChoice) {
        if self.tools.is_empty() {
            return (Vec::new(), ToolChoice::Auto);
        }

        let mut forced: Vec<&str> = Vec::new();
        for name in &request.force_tools {
            if !self.tools.contains(name) {
                warn!("Ignoring unknown forced tool: {name}");
            } else if !forced.contains(&name.as_str()) {
                forced.push(name);
            }
        }

        let definitions = |names: &[&str]| -> Vec<ToolDefinition> {
            self.tools
                .definitions()
                .into_iter()
                .filter(|d| names.contains(&d.name.as_str()))
                .collect()
        };

        match forced.as_slice() {
            [] => (self.tools.definitions(), ToolChoice::Auto),
            [only] => (definitions(forced.as_slice()), ToolChoice::Function((*only).to_string())),
            _ => (definitions(forced.as_slice()), ToolChoice::Required),
        }
    }

    async fn run_tool(
        &self,
        ctx: &ToolContext,
        call: &ToolCall,
        sink: &dyn ResponseSink,
    ) -> Result<ToolOutput, AgentError> {
        info!("Processing function: {}", call.name);
        let mut streamed = String::new();

        let input = match parse_arguments(call) {
            Ok(input) => input,
            Err(e) => {
                warn!("{e}");
                let line = format!("\n\n**Function Execution Error:** {e}");
                sink.send(&line).await.map_err(AgentError::Sink)?;
                streamed.push_str(&line);
                return Ok(ToolOutput {
                    streamed,
                    file_url: None,
                });
            }
        };

        let loading = self.tools.get(&call.name).and_then(|t| t.loading_kind());
        if let Some(kind) = loading {
            let marker = loading_start(kind);
            sink.send(&marker).await.map_err(AgentError::Sink)?;
            streamed.push_str(&marker);
        }

        let result = self.tools.execute(ctx, &call.name, input).await;

        if let Some(kind) = loading {
            let marker = loading_end(kind);
            sink.send(&marker).await.map_err(AgentError::Sink)?;
            streamed.push_str(&marker);
        }

        let piece = if result.is_error {
            error!("Error executing function {}: {}", call.name, result.content);
            format!(
                "\n\n**Function Execution Error:** Error executing function {}: {}",
                call.name, result.content
            )
        } else {
            info!(
                "Function {} completed in {}ms",
                call.name,
                result.duration_ms.unwrap_or_default()
            );
            format!("\n\n{}", result.content)
        };
        sink.send(&piece).await.map_err(AgentError::Sink)?;
        streamed.push_str(&piece);

        Ok(ToolOutput {
            streamed,
            file_url: result.file_url,
        })
    }
}

/// Parse the model's raw argument string; an empty string means no
/// arguments.
fn parse_arguments(call: &ToolCall) -> Result<serde_json::Value, AgentError> {
    if call.arguments.trim().is_empty() {
        return Ok(serde_json::Value::Object(serde_json::Map::new()));
    }
    serde_json::from_str(&call.arguments).map_err(|e| AgentError::InvalidToolCall {
        name: call.name.clone(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(arguments: &str) -> ToolCall {
        ToolCall {
            id: "c1".to_string(),
            name: "generate_image".to_string(),
            arguments: arguments.to_string(),
        }
    }

    #[test]
    fn empty_arguments_are_an_empty_object() -> anyhow::Result<()> {
        assert_eq!(parse_arguments(&call("  "))?, serde_json::json!({}));
        Ok(())
    }

    #[test]
    fn malformed_arguments_are_invalid_tool_calls() {
        let err = parse_arguments(&call("{\"prompt\":")).err();
        assert!(matches!(err, Some(AgentError::InvalidToolCall { .. })));
    }

    #[test]
    fn config_defaults_follow_agent_defaults() {
        let config = AgentConfig::default();
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.max_tokens, 1000);
        assert!(config.system_prompt.is_none());
    }
}

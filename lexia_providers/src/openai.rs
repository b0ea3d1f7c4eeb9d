use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use lexia_config::ProviderConfig;
use lexia_core::request::OPENAI_API_KEY;
use lexia_core::{
    ChatRequest, ChatStream, ImageRequest, LLMProvider, LLMResponse, MissingCredential,
    ProviderResolver, StreamEvent, ToolCall, ToolChoice, ToolDefinition, Usage, Variables,
};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::retry::{RetryPolicy, retry_when};
use crate::sse::{LineBuffer, SseData, parse_sse_data};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const IMAGE_MODEL: &str = "dall-e-3";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const CHAT_PATH: &str = "/chat/completions";
const IMAGES_PATH: &str = "/images/generations";

pub struct OpenAIProvider {
    client: Client,
    api_key: String,
    base_url: String,
    retry: RetryPolicy,
}

impl OpenAIProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        info!("Creating OpenAIProvider");
        Self::with_client(Client::new(), api_key)
    }

    /// Share an existing HTTP client (and its timeout settings).
    pub fn with_client(client: Client, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            retry: RetryPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn post(&self, path: &str, body: &Value) -> anyhow::Result<reqwest::Response> {
        let response = self
            .client
            .post(format!("{}{path}", self.base_url))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?
            .error_for_status()?;
        Ok(response)
    }

    /// Helper method to send a single request
    async fn try_send(&self, body: &Value) -> anyhow::Result<LLMResponse> {
        let response = self
            .post(CHAT_PATH, body)
            .await?
            .json::<CompletionResponse>()
            .await?;
        response.into_llm_response()
    }

    async fn try_image(&self, body: &Value) -> anyhow::Result<String> {
        let response = self.post(IMAGES_PATH, body).await?.json::<Value>().await?;
        response["data"][0]["url"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("Invalid response format: missing image url"))
    }
}

#[async_trait]
impl LLMProvider for OpenAIProvider {
    async fn chat(&self, request: &ChatRequest) -> anyhow::Result<LLMResponse> {
        let body = chat_body(request, false);
        info!("Sending request to OpenAI API: model={}", request.model);

        let response = retry_when(|| self.try_send(&body), &self.retry, is_retryable).await?;

        info!("Received response from OpenAI API");
        Ok(response)
    }

    async fn chat_stream(&self, request: &ChatRequest) -> anyhow::Result<ChatStream> {
        let body = chat_body(request, true);
        info!(
            "Opening stream to OpenAI API: model={}, tools={}",
            request.model,
            request.tools.len()
        );

        let response = retry_when(|| self.post(CHAT_PATH, &body), &self.retry, is_retryable).await?;
        let byte_stream = response.bytes_stream();

        let stream = async_stream::stream! {
            let mut lines = LineBuffer::new();
            let mut done = false;
            futures::pin_mut!(byte_stream);

            while !done {
                let Some(chunk) = byte_stream.next().await else {
                    break;
                };
                let chunk = match chunk {
                    Ok(c) => c,
                    Err(e) => {
                        yield Err(anyhow::Error::from(e));
                        done = true;
                        break;
                    }
                };

                for line in lines.push(&chunk) {
                    match parse_sse_data(&line) {
                        Some(SseData::Done) => {
                            done = true;
                            break;
                        }
                        Some(SseData::Json(data)) => {
                            for event in parse_stream_chunk(data) {
                                yield Ok(event);
                            }
                        }
                        None => {}
                    }
                }
            }

            if !done {
                if let Some(line) = lines.finish() {
                    if let Some(SseData::Json(data)) = parse_sse_data(&line) {
                        for event in parse_stream_chunk(data) {
                            yield Ok(event);
                        }
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }

    async fn generate_image(&self, request: &ImageRequest) -> anyhow::Result<String> {
        let body = json!({
            "model": IMAGE_MODEL,
            "prompt": request.prompt,
            "size": request.size,
            "quality": request.quality,
            "style": request.style,
            "n": 1,
        });

        info!(
            "Generating image: size={}, quality={:?}, style={:?}",
            request.size.as_str(),
            request.quality,
            request.style
        );

        let url = retry_when(|| self.try_image(&body), &self.retry, is_retryable).await?;
        debug!("Image generated: {url}");
        Ok(url)
    }

    fn default_model(&self) -> &str {
        DEFAULT_MODEL
    }
}

/// Transport failures, rate limits and server errors are worth retrying;
/// other client errors and malformed bodies are not.
fn is_retryable(err: &anyhow::Error) -> bool {
    err.downcast_ref::<reqwest::Error>().is_some_and(|e| {
        !e.is_decode()
            && e.status().is_none_or(|status| {
                status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
            })
    })
}

/// JSON body for `POST /chat/completions`.
#[must_use]
pub fn chat_body(request: &ChatRequest, stream: bool) -> Value {
    let mut body = json!({
        "model": request.model,
        "messages": request.messages,
        "max_tokens": request.max_tokens,
        "temperature": round_temperature(request.temperature),
    });

    if !request.tools.is_empty() {
        body["tools"] = Value::Array(
            request
                .tools
                .iter()
                .map(ToolDefinition::to_function_json)
                .collect(),
        );
        body["tool_choice"] = tool_choice_json(&request.tool_choice);
    }

    if stream {
        body["stream"] = json!(true);
        body["stream_options"] = json!({ "include_usage": true });
    }

    body
}

fn round_temperature(temperature: f32) -> f64 {
    (f64::from(temperature) * 100.0).round() / 100.0
}

fn tool_choice_json(choice: &ToolChoice) -> Value {
    match choice {
        ToolChoice::Auto => json!("auto"),
        ToolChoice::None => json!("none"),
        ToolChoice::Required => json!("required"),
        ToolChoice::Function(name) => json!({
            "type": "function",
            "function": { "name": name },
        }),
    }
}

/// Events carried by one streamed `chat.completion.chunk`. Unparseable
/// chunks are logged and skipped.
#[must_use]
pub fn parse_stream_chunk(data: &str) -> Vec<StreamEvent> {
    let chunk: StreamChunk = match serde_json::from_str(data) {
        Ok(chunk) => chunk,
        Err(e) => {
            warn!("Skipping unparseable stream chunk: {e}");
            return Vec::new();
        }
    };

    let mut events = Vec::new();
    for choice in chunk.choices.unwrap_or_default() {
        let Some(delta) = choice.delta else {
            continue;
        };
        if let Some(text) = delta.content.filter(|t| !t.is_empty()) {
            events.push(StreamEvent::TextDelta(text));
        }
        for call in delta.tool_calls.unwrap_or_default() {
            let (name, arguments) = call
                .function
                .map_or((None, String::new()), |f| {
                    (f.name, f.arguments.unwrap_or_default())
                });
            events.push(StreamEvent::ToolCallDelta {
                index: call.index,
                id: call.id,
                name,
                arguments,
            });
        }
    }

    if let Some(usage) = chunk.usage {
        events.push(StreamEvent::Usage(usage.into()));
    }

    events
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

impl From<WireUsage> for Usage {
    fn from(u: WireUsage) -> Self {
        Self {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Option<Vec<CompletionChoice>>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Debug, Deserialize)]
struct WireToolCall {
    id: String,
    function: WireFunction,
}

#[derive(Debug, Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

impl CompletionResponse {
    fn into_llm_response(self) -> anyhow::Result<LLMResponse> {
        let message = self
            .choices
            .and_then(|choices| choices.into_iter().next())
            .map(|choice| choice.message)
            .ok_or_else(|| anyhow::anyhow!("Invalid response format: missing choices"))?;

        let tool_calls: Vec<ToolCall> = message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|call| ToolCall {
                id: call.id,
                name: call.function.name,
                arguments: call.function.arguments,
            })
            .collect();

        let content = match message.content {
            Some(content) => content,
            None if !tool_calls.is_empty() => String::new(),
            None => anyhow::bail!("Invalid response format: missing content"),
        };

        Ok(LLMResponse {
            content,
            tool_calls,
            usage: self.usage.map(Usage::from),
        })
    }
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Option<Vec<StreamChoice>>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Option<StreamDelta>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCallChunk>>,
}

#[derive(Debug, Deserialize)]
struct ToolCallChunk {
    #[serde(default)]
    index: usize,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<FunctionChunk>,
}

#[derive(Debug, Deserialize)]
struct FunctionChunk {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

/// Builds an [`OpenAIProvider`] per request.
///
/// The request's `OPENAI_API_KEY` variable wins; otherwise the configured
/// key is used.
pub struct OpenAIProviderResolver {
    client: Client,
    fallback_key: Option<String>,
    base_url: String,
    retry: RetryPolicy,
}

impl OpenAIProviderResolver {
    pub fn new(fallback_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            fallback_key: fallback_key.filter(|k| !k.trim().is_empty()),
            base_url: DEFAULT_BASE_URL.to_string(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn from_config(config: &ProviderConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            ..Self::new(config.api_key.clone())
        }
        .with_base_url(config.base_url.clone()))
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

impl ProviderResolver for OpenAIProviderResolver {
    fn resolve(&self, variables: &Variables) -> anyhow::Result<Arc<dyn LLMProvider>> {
        let api_key = match variables.openai_api_key() {
            Some(key) => key.to_string(),
            None => {
                debug!("No {OPENAI_API_KEY} in request variables, using configured key");
                self.fallback_key
                    .clone()
                    .ok_or_else(|| MissingCredential(OPENAI_API_KEY.to_string()))?
            }
        };

        Ok(Arc::new(
            OpenAIProvider::with_client(self.client.clone(), api_key)
                .with_base_url(self.base_url.clone())
                .with_retry(self.retry.clone()),
        ))
    }
}

//! Production transport: publish response events to the pub/sub relay.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use lexia_config::StreamingConfig;
use lexia_core::{AgentRequest, Completion, ResponseSink, SinkFactory};
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

pub const API_KEY_HEADER: &str = "X-API-Key";

/// Event payload published on the response channel.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelayEvent<'a> {
    Chunk {
        response_uuid: Uuid,
        text: &'a str,
    },
    Complete {
        response_uuid: Uuid,
        #[serde(flatten)]
        completion: &'a Completion,
    },
    Error {
        response_uuid: Uuid,
        message: &'a str,
    },
}

#[derive(Serialize)]
struct PublishBody<'a> {
    channel: &'a str,
    data: RelayEvent<'a>,
}

pub struct RelaySink {
    client: Client,
    publish_url: String,
    api_key: Option<String>,
    channel: String,
    response_uuid: Uuid,
    finished: AtomicBool,
}

impl RelaySink {
    #[must_use]
    pub fn channel(&self) -> &str {
        &self.channel
    }

    async fn publish(&self, event: RelayEvent<'_>) -> anyhow::Result<()> {
        let body = PublishBody {
            channel: &self.channel,
            data: event,
        };

        let mut request = self.client.post(&self.publish_url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.header(API_KEY_HEADER, key);
        }

        request.send().await?.error_for_status()?;
        Ok(())
    }

    fn finish(&self) -> bool {
        !self.finished.swap(true, Ordering::SeqCst)
    }
}

#[async_trait]
impl ResponseSink for RelaySink {
    async fn send(&self, chunk: &str) -> anyhow::Result<()> {
        if self.finished.load(Ordering::SeqCst) {
            debug!("Dropping chunk for finished response {}", self.response_uuid);
            return Ok(());
        }
        self.publish(RelayEvent::Chunk {
            response_uuid: self.response_uuid,
            text: chunk,
        })
        .await
    }

    async fn close(&self, completion: Completion) -> anyhow::Result<()> {
        if !self.finish() {
            return Ok(());
        }
        debug!(
            "Publishing completion for {} on {} ({} chars)",
            self.response_uuid,
            self.channel,
            completion.text.len()
        );
        self.publish(RelayEvent::Complete {
            response_uuid: self.response_uuid,
            completion: &completion,
        })
        .await
    }

    async fn send_error(&self, message: &str) -> anyhow::Result<()> {
        if !self.finish() {
            return Ok(());
        }
        warn!("Publishing error for {}: {message}", self.response_uuid);
        self.publish(RelayEvent::Error {
            response_uuid: self.response_uuid,
            message,
        })
        .await
    }
}

/// Opens a [`RelaySink`] per request.
///
/// The channel is the request's `stream_url` hint when present, otherwise its
/// thread id. The request's `stream_token` overrides the configured key.
#[derive(Clone)]
pub struct RelaySinkFactory {
    client: Client,
    publish_url: String,
    api_key: Option<String>,
}

impl RelaySinkFactory {
    pub fn new(publish_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            publish_url: publish_url.into(),
            api_key,
        }
    }

    pub fn from_config(config: &StreamingConfig) -> anyhow::Result<Self> {
        let publish_url = config
            .relay_url
            .clone()
            .ok_or_else(|| anyhow::anyhow!("Relay streaming requires \"streaming.relay_url\""))?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            publish_url,
            api_key: config.relay_api_key.clone(),
        })
    }

    /// Concrete sink for `request`.
    #[must_use]
    pub fn open_relay(&self, request: &AgentRequest) -> RelaySink {
        let channel = request
            .stream_url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(request.thread_id.as_str())
            .to_string();
        let api_key = request
            .stream_token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| self.api_key.clone());

        RelaySink {
            client: self.client.clone(),
            publish_url: self.publish_url.clone(),
            api_key,
            channel,
            response_uuid: request.response_uuid,
            finished: AtomicBool::new(false),
        }
    }
}

impl SinkFactory for RelaySinkFactory {
    fn open(&self, request: &AgentRequest) -> Box<dyn ResponseSink> {
        Box::new(self.open_relay(request))
    }
}

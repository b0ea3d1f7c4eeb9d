//! Destinations for streamed response output.
//!
//! A sink receives incremental chunks, then exactly one terminal signal:
//! `close` with the completed response or `send_error`. Chunks sent after
//! the terminal signal are dropped.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::Usage;
use crate::request::AgentRequest;

/// Final payload of a successful response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completion {
    pub text: String,
    pub usage: Option<Usage>,
    /// File produced while answering, e.g. a generated image.
    pub file_url: Option<String>,
}

#[async_trait]
pub trait ResponseSink: Send + Sync {
    async fn send(&self, chunk: &str) -> anyhow::Result<()>;

    async fn close(&self, completion: Completion) -> anyhow::Result<()>;

    async fn send_error(&self, message: &str) -> anyhow::Result<()>;
}

/// Opens a sink for each request; the implementation is picked once at
/// startup.
pub trait SinkFactory: Send + Sync {
    fn open(&self, request: &AgentRequest) -> Box<dyn ResponseSink>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    Chunk {
        response_uuid: Uuid,
        text: String,
    },
    Complete {
        response_uuid: Uuid,
        completion: Completion,
    },
    Error {
        response_uuid: Uuid,
        message: String,
    },
}

impl SinkEvent {
    #[must_use]
    pub const fn response_uuid(&self) -> Uuid {
        match self {
            Self::Chunk { response_uuid, .. }
            | Self::Complete { response_uuid, .. }
            | Self::Error { response_uuid, .. } => *response_uuid,
        }
    }
}

/// In-process sink used for direct (development) streaming.
pub struct ChannelSink {
    response_uuid: Uuid,
    tx: mpsc::UnboundedSender<SinkEvent>,
    finished: AtomicBool,
}

impl ChannelSink {
    #[must_use]
    pub const fn new(response_uuid: Uuid, tx: mpsc::UnboundedSender<SinkEvent>) -> Self {
        Self {
            response_uuid,
            tx,
            finished: AtomicBool::new(false),
        }
    }

    /// Sink plus the receiving end of its event channel.
    #[must_use]
    pub fn channel(response_uuid: Uuid) -> (Self, mpsc::UnboundedReceiver<SinkEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(response_uuid, tx), rx)
    }

    fn push(&self, event: SinkEvent) -> anyhow::Result<()> {
        self.tx
            .send(event)
            .map_err(|_| anyhow::anyhow!("stream consumer for {} went away", self.response_uuid))
    }

    fn finish(&self) -> bool {
        !self.finished.swap(true, Ordering::SeqCst)
    }
}

#[async_trait]
impl ResponseSink for ChannelSink {
    async fn send(&self, chunk: &str) -> anyhow::Result<()> {
        if self.finished.load(Ordering::SeqCst) {
            debug!("Dropping chunk for finished response {}", self.response_uuid);
            return Ok(());
        }
        self.push(SinkEvent::Chunk {
            response_uuid: self.response_uuid,
            text: chunk.to_string(),
        })
    }

    async fn close(&self, completion: Completion) -> anyhow::Result<()> {
        if !self.finish() {
            return Ok(());
        }
        self.push(SinkEvent::Complete {
            response_uuid: self.response_uuid,
            completion,
        })
    }

    async fn send_error(&self, message: &str) -> anyhow::Result<()> {
        if !self.finish() {
            return Ok(());
        }
        self.push(SinkEvent::Error {
            response_uuid: self.response_uuid,
            message: message.to_string(),
        })
    }
}

/// Hands out [`ChannelSink`]s that all feed one consumer.
#[derive(Clone)]
pub struct DirectSinkFactory {
    tx: mpsc::UnboundedSender<SinkEvent>,
}

impl DirectSinkFactory {
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SinkEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl SinkFactory for DirectSinkFactory {
    fn open(&self, request: &AgentRequest) -> Box<dyn ResponseSink> {
        Box::new(ChannelSink::new(request.response_uuid, self.tx.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn chunks_then_completion() -> anyhow::Result<()> {
        let id = Uuid::now_v7();
        let (sink, mut rx) = ChannelSink::channel(id);

        sink.send("Hel").await?;
        sink.send("lo").await?;
        sink.close(Completion {
            text: "Hello".to_string(),
            ..Completion::default()
        })
        .await?;

        assert_eq!(
            rx.recv().await,
            Some(SinkEvent::Chunk {
                response_uuid: id,
                text: "Hel".to_string()
            })
        );
        assert!(matches!(rx.recv().await, Some(SinkEvent::Chunk { .. })));
        assert!(matches!(
            rx.recv().await,
            Some(SinkEvent::Complete { completion, .. }) if completion.text == "Hello"
        ));
        Ok(())
    }

    #[tokio::test]
    async fn nothing_after_terminal_signal() -> anyhow::Result<()> {
        let (sink, mut rx) = ChannelSink::channel(Uuid::now_v7());

        sink.send_error("boom").await?;
        sink.send("late").await?;
        sink.close(Completion::default()).await?;
        drop(sink);

        assert!(matches!(rx.recv().await, Some(SinkEvent::Error { message, .. }) if message == "boom"));
        assert_eq!(rx.recv().await, None);
        Ok(())
    }

    #[tokio::test]
    async fn factory_tags_events_with_request() -> anyhow::Result<()> {
        let (factory, mut rx) = DirectSinkFactory::channel();
        let request = AgentRequest::new("t1", "hi");

        factory.open(&request).send("x").await?;

        let event = rx.recv().await;
        assert_eq!(
            event.map(|e| e.response_uuid()),
            Some(request.response_uuid)
        );
        Ok(())
    }

    #[tokio::test]
    async fn send_fails_when_consumer_dropped() {
        let (sink, rx) = ChannelSink::channel(Uuid::now_v7());
        drop(rx);
        assert!(sink.send("x").await.is_err());
    }
}

//! Static strategy pattern for CLI commands.
//!
//! Each command is a separate strategy with its own input type, dispatched
//! statically from `main`.

use std::sync::Arc;

use lexia_config::{Config, StreamMode};
use lexia_conversation::{Agent, AgentConfig, TurnOutcome};
use lexia_core::{AgentRequest, DirectSinkFactory, SinkEvent, SinkFactory};
use lexia_memory::InMemoryConversationStore;
use lexia_providers::{OpenAIProviderResolver, RelaySinkFactory};
use lexia_tools::{AttachmentLoader, default_registry};
use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

mod chat;
mod info;
mod init;
mod version;

pub use chat::{ChatInput, ChatStrategy};
pub use info::InfoStrategy;
pub use init::InitStrategy;
pub use version::VersionStrategy;

/// Core trait defining the contract for all command strategies.
///
/// # Example
/// ```rust,ignore
/// struct MyStrategy;
///
/// impl CommandStrategy for MyStrategy {
///     type Input = MyInput;
///
///     async fn execute(&self, input: Self::Input) -> anyhow::Result<()> {
///         Ok(())
///     }
/// }
/// ```
pub trait CommandStrategy: Send + Sync + 'static {
    /// The input type this strategy accepts.
    type Input;

    /// Execute the command with the given input.
    ///
    /// # Errors
    /// Returns an error if command execution fails.
    async fn execute(&self, input: Self::Input) -> anyhow::Result<()>;
}

/// Build the agent from the loaded configuration.
fn build_agent(config: &Config) -> anyhow::Result<Agent> {
    let resolver = OpenAIProviderResolver::from_config(&config.provider)?;
    let memory = InMemoryConversationStore::new(config.agent.history_limit);
    let attachments = AttachmentLoader::from_config(&config.attachments)?;

    Ok(Agent::new(
        Arc::new(resolver),
        Arc::new(memory),
        Arc::new(default_registry()),
        AgentConfig::from_defaults(&config.agent),
    )
    .with_attachments(Arc::new(attachments)))
}

/// Where responses go: printed locally (dev) or published to the relay
/// (prod).
struct Transport {
    factory: Box<dyn SinkFactory>,
    /// Terminal signals from the local printer, present in dev mode.
    finished: Option<mpsc::UnboundedReceiver<Uuid>>,
}

impl Transport {
    fn from_config(config: &Config) -> anyhow::Result<Self> {
        match config.streaming.mode {
            StreamMode::Dev => {
                let (factory, events) = DirectSinkFactory::channel();
                let (done_tx, done_rx) = mpsc::unbounded_channel();
                tokio::spawn(print_events(events, done_tx));
                info!("Streaming responses to the terminal");
                Ok(Self {
                    factory: Box::new(factory),
                    finished: Some(done_rx),
                })
            }
            StreamMode::Prod => {
                let factory = RelaySinkFactory::from_config(&config.streaming)?;
                info!("Streaming responses through the relay");
                Ok(Self {
                    factory: Box::new(factory),
                    finished: None,
                })
            }
        }
    }

    const fn is_local(&self) -> bool {
        self.finished.is_some()
    }

    /// Answer one request and wait until its output has been fully shown.
    async fn send(&mut self, agent: &Agent, request: &AgentRequest) -> Option<TurnOutcome> {
        let sink = self.factory.open(request);
        let outcome = agent.process_message(request, sink.as_ref()).await;
        drop(sink);

        if let Some(finished) = self.finished.as_mut() {
            while let Some(uuid) = finished.recv().await {
                if uuid == request.response_uuid {
                    break;
                }
            }
        }
        outcome
    }
}

async fn print_events(
    mut events: mpsc::UnboundedReceiver<SinkEvent>,
    done: mpsc::UnboundedSender<Uuid>,
) {
    use std::io::Write;

    while let Some(event) = events.recv().await {
        match event {
            SinkEvent::Chunk { text, .. } => {
                print!("{text}");
                let _ = std::io::stdout().flush();
            }
            SinkEvent::Complete {
                response_uuid,
                completion,
            } => {
                println!();
                if let Some(url) = completion.file_url {
                    println!("[file] {url}");
                }
                if let Some(usage) = completion.usage {
                    info!(
                        "Tokens: prompt={}, completion={}, total={}",
                        usage.prompt_tokens, usage.completion_tokens, usage.total_tokens
                    );
                }
                let _ = done.send(response_uuid);
            }
            SinkEvent::Error {
                response_uuid,
                message,
            } => {
                eprintln!("\nError: {message}");
                let _ = done.send(response_uuid);
            }
        }
    }
}

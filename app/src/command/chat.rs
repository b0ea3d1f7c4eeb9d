//! Conversation command: one message or an interactive loop on a thread.

use std::io::{self, Write};

use lexia_config::Config;
use lexia_conversation::Agent;
use lexia_core::{AgentRequest, AttachmentKind};
use tracing::info;

use super::{Transport, build_agent};

/// Input parameters for the Chat command strategy.
#[derive(Debug, Clone)]
pub struct ChatInput {
    /// Conversation thread to use.
    pub thread_id: String,
    /// Optional single message to send (non-interactive mode)
    pub message: Option<String>,
    /// Optional model override
    pub model: Option<String>,
    /// Optional system prompt for this session
    pub system: Option<String>,
    /// Attachment for the first message
    pub attachment: Option<(String, AttachmentKind)>,
    pub force_tools: Vec<String>,
}

/// Strategy for executing the Chat command.
///
/// Each message becomes an [`AgentRequest`] on the same thread, so the
/// agent's memory carries context between turns.
#[derive(Debug, Clone, Copy)]
pub struct ChatStrategy;

impl super::CommandStrategy for ChatStrategy {
    type Input = ChatInput;

    async fn execute(&self, input: Self::Input) -> anyhow::Result<()> {
        let config = Config::load()?;
        info!("Loaded config from {}", Config::config_path()?.display());

        let agent = build_agent(&config)?;
        let mut transport = Transport::from_config(&config)?;
        let mut session = Session { input };

        if let Some(msg) = session.input.message.take() {
            let request = session.request(msg);
            let outcome = transport.send(&agent, &request).await;
            report(&transport, outcome.as_ref());
            return Ok(());
        }

        run_interactive(&agent, &mut transport, &mut session).await
    }
}

struct Session {
    input: ChatInput,
}

impl Session {
    fn request(&mut self, message: String) -> AgentRequest {
        let mut request = AgentRequest::new(self.input.thread_id.clone(), message)
            .with_forced_tools(self.input.force_tools.clone());
        if let Some(model) = &self.input.model {
            request = request.with_model(model.clone());
        }
        if let Some(system) = &self.input.system {
            request = request.with_system_message(system.clone());
        }
        // Only the first message carries the attachment.
        if let Some((url, kind)) = self.input.attachment.take() {
            request = request.with_attachment(url, kind);
        }
        request
    }
}

/// Local output is already printed by the transport; relay mode only
/// reports where the response went.
fn report(transport: &Transport, outcome: Option<&lexia_conversation::TurnOutcome>) {
    if transport.is_local() {
        return;
    }
    match outcome {
        Some(outcome) => {
            println!("{}", outcome.text);
            if let Some(url) = &outcome.file_url {
                println!("[file] {url}");
            }
        }
        None => eprintln!("Request failed; the error was published to the relay"),
    }
}

async fn run_interactive(
    agent: &Agent,
    transport: &mut Transport,
    session: &mut Session,
) -> anyhow::Result<()> {
    let thread_id = session.input.thread_id.clone();
    println!("Lexia chat on thread '{thread_id}'");
    println!("Commands: /clear, /history, exit\n");

    let mut line = String::new();
    loop {
        print!("> ");
        io::stdout().flush()?;

        line.clear();
        if io::stdin().read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();

        match input {
            "" => continue,
            "exit" | "quit" | "q" => break,
            "/clear" => {
                agent.memory().clear(&thread_id);
                println!("History cleared.");
            }
            "/history" => print_history(agent, &thread_id),
            _ => {
                let request = session.request(input.to_string());
                let outcome = transport.send(agent, &request).await;
                report(transport, outcome.as_ref());
            }
        }
    }

    let stats = agent.memory().stats(&thread_id);
    info!(
        "Conversation ended: {} turns on thread {thread_id}",
        stats.total_turns
    );
    Ok(())
}

fn print_history(agent: &Agent, thread_id: &str) {
    let history = agent.memory().get_history(thread_id);
    if history.is_empty() {
        println!("(no history)");
        return;
    }
    for turn in &history {
        println!("[{}] {}", turn.role().as_str(), turn.content());
    }
    let stats = agent.memory().stats(thread_id);
    println!(
        "-- {} turns ({} user, {} assistant), ~{} tokens",
        stats.total_turns, stats.user_turns, stats.assistant_turns, stats.estimated_tokens
    );
}
